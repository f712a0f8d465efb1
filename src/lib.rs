pub mod config;
pub mod crawler;
pub mod storage;

pub use config::Config;
pub use crawler::models::Apartment;
pub use crawler::pagination::PaginationStrategy;
pub use crawler::service::{CrawlSummary, ScrapingService};
