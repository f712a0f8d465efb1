use anyhow::Result;
use reqwest::Client;
use tracing::{debug, info};

use crate::crawler::models::{Apartment, IndexPage};

pub mod fetcher;
pub mod models;
pub mod pagination;
pub mod parser;
pub mod service;

/// Listing URLs on an index page fetched by the frontier.
pub fn collect_listing_links(page: &IndexPage, site_root: &str) -> Vec<String> {
    let links = parser::extract_listing_links(&page.html, site_root);

    if links.is_empty() {
        info!(page = %page.url, "No items on page");
    } else {
        debug!(page = %page.url, count = links.len(), "Found item links");
    }

    links
}

/// Fetches one listing and parses it. Only the fetch can fail; bad fields parse to zero.
pub async fn scrape_apartment(client: &Client, url: &str) -> Result<Apartment> {
    let html = fetcher::fetch_html(client, url).await?;
    Ok(parser::parse_apartment(&html))
}
