use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, ensure, Context, Result};

use crate::crawler::pagination::PaginationStrategy;

pub const DEFAULT_SEED_URL: &str = "https://boligzonen.dk/lejebolig/kobenhavn-kommune";
pub const DEFAULT_SITE_ROOT: &str = "https://boligzonen.dk";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/111.0.0.0 Safari/537.36";

#[derive(Debug, Clone)]
pub struct Config {
    pub seed_url: String,
    /// Prefix joined verbatim with every relative listing href.
    pub site_root: String,
    pub output_path: String,
    pub pagination: PaginationStrategy,
    pub max_concurrency: usize,
    pub channel_capacity: usize,
    pub user_agent: String,
    pub request_timeout: Duration,
}

impl Config {
    pub fn new(seed_url: impl Into<String>) -> Self {
        Self {
            seed_url: seed_url.into(),
            site_root: DEFAULT_SITE_ROOT.to_string(),
            output_path: "records.csv".to_string(),
            pagination: PaginationStrategy::Numeric,
            max_concurrency: 16,
            channel_capacity: 64,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }

    pub fn from_env() -> Result<Self> {
        let defaults = Self::new(DEFAULT_SEED_URL);

        let cfg = Self {
            seed_url: env::var("CRAWL_SEED_URL").unwrap_or(defaults.seed_url),
            site_root: env::var("CRAWL_SITE_ROOT").unwrap_or(defaults.site_root),
            output_path: env::var("CRAWL_OUTPUT").unwrap_or(defaults.output_path),
            pagination: parse_var("CRAWL_PAGINATION", defaults.pagination)?,
            max_concurrency: parse_var("CRAWL_MAX_CONCURRENCY", defaults.max_concurrency)?,
            channel_capacity: parse_var("CRAWL_CHANNEL_CAPACITY", defaults.channel_capacity)?,
            user_agent: env::var("CRAWL_USER_AGENT").unwrap_or(defaults.user_agent),
            request_timeout: Duration::from_secs(parse_var(
                "CRAWL_TIMEOUT_SECS",
                defaults.request_timeout.as_secs(),
            )?),
        };

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.max_concurrency >= 1, "CRAWL_MAX_CONCURRENCY must be at least 1");
        ensure!(self.channel_capacity >= 1, "CRAWL_CHANNEL_CAPACITY must be at least 1");
        url::Url::parse(&self.seed_url)
            .with_context(|| format!("CRAWL_SEED_URL is not an absolute url: {}", self.seed_url))?;
        Ok(())
    }

    pub fn with_site_root(mut self, site_root: impl Into<String>) -> Self {
        self.site_root = site_root.into();
        self
    }

    pub fn with_output_path(mut self, path: impl Into<String>) -> Self {
        self.output_path = path.into();
        self
    }

    pub fn with_pagination(mut self, pagination: PaginationStrategy) -> Self {
        self.pagination = pagination;
        self
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

fn parse_var<T>(key: &'static str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => parse_value(key, &raw),
        Err(_) => Ok(default),
    }
}

fn parse_value<T>(key: &'static str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e: T::Err| anyhow!("invalid value for {key}: {raw:?}: {e}"))
}
