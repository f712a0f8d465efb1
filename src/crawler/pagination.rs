//! Index page discovery.
//!
//! The frontier hands out one fetched [`IndexPage`] at a time so the caller can
//! launch that page's listings before the next page is requested. Every page is
//! fetched once; a failed fetch still yields the page, with an empty body.

use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::str::FromStr;

use anyhow::Result;
use reqwest::Client;
use tracing::{debug, info, warn};
use url::Url;

use crate::crawler::fetcher;
use crate::crawler::models::IndexPage;
use crate::crawler::parser;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PaginationStrategy {
    /// Read the last page number once, then visit `?page=1..=last`.
    #[default]
    Numeric,
    /// Follow "next" links until the "last" link is reached.
    LinkFollow,
}

impl FromStr for PaginationStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "numeric" => Ok(Self::Numeric),
            "link-follow" | "link_follow" | "follow" => Ok(Self::LinkFollow),
            other => Err(format!("unknown pagination strategy {other:?}")),
        }
    }
}

impl fmt::Display for PaginationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric => f.write_str("numeric"),
            Self::LinkFollow => f.write_str("link-follow"),
        }
    }
}

/// `seed` with its `page` query parameter set to `page`.
pub fn page_url(seed: &str, page: u32) -> Result<String> {
    let mut url = Url::parse(seed)?;

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != "page")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    url.query_pairs_mut()
        .clear()
        .extend_pairs(kept)
        .append_pair("page", &page.to_string());

    Ok(url.into())
}

enum State {
    /// Numeric mode: pages still to visit, in order.
    Queued(VecDeque<String>),
    /// Link-follow mode: the next page to visit and the known terminal page.
    Following {
        current: String,
        last: Option<String>,
    },
    /// Link-follow mode reached "last"; it is visited once more before stopping.
    Terminal(String),
    Done,
}

pub struct Frontier {
    client: Client,
    site_root: String,
    state: State,
    visited: HashSet<String>,
    /// Seed body fetched during setup, reused when the seed is the only page.
    seed_page: Option<IndexPage>,
}

impl Frontier {
    /// Builds the frontier. Numeric mode fetches the seed here to read the page count.
    pub async fn new(
        client: Client,
        seed_url: &str,
        site_root: &str,
        strategy: PaginationStrategy,
    ) -> Result<Self> {
        let (state, seed_page) = match strategy {
            PaginationStrategy::Numeric => {
                let (queue, seed) = numeric_pages(&client, seed_url).await?;
                (State::Queued(queue), Some(seed))
            }
            PaginationStrategy::LinkFollow => (
                State::Following {
                    current: seed_url.to_string(),
                    last: None,
                },
                None,
            ),
        };

        Ok(Self {
            client,
            site_root: site_root.to_string(),
            state,
            visited: HashSet::new(),
            seed_page,
        })
    }

    /// Fetches and returns the next index page, or `None` once pagination is exhausted.
    pub async fn next_page(&mut self) -> Option<IndexPage> {
        match std::mem::replace(&mut self.state, State::Done) {
            State::Done => None,

            State::Queued(mut queue) => {
                let url = queue.pop_front()?;
                let page = self.visit(url).await;
                self.state = State::Queued(queue);
                Some(page)
            }

            State::Following { current, last } => {
                let is_seed = self.visited.is_empty();
                let page = self.visit(current).await;

                // The terminal page comes from the seed, independent of the chain.
                let last = if is_seed {
                    parser::last_page_link(&page.html, &self.site_root)
                } else {
                    last
                };

                self.state = match parser::next_page_link(&page.html, &self.site_root) {
                    None => {
                        debug!(page = %page.url, "No next link, chain ended");
                        self.finish_chain(last)
                    }
                    Some(next) if self.visited.contains(&next) => {
                        warn!(page = %page.url, next = %next, "Next link points back to a visited page");
                        self.finish_chain(last)
                    }
                    Some(next) if last.as_deref() == Some(next.as_str()) => {
                        info!(last = %next, "Reached last page");
                        State::Terminal(next)
                    }
                    Some(next) => State::Following {
                        current: next,
                        last,
                    },
                };

                Some(page)
            }

            State::Terminal(url) => Some(self.visit(url).await),
        }
    }

    /// A broken chain still ends on the terminal page, unless it was already visited.
    fn finish_chain(&self, last: Option<String>) -> State {
        match last {
            Some(last) if !self.visited.contains(&last) => {
                info!(last = %last, "Chain broke early, visiting last page");
                State::Terminal(last)
            }
            _ => State::Done,
        }
    }

    async fn visit(&mut self, url: String) -> IndexPage {
        self.visited.insert(url.clone());

        if let Some(seed) = self.seed_page.take() {
            if seed.url == url {
                return seed;
            }
        }

        info!(page = %url, "Fetching index page");

        let html = match fetcher::fetch_html(&self.client, &url).await {
            Ok(html) => html,
            Err(e) => {
                warn!(page = %url, error = %e, "Failed to fetch index page");
                String::new()
            }
        };

        IndexPage { url, html }
    }
}

async fn numeric_pages(client: &Client, seed_url: &str) -> Result<(VecDeque<String>, IndexPage)> {
    let html = match fetcher::fetch_html(client, seed_url).await {
        Ok(html) => html,
        Err(e) => {
            warn!(seed = %seed_url, error = %e, "Failed to read page count from seed");
            String::new()
        }
    };
    let last = parser::last_page_number(&html);

    let pages = match last {
        Some(last) if last >= 1 => {
            info!(last, "Last page");
            (1..=last)
                .map(|page| page_url(seed_url, page))
                .collect::<Result<VecDeque<_>>>()?
        }
        _ => {
            info!(seed = %seed_url, "No pagination control, crawling seed only");
            VecDeque::from([seed_url.to_string()])
        }
    };

    let seed = IndexPage {
        url: seed_url.to_string(),
        html,
    };

    Ok((pages, seed))
}
