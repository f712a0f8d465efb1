use std::collections::HashMap;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Result;
use reqwest::Client;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::{Id, JoinError, JoinSet};
use tracing::{error, info, warn};

use crate::{
    config::Config,
    crawler::{self, fetcher, models::Apartment, pagination::Frontier},
    storage::csv::RecordSink,
};

/// Counters shared with every extraction task.
#[derive(Debug, Default)]
pub struct CrawlStats {
    pub pages_visited: AtomicUsize,
    pub listings_discovered: AtomicUsize,
    pub tasks_launched: AtomicUsize,
    pub records_emitted: AtomicUsize,
    pub failed_fetches: AtomicUsize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrawlSummary {
    pub pages_visited: usize,
    pub listings_discovered: usize,
    pub tasks_launched: usize,
    pub records_emitted: usize,
    pub failed_fetches: usize,
    pub rows_written: usize,
}

impl CrawlStats {
    fn summary(&self, rows_written: usize) -> CrawlSummary {
        CrawlSummary {
            pages_visited: self.pages_visited.load(Ordering::Acquire),
            listings_discovered: self.listings_discovered.load(Ordering::Acquire),
            tasks_launched: self.tasks_launched.load(Ordering::Acquire),
            records_emitted: self.records_emitted.load(Ordering::Acquire),
            failed_fetches: self.failed_fetches.load(Ordering::Acquire),
            rows_written,
        }
    }
}

pub struct ScrapingService {
    cfg: Config,
    client: Client,
}

impl ScrapingService {
    pub fn new(cfg: Config) -> Result<Self> {
        cfg.validate()?;
        let client = fetcher::build_client(&cfg)?;

        Ok(Self { cfg, client })
    }

    /// Crawls into the CSV file at `output_path`.
    pub async fn run(&self) -> Result<CrawlSummary> {
        let sink = RecordSink::create(&self.cfg.output_path)?;
        let (_, summary) = self.run_into(sink).await?;

        info!(path = %self.cfg.output_path, "Output written");
        Ok(summary)
    }

    /// Crawls every index page, extracts every listing, and writes one row per listing
    /// into `sink`. Returns the sink's inner writer once the stream has closed.
    pub async fn run_into<W>(&self, sink: RecordSink<W>) -> Result<(W, CrawlSummary)>
    where
        W: Write + Send + 'static,
    {
        let stats = Arc::new(CrawlStats::default());
        let (tx, rx) = mpsc::channel::<Apartment>(self.cfg.channel_capacity);
        let writer = sink.spawn(rx);

        let gate = Arc::new(Semaphore::new(self.cfg.max_concurrency));
        let mut tasks: JoinSet<()> = JoinSet::new();
        let mut launched: HashMap<Id, String> = HashMap::new();

        let mut frontier = Frontier::new(
            self.client.clone(),
            &self.cfg.seed_url,
            &self.cfg.site_root,
            self.cfg.pagination,
        )
        .await?;

        while let Some(page) = frontier.next_page().await {
            stats.pages_visited.fetch_add(1, Ordering::AcqRel);

            let links = crawler::collect_listing_links(&page, &self.cfg.site_root);
            stats
                .listings_discovered
                .fetch_add(links.len(), Ordering::AcqRel);

            info!(page = %page.url, count = links.len(), "Launching listing tasks");

            for link in links {
                // Gate before spawning so in-flight work stays bounded.
                let permit = Arc::clone(&gate).acquire_owned().await?;

                let client = self.client.clone();
                let task_tx = tx.clone();
                let task_stats = Arc::clone(&stats);
                let url = link.clone();

                let handle = tasks.spawn(async move {
                    let _permit = permit;

                    let apartment = match crawler::scrape_apartment(&client, &url).await {
                        Ok(apartment) => {
                            info!(listing = %url, reference = apartment.reference, "Scraped listing");
                            apartment
                        }
                        Err(e) => {
                            warn!(listing = %url, error = %e, "Failed to fetch listing");
                            task_stats.failed_fetches.fetch_add(1, Ordering::AcqRel);
                            Apartment::default()
                        }
                    };

                    if task_tx.send(apartment).await.is_ok() {
                        task_stats.records_emitted.fetch_add(1, Ordering::AcqRel);
                    }
                });

                stats.tasks_launched.fetch_add(1, Ordering::AcqRel);
                launched.insert(handle.id(), link);

                // Reap finished tasks so bookkeeping stays bounded by in-flight work.
                while let Some(joined) = tasks.try_join_next_with_id() {
                    settle(joined, &mut launched, &tx, &stats).await;
                }
            }
        }

        // Completion barrier: every task has finished before the last sender is dropped.
        while let Some(joined) = tasks.join_next_with_id().await {
            settle(joined, &mut launched, &tx, &stats).await;
        }
        drop(tx);

        let (inner, rows) = writer.await??;

        let summary = stats.summary(rows);
        info!(
            pages = summary.pages_visited,
            listings = summary.listings_discovered,
            launched = summary.tasks_launched,
            failed = summary.failed_fetches,
            rows = summary.rows_written,
            "DONE: crawl finished"
        );

        Ok((inner, summary))
    }
}

/// Forgets a joined task. A panicked task never sent its record, so an empty one is sent
/// in its place.
async fn settle(
    joined: std::result::Result<(Id, ()), JoinError>,
    launched: &mut HashMap<Id, String>,
    tx: &mpsc::Sender<Apartment>,
    stats: &CrawlStats,
) {
    match joined {
        Ok((id, ())) => {
            launched.remove(&id);
        }
        Err(e) => {
            let url = launched.remove(&e.id()).unwrap_or_default();
            error!(listing = %url, error = %e, "Listing task panicked, emitting empty record");

            if tx.send(Apartment::default()).await.is_ok() {
                stats.records_emitted.fetch_add(1, Ordering::AcqRel);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn panicked_task_is_replaced_by_empty_record() {
        let (tx, mut rx) = mpsc::channel(1);
        let stats = CrawlStats::default();
        let mut tasks: JoinSet<()> = JoinSet::new();
        let mut launched = HashMap::new();

        let handle = tasks.spawn(async { panic!("listing parser blew up") });
        launched.insert(handle.id(), "https://boligzonen.dk/bolig/1".to_string());

        let joined = tasks.join_next_with_id().await.expect("one task");
        assert!(joined.as_ref().is_err_and(|e| e.is_panic()));

        settle(joined, &mut launched, &tx, &stats).await;

        assert_eq!(rx.recv().await, Some(Apartment::default()));
        assert_eq!(stats.records_emitted.load(Ordering::Acquire), 1);
        assert!(launched.is_empty());
    }

    #[tokio::test]
    async fn finished_task_only_forgets_its_url() {
        let (tx, mut rx) = mpsc::channel(1);
        let stats = CrawlStats::default();
        let mut tasks: JoinSet<()> = JoinSet::new();
        let mut launched = HashMap::new();

        let handle = tasks.spawn(async {});
        launched.insert(handle.id(), "https://boligzonen.dk/bolig/2".to_string());

        let joined = tasks.join_next_with_id().await.expect("one task");
        settle(joined, &mut launched, &tx, &stats).await;
        drop(tx);

        assert_eq!(rx.recv().await, None);
        assert_eq!(stats.records_emitted.load(Ordering::Acquire), 0);
        assert!(launched.is_empty());
    }
}
