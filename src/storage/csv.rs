use std::fs::File;
use std::io::Write;

use anyhow::{anyhow, Result};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::crawler::models::Apartment;

pub const HEADER: [&str; 6] = ["id", "rooms", "area", "rent", "latitude", "longitude"];

/// Writes apartments as CSV rows in the order they arrive.
pub struct RecordSink<W: Write> {
    writer: csv::Writer<W>,
    rows: usize,
}

impl RecordSink<File> {
    pub fn create(path: &str) -> Result<Self> {
        let file = File::create(path)?;
        Self::new(file)
    }
}

impl<W: Write> RecordSink<W> {
    /// Wraps `inner` and writes the header row immediately.
    pub fn new(inner: W) -> Result<Self> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(inner);
        writer.write_record(HEADER)?;

        Ok(Self { writer, rows: 0 })
    }

    pub fn write(&mut self, apartment: &Apartment) -> Result<()> {
        self.writer.serialize(apartment)?;
        self.rows += 1;
        Ok(())
    }

    /// Flushes and returns the inner writer with the number of data rows written.
    pub fn finish(self) -> Result<(W, usize)> {
        let rows = self.rows;
        let inner = self
            .writer
            .into_inner()
            .map_err(|e| anyhow!("failed to flush csv output: {}", e.error()))?;

        Ok((inner, rows))
    }
}

impl<W: Write + Send + 'static> RecordSink<W> {
    /// Drains `rx` on a blocking thread until every sender is dropped.
    pub fn spawn(mut self, mut rx: mpsc::Receiver<Apartment>) -> JoinHandle<Result<(W, usize)>> {
        tokio::task::spawn_blocking(move || {
            while let Some(apartment) = rx.blocking_recv() {
                self.write(&apartment)?;
                debug!(rows = self.rows, reference = apartment.reference, "Wrote record");
            }

            let (inner, rows) = self.finish()?;
            info!(rows, "Record stream closed");
            Ok((inner, rows))
        })
    }
}
