use std::fs::File;
use std::io::Write;
use std::path::Path;

use async_trait::async_trait;
use sqlx::MySqlPool;

use crate::input::SearchRow;
use crate::{Error, Result};

/// Written in place of results when a term yields nothing.
pub const NO_RESULTS_SENTINEL: &str = "no more results";

/// Queue status of a term whose results were stored.
pub const STATUS_INCOMPLETE: &str = "incomplete";
/// Queue status of a term that produced no results.
pub const STATUS_NO_RESULTS: &str = "no results";

/// Destination for per-term results. Owned by the row loop for the whole run.
#[async_trait]
pub trait RowSink: Send {
    /// Called once before the first row.
    async fn begin(&mut self, cap: usize) -> Result<()>;
    async fn record_results(&mut self, row: &SearchRow, urls: &[String]) -> Result<()>;
    async fn record_exhausted(&mut self, row: &SearchRow) -> Result<()>;
    /// Called once after the last row.
    async fn finish(&mut self) -> Result<()>;
}

pub fn header_row(cap: usize) -> Vec<String> {
    std::iter::once("Search Term".to_string())
        .chain((1..=cap).map(|i| format!("Result {i}")))
        .collect()
}

/// Writes one line per term. Rows are as long as the results they carry.
///
/// Writes are synchronous `std::io` calls made from the row loop; only one row is ever in flight,
/// so no other task waits on them.
pub struct CsvSink<W: Write> {
    writer: csv::Writer<W>,
}

impl CsvSink<File> {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(File::create(path)?))
    }
}

impl<W: Write> CsvSink<W> {
    pub fn new(inner: W) -> Self {
        let writer = csv::WriterBuilder::new()
            .flexible(true)
            .has_headers(false)
            .from_writer(inner);
        Self { writer }
    }

    pub fn into_inner(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| Error::Io(e.into_error()))
    }

    fn write_line<I, T>(&mut self, fields: I) -> Result<()>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        self.writer.write_record(fields)?;
        // Completed rows must be on disk before the loop can pause.
        self.writer.flush()?;
        Ok(())
    }
}

#[async_trait]
impl<W: Write + Send> RowSink for CsvSink<W> {
    async fn begin(&mut self, cap: usize) -> Result<()> {
        self.write_line(header_row(cap))
    }

    async fn record_results(&mut self, row: &SearchRow, urls: &[String]) -> Result<()> {
        self.write_line(std::iter::once(row.term.as_str()).chain(urls.iter().map(String::as_str)))
    }

    async fn record_exhausted(&mut self, row: &SearchRow) -> Result<()> {
        self.write_line([row.term.as_str(), NO_RESULTS_SENTINEL])
    }

    async fn finish(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Writes results back to the queue and results tables.
pub struct QueueSink {
    pool: MySqlPool,
}

impl QueueSink {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RowSink for QueueSink {
    async fn begin(&mut self, _cap: usize) -> Result<()> {
        Ok(())
    }

    async fn record_results(&mut self, row: &SearchRow, urls: &[String]) -> Result<()> {
        let queue_id = row.queue_id.ok_or(Error::MissingQueueId(row.number))?;

        let mut tx = self.pool.begin().await?;
        sqlx::query("UPDATE superscraper_queue SET results_count = ?, status = ? WHERE queue_id = ?")
            .bind(urls.len() as i64)
            .bind(STATUS_INCOMPLETE)
            .bind(queue_id)
            .execute(&mut *tx)
            .await?;
        for url in urls {
            sqlx::query("INSERT INTO superscraper_results (url, queue_id) VALUES (?, ?)")
                .bind(url)
                .bind(queue_id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn record_exhausted(&mut self, row: &SearchRow) -> Result<()> {
        let queue_id = row.queue_id.ok_or(Error::MissingQueueId(row.number))?;

        sqlx::query("UPDATE superscraper_queue SET results_count = 0, status = ? WHERE queue_id = ?")
            .bind(STATUS_NO_RESULTS)
            .bind(queue_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}
