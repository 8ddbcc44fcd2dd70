/// Persistent record of accepted videos
pub mod sqlite;

pub use sqlite::SqliteVideoStore;

use crate::admission::AcceptedRecord;
use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
pub trait VideoStore: Send + Sync {
    /// Subset of `urls` that has never been saved, preserving input order
    async fn query_unknown(&self, urls: &[String]) -> Result<Vec<String>>;

    /// Persist `records` in one atomic write. Already-known URLs are ignored.
    /// Returns the number of rows actually inserted.
    async fn save_batch(&self, records: &[AcceptedRecord]) -> Result<u64>;
}
