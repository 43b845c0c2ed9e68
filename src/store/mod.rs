use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::data_models::{ExtractionResult, ResultPage, ResultQuery};

pub mod file;
pub mod mongo;

pub use file::FileResultStore;
pub use mongo::{Database, MongoResultStore};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize result: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Database(#[from] mongodb::error::Error),
}

/// Append-only collection of extraction results.
#[async_trait]
pub trait ResultStore: Send + Sync {
    fn name(&self) -> &'static str;

    /// Persists one record. Readers see either all of it or nothing.
    async fn append(&self, record: &ExtractionResult) -> Result<(), StoreError>;

    /// Filtered, most-recent-first page of results.
    async fn query(&self, query: &ResultQuery) -> Result<ResultPage, StoreError>;

    async fn last_updated(&self) -> Result<Option<DateTime<Utc>>, StoreError>;

    async fn count(&self) -> Result<u64, StoreError>;
}
