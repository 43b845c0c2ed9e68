use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::bson::{Document, doc};
use mongodb::options::ClientOptions;
use mongodb::{Client, Collection, Database as MongoDatabase};
use tracing::info;

use super::{ResultStore, StoreError};
use crate::data_models::{ExtractionResult, ResultPage, ResultQuery};

/// Collections used by the scraper.
pub mod collections {
    pub const EXTRACTION_RESULTS: &str = "extraction_results";
}

/// Handle on the scraper database, shared by the stores built from it.
#[derive(Debug, Clone)]
pub struct Database {
    client: Client,
    db: MongoDatabase,
}

impl Database {
    /// Connects and pings the server before handing out the database.
    pub async fn new(uri: &str, db_name: &str) -> Result<Self, StoreError> {
        let client_options = ClientOptions::parse(uri).await?;
        let client = Client::with_options(client_options)?;

        client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await?;

        info!("Connected to MongoDB database: {}", db_name);

        let db = client.database(db_name);
        Ok(Self { client, db })
    }

    pub fn collection<T>(&self, name: &str) -> Collection<T>
    where
        T: Send + Sync,
    {
        self.db.collection(name)
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn extraction_results(&self) -> Collection<ExtractionResult> {
        self.collection(collections::EXTRACTION_RESULTS)
    }
}

/// Results kept in MongoDB. Ordering relies on `_id`, which grows with
/// insertion time.
pub struct MongoResultStore {
    collection: Collection<ExtractionResult>,
}

impl MongoResultStore {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.extraction_results(),
        }
    }

    fn filter_for(query: &ResultQuery) -> Document {
        match &query.term {
            None => doc! {},
            Some(term) => {
                let pattern = regex::escape(term);
                doc! {
                    "$or": [
                        { "title": { "$regex": pattern.clone(), "$options": "i" } },
                        { "description": { "$regex": pattern, "$options": "i" } }
                    ]
                }
            }
        }
    }
}

#[async_trait]
impl ResultStore for MongoResultStore {
    fn name(&self) -> &'static str {
        "mongodb"
    }

    async fn append(&self, record: &ExtractionResult) -> Result<(), StoreError> {
        self.collection.insert_one(record).await?;
        Ok(())
    }

    async fn query(&self, query: &ResultQuery) -> Result<ResultPage, StoreError> {
        let pagination = query.pagination;
        let filter = Self::filter_for(query);

        let total = self.collection.count_documents(filter.clone()).await?;
        let items: Vec<ExtractionResult> = self
            .collection
            .find(filter)
            .sort(doc! { "_id": -1 })
            .skip(pagination.offset())
            .limit(i64::try_from(pagination.limit()).unwrap_or(i64::MAX))
            .await?
            .try_collect()
            .await?;

        Ok(ResultPage {
            items,
            total,
            page: pagination.page(),
            limit: pagination.limit(),
            pages: pagination.pages_for(total),
            last_updated: self.last_updated().await?,
        })
    }

    async fn last_updated(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        let newest = self
            .collection
            .find_one(doc! {})
            .sort(doc! { "_id": -1 })
            .await?;
        Ok(newest.map(|r| r.extracted_at))
    }

    async fn count(&self) -> Result<u64, StoreError> {
        Ok(self.collection.count_documents(doc! {}).await?)
    }
}
