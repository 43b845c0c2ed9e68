use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use super::{ResultStore, StoreError};
use crate::data_models::{ExtractionResult, ResultPage, ResultQuery};

pub const RESULTS_FILE: &str = "results.jsonl";

/// JSON-lines store under the data directory.
///
/// Records live in memory for reads. An append is written and synced to disk
/// before it is published to readers.
pub struct FileResultStore {
    path: PathBuf,
    writer: Mutex<AppendLog>,
    records: RwLock<Vec<ExtractionResult>>,
}

/// Write side of the results file. `committed` is the length covered by
/// complete lines; anything past it belongs to a failed append.
struct AppendLog {
    file: File,
    committed: u64,
    torn: bool,
}

impl AppendLog {
    async fn append(&mut self, line: &[u8]) -> std::io::Result<()> {
        if self.torn {
            self.file.write_all(b"\n").await?;
            self.file.sync_data().await?;
            self.committed = self.file.metadata().await?.len();
            self.torn = false;
        }

        match self.write_synced(line).await {
            Ok(()) => {
                self.committed += line.len() as u64;
                Ok(())
            }
            Err(e) => {
                self.rollback().await;
                Err(e)
            }
        }
    }

    async fn write_synced(&mut self, line: &[u8]) -> std::io::Result<()> {
        self.file.write_all(line).await?;
        self.file.sync_data().await
    }

    /// Cuts a partially written line. If that fails too, the next append
    /// starts on a fresh line instead.
    async fn rollback(&mut self) {
        let truncated = match self.file.set_len(self.committed).await {
            Ok(()) => self.file.sync_data().await,
            Err(e) => Err(e),
        };
        if let Err(e) = truncated {
            warn!("could not roll back a failed append: {e}");
            self.torn = true;
        }
    }
}

impl FileResultStore {
    pub async fn open(data_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let data_dir = data_dir.as_ref();
        fs::create_dir_all(data_dir).await?;
        let path = data_dir.join(RESULTS_FILE);

        let (records, torn_tail) = match fs::read(&path).await {
            Ok(bytes) => (
                Self::load(&path, &String::from_utf8_lossy(&bytes)),
                bytes.last().is_some_and(|b| *b != b'\n'),
            ),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => (Vec::new(), false),
            Err(e) => return Err(e.into()),
        };
        info!("loaded {} results from {}", records.len(), path.display());

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        let committed = file.metadata().await?.len();

        Ok(FileResultStore {
            path,
            // a torn last line must not swallow the next append
            writer: Mutex::new(AppendLog {
                file,
                committed,
                torn: torn_tail,
            }),
            records: RwLock::new(records),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(path: &Path, content: &str) -> Vec<ExtractionResult> {
        content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .filter_map(|(n, line)| match serde_json::from_str(line) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!("skipping corrupt line {} in {}: {e}", n + 1, path.display());
                    None
                }
            })
            .collect()
    }
}

#[async_trait]
impl ResultStore for FileResultStore {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn append(&self, record: &ExtractionResult) -> Result<(), StoreError> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        self.writer.lock().await.append(&line).await?;
        self.records.write().await.push(record.clone());
        Ok(())
    }

    async fn query(&self, query: &ResultQuery) -> Result<ResultPage, StoreError> {
        let records = self.records.read().await;
        let needle = query.needle();
        let pagination = query.pagination;

        let matching: Vec<&ExtractionResult> = records
            .iter()
            .rev()
            .filter(|r| needle.as_deref().is_none_or(|n| r.matches(n)))
            .collect();
        let total = matching.len() as u64;

        let items = matching
            .into_iter()
            .skip(usize::try_from(pagination.offset()).unwrap_or(usize::MAX))
            .take(usize::try_from(pagination.limit()).unwrap_or(usize::MAX))
            .cloned()
            .collect();

        Ok(ResultPage {
            items,
            total,
            page: pagination.page(),
            limit: pagination.limit(),
            pages: pagination.pages_for(total),
            last_updated: records.last().map(|r| r.extracted_at),
        })
    }

    async fn last_updated(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        Ok(self.records.read().await.last().map(|r| r.extracted_at))
    }

    async fn count(&self) -> Result<u64, StoreError> {
        Ok(self.records.read().await.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_models::Pagination;

    fn record(title: &str, description: &str) -> ExtractionResult {
        ExtractionResult::new(
            title.to_string(),
            description.to_string(),
            format!("https://seguros.sura.cl/{}", title.to_lowercase().replace(' ', "-")),
            "test".to_string(),
        )
    }

    #[tokio::test]
    async fn test_append_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileResultStore::open(dir.path()).await.unwrap();
        store.append(&record("Vida", "seguro de vida")).await.unwrap();
        store.append(&record("Salud", "seguro de salud")).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 2);
        drop(store);

        let reopened = FileResultStore::open(dir.path()).await.unwrap();
        let page = reopened.query(&ResultQuery::default()).await.unwrap();
        assert_eq!(page.total, 2);
        // most recent first
        assert_eq!(page.items[0].title, "Salud");
        assert_eq!(page.items[1].title, "Vida");
    }

    #[tokio::test]
    async fn test_corrupt_lines_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let good = serde_json::to_string(&record("Vida", "")).unwrap();
        // last line torn mid-write
        std::fs::write(
            dir.path().join(RESULTS_FILE),
            format!("{good}\nnot json\n{{\"id\":\"abc\",\"tit"),
        )
        .unwrap();

        let store = FileResultStore::open(dir.path()).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 1);

        store.append(&record("Ahorro", "")).await.unwrap();
        drop(store);

        let reopened = FileResultStore::open(dir.path()).await.unwrap();
        let titles: Vec<String> = reopened
            .query(&ResultQuery::default())
            .await
            .unwrap()
            .items
            .into_iter()
            .map(|r| r.title)
            .collect();
        assert_eq!(titles, vec!["Ahorro", "Vida"]);
    }

    #[tokio::test]
    async fn test_page_beyond_end_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileResultStore::open(dir.path()).await.unwrap();
        for i in 0..3 {
            store.append(&record(&format!("R{i}"), "")).await.unwrap();
        }
        let query = ResultQuery::new(None, Pagination::new(5, 2).unwrap());
        let page = store.query(&query).await.unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.total, 3);
        assert_eq!(page.pages, 2);
    }

    #[tokio::test]
    async fn test_failed_append_is_rolled_back() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileResultStore::open(dir.path()).await.unwrap();
        store.append(&record("Vida", "")).await.unwrap();

        // half a line reaches the file before the write fails
        {
            let mut log = store.writer.lock().await;
            log.file.write_all(br#"{"id":"half","tit"#).await.unwrap();
            log.file.flush().await.unwrap();
            log.rollback().await;
            assert!(!log.torn);
        }

        store.append(&record("Salud", "")).await.unwrap();
        drop(store);

        let content = std::fs::read_to_string(dir.path().join(RESULTS_FILE)).unwrap();
        assert!(!content.contains("half"));
        let reopened = FileResultStore::open(dir.path()).await.unwrap();
        assert_eq!(reopened.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_append_after_unrecoverable_fragment_starts_new_line() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileResultStore::open(dir.path()).await.unwrap();
        store.append(&record("Vida", "")).await.unwrap();

        // fragment that could not be truncated away
        {
            let mut log = store.writer.lock().await;
            log.file.write_all(br#"{"id":"half","tit"#).await.unwrap();
            log.file.flush().await.unwrap();
            log.torn = true;
        }

        store.append(&record("Salud", "")).await.unwrap();
        store.append(&record("Hogar", "")).await.unwrap();
        drop(store);

        let reopened = FileResultStore::open(dir.path()).await.unwrap();
        let titles: Vec<String> = reopened
            .query(&ResultQuery::default())
            .await
            .unwrap()
            .items
            .into_iter()
            .map(|r| r.title)
            .collect();
        assert_eq!(titles, vec!["Hogar", "Salud", "Vida"]);
    }
}
