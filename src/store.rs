use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::StoreError;
use crate::highlight::{DocumentId, HighlightId, HighlightRecord};
use crate::persistence::HighlightStore;

const HIGHLIGHTS_TREE: &str = "highlights";
const LOCAL_STATE_DB_DIR_NAME: &str = "kpdf_db";
const KEY_SEPARATOR: u8 = 0;

pub fn local_state_db_path() -> PathBuf {
    if let Some(app_data) = std::env::var_os("APPDATA") {
        return PathBuf::from(app_data)
            .join("kpdf")
            .join(LOCAL_STATE_DB_DIR_NAME);
    }

    if let Some(home) = std::env::var_os("HOME") {
        return PathBuf::from(home)
            .join(".kpdf")
            .join(LOCAL_STATE_DB_DIR_NAME);
    }

    PathBuf::from(".kpdf").join(LOCAL_STATE_DB_DIR_NAME)
}

/// Highlight records in the kPDF sled database.
///
/// Keys are `<document key> 0x00 <id as big-endian u64>`, so a prefix scan
/// returns one document's records in insertion order. Values are JSON.
pub struct SledHighlightStore {
    db: Option<sled::Db>,
    tree: Option<sled::Tree>,
}

impl SledHighlightStore {
    /// Never fails: an unusable database yields a store that reports itself
    /// unavailable.
    pub fn open(path: &Path) -> Self {
        if let Some(parent) = path.parent()
            && std::fs::create_dir_all(parent).is_err()
        {
            crate::debug_log!("[store] create dir failed: {}", parent.to_string_lossy());
            return Self::unavailable();
        }

        match sled::open(path) {
            Ok(db) => Self::from_db(db),
            Err(err) => {
                crate::warn_log!(
                    "[store] open db failed: {} | {}",
                    path.to_string_lossy(),
                    err
                );
                Self::unavailable()
            }
        }
    }

    pub fn open_temporary() -> Result<Self, StoreError> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self::from_db(db))
    }

    pub fn from_db(db: sled::Db) -> Self {
        let tree = match db.open_tree(HIGHLIGHTS_TREE) {
            Ok(tree) => Some(tree),
            Err(err) => {
                crate::warn_log!("[store] open tree failed: {} | {}", HIGHLIGHTS_TREE, err);
                None
            }
        };
        Self { db: Some(db), tree }
    }

    pub fn unavailable() -> Self {
        Self {
            db: None,
            tree: None,
        }
    }

    fn handles(&self) -> Result<(&sled::Db, &sled::Tree), StoreError> {
        match (&self.db, &self.tree) {
            (Some(db), Some(tree)) => Ok((db, tree)),
            _ => Err(StoreError::Unavailable),
        }
    }
}

fn document_prefix(document_id: &DocumentId) -> Vec<u8> {
    let mut prefix = match document_id {
        DocumentId::Text(text) => format!("s:{text}").into_bytes(),
        DocumentId::Number(number) => format!("n:{number}").into_bytes(),
    };
    prefix.push(KEY_SEPARATOR);
    prefix
}

fn record_key(document_id: &DocumentId, id: HighlightId) -> Vec<u8> {
    let mut key = document_prefix(document_id);
    key.extend_from_slice(&id.0.to_be_bytes());
    key
}

#[async_trait(?Send)]
impl HighlightStore for SledHighlightStore {
    fn is_available(&self) -> bool {
        self.tree.is_some()
    }

    async fn put(&self, record: &HighlightRecord) -> Result<HighlightId, StoreError> {
        let (db, tree) = self.handles()?;
        let id = HighlightId(db.generate_id()?);

        let mut stored = record.clone();
        stored.id = Some(id);
        let value = serde_json::to_vec(&stored)?;
        tree.insert(record_key(&record.document_id, id), value)?;
        tree.flush_async().await?;
        Ok(id)
    }

    async fn get_all(&self, document_id: &DocumentId) -> Result<Vec<HighlightRecord>, StoreError> {
        let (_, tree) = self.handles()?;

        let mut records = Vec::new();
        for entry in tree.scan_prefix(document_prefix(document_id)) {
            let (key, value) = entry?;
            let record = match serde_json::from_slice::<HighlightRecord>(&value) {
                Ok(record) => record,
                Err(err) => {
                    crate::debug_log!(
                        "[store] skipped undecodable highlight: {} | {}",
                        String::from_utf8_lossy(&key),
                        err
                    );
                    continue;
                }
            };
            records.push(record);
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(document_id: DocumentId, x_pct: f32) -> HighlightRecord {
        HighlightRecord {
            id: None,
            document_id,
            page: Some(0),
            confidence: Some(2),
            color: Some("yellow".to_string()),
            x_pct,
            y_pct: 0.5,
            w_pct: 0.1,
            h_pct: 0.1,
        }
    }

    #[tokio::test]
    async fn records_are_scoped_to_their_document() {
        let store = SledHighlightStore::open_temporary().unwrap();
        let first = store.put(&record("doc-1".into(), 0.1)).await.unwrap();
        let second = store.put(&record("doc-1".into(), 0.2)).await.unwrap();
        store.put(&record("doc-10".into(), 0.3)).await.unwrap();
        store.put(&record(DocumentId::Number(1), 0.4)).await.unwrap();

        let records = store.get_all(&"doc-1".into()).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, Some(first));
        assert_eq!(records[1].id, Some(second));
        assert_eq!(records[1].x_pct, 0.2);

        let numeric = store.get_all(&DocumentId::Number(1)).await.unwrap();
        assert_eq!(numeric.len(), 1);
        assert!(store.get_all(&"doc-2".into()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn undecodable_values_are_skipped() {
        let db = sled::Config::new().temporary(true).open().unwrap();
        let store = SledHighlightStore::from_db(db.clone());
        store.put(&record("doc-1".into(), 0.1)).await.unwrap();

        let tree = db.open_tree(HIGHLIGHTS_TREE).unwrap();
        tree.insert(record_key(&"doc-1".into(), HighlightId(u64::MAX)), b"not json".to_vec())
            .unwrap();

        let records = store.get_all(&"doc-1".into()).await.unwrap();
        assert_eq!(records.len(), 1);
    }

    #[tokio::test]
    async fn unavailable_store_rejects_everything() {
        let store = SledHighlightStore::unavailable();
        assert!(!store.is_available());
        assert!(matches!(
            store.put(&record("doc-1".into(), 0.1)).await,
            Err(StoreError::Unavailable)
        ));
        assert!(matches!(
            store.get_all(&"doc-1".into()).await,
            Err(StoreError::Unavailable)
        ));
    }

    #[tokio::test]
    async fn open_creates_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join(LOCAL_STATE_DB_DIR_NAME);

        let store = SledHighlightStore::open(&path);
        assert!(store.is_available());
        assert!(path.exists());

        store.put(&record("doc-1".into(), 0.25)).await.unwrap();
        let records = store.get_all(&"doc-1".into()).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].x_pct, 0.25);
    }
}
