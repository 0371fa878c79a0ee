use std::rc::Rc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{HighlightError, HighlightResult, StoreError};
use crate::highlight::{ConfidenceMapper, DocumentId, HighlightGeometry, HighlightId, HighlightRecord};

pub const DEFAULT_MAX_RETRIES: u32 = 5;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(200);

/// Record storage keyed by document. Implementations only ever see whole records.
#[async_trait(?Send)]
pub trait HighlightStore {
    fn is_available(&self) -> bool;
    async fn put(&self, record: &HighlightRecord) -> Result<HighlightId, StoreError>;
    async fn get_all(&self, document_id: &DocumentId) -> Result<Vec<HighlightRecord>, StoreError>;
}

/// Fixed-delay retry budget for loads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            delay: DEFAULT_RETRY_DELAY,
        }
    }
}

/// Converts between geometry and stored records and retries transient load failures.
pub struct PersistenceGateway {
    store: Rc<dyn HighlightStore>,
    mapper: Rc<dyn ConfidenceMapper>,
    retry: RetryPolicy,
}

impl PersistenceGateway {
    pub fn new(
        store: Rc<dyn HighlightStore>,
        mapper: Rc<dyn ConfidenceMapper>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            store,
            mapper,
            retry,
        }
    }

    pub fn is_available(&self) -> bool {
        self.store.is_available()
    }

    pub fn mapper(&self) -> &dyn ConfidenceMapper {
        self.mapper.as_ref()
    }

    pub async fn save(
        &self,
        geometry: &HighlightGeometry,
        document_id: &DocumentId,
    ) -> HighlightResult<HighlightId> {
        if !self.store.is_available() {
            return Err(HighlightError::PersistenceUnavailable(format!(
                "cannot save highlight for document {document_id}"
            )));
        }

        let record = geometry.to_record(document_id, self.mapper.as_ref());
        let id = self.store.put(&record).await?;
        crate::debug_log!("[persist] saved highlight | {} id={}", document_id, id);
        Ok(id)
    }

    /// Loads every highlight of a document. Store errors are retried with a fixed
    /// delay; invalid records fail immediately.
    pub async fn load(&self, document_id: &DocumentId) -> HighlightResult<Vec<HighlightGeometry>> {
        let mut attempt = 0;
        loop {
            match self.load_once(document_id).await {
                Ok(geometries) => return Ok(geometries),
                Err(HighlightError::Store(source)) => {
                    if attempt >= self.retry.max_retries {
                        return Err(HighlightError::PersistenceRetryExhausted {
                            document_id: document_id.clone(),
                            attempts: attempt + 1,
                            source,
                        });
                    }
                    crate::debug_log!(
                        "[persist] load failed, retrying | {} attempt={} | {}",
                        document_id,
                        attempt,
                        source
                    );
                    attempt += 1;
                    tokio::time::sleep(self.retry.delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Single load without retries. An empty result for a textual id made of
    /// digits is retried once under its numeric form.
    pub async fn load_once(
        &self,
        document_id: &DocumentId,
    ) -> HighlightResult<Vec<HighlightGeometry>> {
        let mut records = self.store.get_all(document_id).await?;
        if records.is_empty()
            && let Some(alias) = document_id.numeric_alias()
        {
            records = self.store.get_all(&alias).await?;
            if !records.is_empty() {
                crate::debug_log!(
                    "[persist] found highlights under numeric id | {} -> {}",
                    document_id,
                    alias
                );
            }
        }

        records
            .iter()
            .map(|record| HighlightGeometry::from_record(record, self.mapper.as_ref()))
            .collect()
    }
}
