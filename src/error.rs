use crate::highlight::DocumentId;

/// Errors raised by the highlight core.
///
/// Stale events, duplicate load chains and already-loaded documents are not
/// errors; the coordinator reports those through `LoadOutcome` instead.
#[derive(Debug, thiserror::Error)]
pub enum HighlightError {
    #[error("invalid reference frame: {0}")]
    InvalidReference(String),
    #[error("invalid highlight geometry: {0}")]
    InvalidGeometry(String),
    #[error("highlight store unavailable: {0}")]
    PersistenceUnavailable(String),
    #[error("loading highlights for document {document_id} failed after {attempts} attempts")]
    PersistenceRetryExhausted {
        document_id: DocumentId,
        attempts: u32,
        #[source]
        source: StoreError,
    },
    #[error("highlight store error: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store is not open")]
    Unavailable,
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),
    #[error("record codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

pub type HighlightResult<T> = Result<T, HighlightError>;
