//! Confidence highlights for kPDF.
//!
//! Highlights are stored as fractions of the rendered page so they survive
//! resizes and zooms. [`coordinator::RehydrationCoordinator`] decides when the
//! stored set is loaded again for the active document.

pub mod config;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod highlight;
pub mod logger;
pub mod mapper;
pub mod overlay;
pub mod persistence;
pub mod selection;
pub mod session;
pub mod store;

pub use config::HighlightsConfig;
pub use coordinator::{CoordinatorHooks, LoadOutcome, LoadRequest, LoadTicket, RehydrationCoordinator};
pub use error::{HighlightError, HighlightResult, StoreError};
pub use events::{EventBus, EventKind, LifecycleEvent, Subscribable};
pub use highlight::{
    Confidence, ConfidenceMapper, DocumentId, HighlightColor, HighlightGeometry, HighlightId,
    HighlightRecord, StandardConfidenceMapper,
};
pub use mapper::{FocusTransform, PercentRect, Point, Rect};
pub use overlay::HighlightOverlay;
pub use persistence::{HighlightStore, PersistenceGateway, RetryPolicy};
pub use selection::{CompletedSelection, PointerId, SelectionFeedback, SelectionGesture};
pub use session::{HighlightSession, PageFrame, RenderSurface};
pub use store::SledHighlightStore;
