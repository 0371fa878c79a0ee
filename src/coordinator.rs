//! Decides when persisted highlights must be (re)loaded for the active document.
//!
//! Four triggers race: document selection, page changes, layout changes and the
//! coordinator starting late. The state machine below, not the arrival order of
//! events, decides whether any of them causes a load. Every load gets a
//! generation number and its result only commits while its document is still
//! current and no newer load has been issued.

use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::time::Duration;

use futures::future::LocalBoxFuture;
use tokio::task::JoinHandle;

use crate::error::{HighlightError, HighlightResult};
use crate::events::{EventKind, LifecycleEvent, Subscribable, SubscriptionId};
use crate::highlight::DocumentId;

pub const DEFAULT_SCHEDULE_DELAY: Duration = Duration::from_millis(50);

pub type LoadHook = Box<dyn Fn(LoadRequest) -> LocalBoxFuture<'static, HighlightResult<()>>>;
type PageHook = Box<dyn Fn(usize)>;
type RepositionHook = Box<dyn Fn()>;
type ClearHook = Box<dyn Fn()>;
type FailureHook = Box<dyn Fn(&DocumentId, &HighlightError)>;
type DocumentAccessor = Box<dyn Fn() -> Option<DocumentId>>;

/// Why `trigger_load` did or did not commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded,
    /// The document is no longer current.
    Stale,
    /// A load chain for this document is already running.
    InFlight,
    AlreadyLoaded,
    /// The load finished but the world moved on before it could commit.
    Superseded,
}

/// Handed to the load hook. The hook should check the ticket before touching
/// anything visible.
pub struct LoadRequest {
    pub document_id: DocumentId,
    pub attempt: u32,
    pub generation: u64,
    pub ticket: LoadTicket,
}

#[derive(Clone)]
pub struct LoadTicket {
    shared: Weak<Shared>,
    document_id: DocumentId,
    generation: u64,
}

impl LoadTicket {
    pub fn document_id(&self) -> &DocumentId {
        &self.document_id
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// True while the document is current and no newer load has been issued.
    pub fn is_current(&self) -> bool {
        let Some(shared) = self.shared.upgrade() else {
            return false;
        };
        let state = shared.state.borrow();
        state.current_document.as_ref() == Some(&self.document_id)
            && state.generation == self.generation
    }
}

/// Callbacks the coordinator drives. Only the load hook is required.
pub struct CoordinatorHooks {
    load: LoadHook,
    page_visibility: Option<PageHook>,
    reposition: Option<RepositionHook>,
    clear: Option<ClearHook>,
    load_failed: Option<FailureHook>,
}

impl CoordinatorHooks {
    pub fn new(
        load: impl Fn(LoadRequest) -> LocalBoxFuture<'static, HighlightResult<()>> + 'static,
    ) -> Self {
        Self {
            load: Box::new(load),
            page_visibility: None,
            reposition: None,
            clear: None,
            load_failed: None,
        }
    }

    pub fn on_page_visibility(mut self, hook: impl Fn(usize) + 'static) -> Self {
        self.page_visibility = Some(Box::new(hook));
        self
    }

    pub fn on_reposition(mut self, hook: impl Fn() + 'static) -> Self {
        self.reposition = Some(Box::new(hook));
        self
    }

    /// Called when a different document becomes current, before its load runs.
    pub fn on_clear(mut self, hook: impl Fn() + 'static) -> Self {
        self.clear = Some(Box::new(hook));
        self
    }

    /// Receives failures of loads nobody awaits, such as timer-driven ones.
    pub fn on_load_failed(mut self, hook: impl Fn(&DocumentId, &HighlightError) + 'static) -> Self {
        self.load_failed = Some(Box::new(hook));
        self
    }
}

#[derive(Default)]
struct CoordinatorState {
    current_document: Option<DocumentId>,
    pending_load: Option<DocumentId>,
    last_loaded: Option<DocumentId>,
    in_flight: Option<(DocumentId, u64)>,
    scheduled: Option<(DocumentId, u64)>,
    scheduled_task: Option<JoinHandle<()>>,
    schedule_epoch: u64,
    generation: u64,
    subscriptions: Vec<SubscriptionId>,
}

struct Shared {
    state: RefCell<CoordinatorState>,
    hooks: CoordinatorHooks,
    bus: Rc<dyn Subscribable>,
    schedule_delay: Duration,
    active_document: RefCell<Option<DocumentAccessor>>,
}

/// Cheap to clone; clones share one state machine.
#[derive(Clone)]
pub struct RehydrationCoordinator {
    shared: Rc<Shared>,
}

impl RehydrationCoordinator {
    pub fn new(
        bus: Rc<dyn Subscribable>,
        hooks: CoordinatorHooks,
        schedule_delay: Duration,
    ) -> Self {
        Self {
            shared: Rc::new(Shared {
                state: RefCell::new(CoordinatorState::default()),
                hooks,
                bus,
                schedule_delay,
                active_document: RefCell::new(None),
            }),
        }
    }

    /// Fallback used at startup when the bus has no buffered selection.
    pub fn with_active_document(
        self,
        accessor: impl Fn() -> Option<DocumentId> + 'static,
    ) -> Self {
        *self.shared.active_document.borrow_mut() = Some(Box::new(accessor));
        self
    }

    pub fn current_document(&self) -> Option<DocumentId> {
        self.shared.state.borrow().current_document.clone()
    }

    pub fn pending_load(&self) -> Option<DocumentId> {
        self.shared.state.borrow().pending_load.clone()
    }

    pub fn last_loaded(&self) -> Option<DocumentId> {
        self.shared.state.borrow().last_loaded.clone()
    }

    pub fn load_in_flight(&self) -> Option<DocumentId> {
        self.shared
            .state
            .borrow()
            .in_flight
            .as_ref()
            .map(|(document_id, _)| document_id.clone())
    }

    pub fn scheduled(&self) -> Option<DocumentId> {
        self.shared
            .state
            .borrow()
            .scheduled
            .as_ref()
            .map(|(document_id, _)| document_id.clone())
    }

    pub fn generation(&self) -> u64 {
        self.shared.state.borrow().generation
    }

    pub fn is_started(&self) -> bool {
        !self.shared.state.borrow().subscriptions.is_empty()
    }

    /// Runs one load for `document_id` unless a guard says it is not needed.
    /// Errors from the load hook propagate after the in-flight marker is cleared.
    pub async fn trigger_load(
        &self,
        document_id: DocumentId,
        attempt: u32,
    ) -> HighlightResult<LoadOutcome> {
        let (request, generation) = {
            let mut state = self.shared.state.borrow_mut();

            if state.current_document.as_ref() != Some(&document_id) {
                crate::debug_log!("[rehydrate] stale load ignored | {}", document_id);
                return Ok(LoadOutcome::Stale);
            }
            if attempt == 0
                && state
                    .in_flight
                    .as_ref()
                    .is_some_and(|(in_flight, _)| *in_flight == document_id)
            {
                crate::debug_log!("[rehydrate] load already in flight | {}", document_id);
                return Ok(LoadOutcome::InFlight);
            }
            if state.last_loaded.as_ref() == Some(&document_id) {
                if state.pending_load.as_ref() == Some(&document_id) {
                    state.pending_load = None;
                }
                return Ok(LoadOutcome::AlreadyLoaded);
            }

            state.generation = state.generation.wrapping_add(1);
            let generation = state.generation;
            state.in_flight = Some((document_id.clone(), generation));

            let request = LoadRequest {
                document_id: document_id.clone(),
                attempt,
                generation,
                ticket: LoadTicket {
                    shared: Rc::downgrade(&self.shared),
                    document_id: document_id.clone(),
                    generation,
                },
            };
            (request, generation)
        };

        crate::debug_log!(
            "[rehydrate] loading | {} attempt={} generation={}",
            document_id,
            attempt,
            generation
        );
        let result = (self.shared.hooks.load)(request).await;

        let mut state = self.shared.state.borrow_mut();
        if state
            .in_flight
            .as_ref()
            .is_some_and(|(in_flight, own)| *in_flight == document_id && *own == generation)
        {
            state.in_flight = None;
        }
        result?;

        if state.current_document.as_ref() != Some(&document_id) || state.generation != generation
        {
            crate::debug_log!(
                "[rehydrate] load superseded | {} generation={}",
                document_id,
                generation
            );
            return Ok(LoadOutcome::Superseded);
        }

        state.last_loaded = Some(document_id.clone());
        state.pending_load = None;
        state.scheduled = None;
        if let Some(task) = state.scheduled_task.take() {
            task.abort();
        }
        crate::debug_log!("[rehydrate] committed | {}", document_id);
        Ok(LoadOutcome::Loaded)
    }

    /// Debounced `trigger_load`. Returns false when a load for the same document
    /// is already scheduled. Must be called inside a `LocalSet`.
    pub fn schedule_load(&self, document_id: DocumentId, delay: Duration) -> bool {
        let mut state = self.shared.state.borrow_mut();
        if state
            .scheduled
            .as_ref()
            .is_some_and(|(scheduled, _)| *scheduled == document_id)
        {
            return false;
        }

        if let Some(task) = state.scheduled_task.take() {
            task.abort();
        }
        state.schedule_epoch = state.schedule_epoch.wrapping_add(1);
        let epoch = state.schedule_epoch;
        state.scheduled = Some((document_id.clone(), epoch));

        let shared = Rc::downgrade(&self.shared);
        let task = tokio::task::spawn_local(async move {
            tokio::time::sleep(delay).await;

            let Some(shared) = shared.upgrade() else {
                return;
            };
            {
                let mut state = shared.state.borrow_mut();
                if state.scheduled.as_ref().map(|(_, own)| *own) != Some(epoch) {
                    return;
                }
                state.scheduled = None;
                state.scheduled_task = None;
            }

            let coordinator = RehydrationCoordinator { shared };
            if let Err(err) = coordinator.trigger_load(document_id.clone(), 0).await {
                coordinator.report_failure(&document_id, &err);
            }
        });
        state.scheduled_task = Some(task);
        true
    }

    /// Switching to another document drops what is displayed and forgets the
    /// last load, so coming back reloads instead of reporting `AlreadyLoaded`.
    pub fn on_document_selected(&self, document_id: DocumentId) {
        let switched = {
            let mut state = self.shared.state.borrow_mut();
            let switched = state.current_document.as_ref() != Some(&document_id);
            if switched {
                state.last_loaded = None;
            }
            state.current_document = Some(document_id.clone());
            state.pending_load = Some(document_id.clone());
            switched
        };
        if switched && let Some(hook) = &self.shared.hooks.clear {
            crate::debug_log!("[rehydrate] clearing display | {}", document_id);
            hook();
        }
        self.shared.bus.remember(&LifecycleEvent::DocumentSelected {
            document_id: document_id.clone(),
        });
        self.schedule_load(document_id, self.shared.schedule_delay);
    }

    /// Forwards the page to the visibility hook. A page change means the surface
    /// is ready, so a load still pending for the current document runs now.
    pub async fn on_page_changed(&self, page: usize) -> HighlightResult<Option<LoadOutcome>> {
        match self.load_for_page(page).await {
            Some((_, result)) => result.map(Some),
            None => Ok(None),
        }
    }

    /// Like `on_page_changed`, but keeps the id of the document it tried to load.
    async fn load_for_page(
        &self,
        page: usize,
    ) -> Option<(DocumentId, HighlightResult<LoadOutcome>)> {
        if let Some(hook) = &self.shared.hooks.page_visibility {
            hook(page);
        }

        let pending = {
            let state = self.shared.state.borrow();
            match (&state.pending_load, &state.current_document) {
                (Some(pending), Some(current)) if pending == current => Some(pending.clone()),
                _ => None,
            }
        };
        let document_id = pending?;
        let result = self.trigger_load(document_id.clone(), 0).await;
        Some((document_id, result))
    }

    pub fn on_layout_changed(&self) {
        if let Some(hook) = &self.shared.hooks.reposition {
            hook();
        }
    }

    /// Subscribes to the bus and replays the last selection if it was missed.
    /// Must be called inside a `LocalSet`.
    pub fn start(&self) {
        if self.is_started() {
            return;
        }

        let bus = self.shared.bus.clone();
        let subscriptions = vec![
            bus.subscribe(
                EventKind::DocumentSelected,
                self.handler(|coordinator, event| {
                    if let LifecycleEvent::DocumentSelected { document_id } = event {
                        coordinator.on_document_selected(document_id.clone());
                    }
                }),
            ),
            bus.subscribe(
                EventKind::PageChanged,
                self.handler(|coordinator, event| {
                    if let LifecycleEvent::PageChanged { page } = *event {
                        tokio::task::spawn_local(async move {
                            if let Some((document_id, Err(err))) =
                                coordinator.load_for_page(page).await
                            {
                                coordinator.report_failure(&document_id, &err);
                            }
                        });
                    }
                }),
            ),
            bus.subscribe(
                EventKind::LayoutChanged,
                self.handler(|coordinator, _| coordinator.on_layout_changed()),
            ),
        ];
        self.shared.state.borrow_mut().subscriptions = subscriptions;

        self.replay();
    }

    pub fn stop(&self) {
        let subscriptions = {
            let mut state = self.shared.state.borrow_mut();
            state.scheduled = None;
            if let Some(task) = state.scheduled_task.take() {
                task.abort();
            }
            std::mem::take(&mut state.subscriptions)
        };
        for id in subscriptions {
            self.shared.bus.unsubscribe(id);
        }
    }

    fn replay(&self) {
        let (pending, idle) = {
            let state = self.shared.state.borrow();
            (
                state.pending_load.clone(),
                state.scheduled.is_none() && state.in_flight.is_none(),
            )
        };
        if let Some(document_id) = pending {
            // A load left pending by `stop` has lost its timer.
            if idle {
                crate::debug_log!("[rehydrate] rescheduling pending load | {}", document_id);
                self.schedule_load(document_id, self.shared.schedule_delay);
            }
            return;
        }

        if let Some(LifecycleEvent::DocumentSelected { document_id }) =
            self.shared.bus.last(EventKind::DocumentSelected)
        {
            crate::debug_log!("[rehydrate] replaying buffered selection | {}", document_id);
            self.on_document_selected(document_id);
            return;
        }

        let active = self
            .shared
            .active_document
            .borrow()
            .as_ref()
            .and_then(|accessor| accessor());
        let has_current = self.shared.state.borrow().current_document.is_some();
        if let Some(document_id) = active
            && !has_current
        {
            crate::debug_log!("[rehydrate] adopting active document | {}", document_id);
            self.on_document_selected(document_id);
        }
    }

    fn handler(
        &self,
        handle: impl Fn(RehydrationCoordinator, &LifecycleEvent) + 'static,
    ) -> Rc<dyn Fn(&LifecycleEvent)> {
        let shared = Rc::downgrade(&self.shared);
        Rc::new(move |event: &LifecycleEvent| {
            if let Some(shared) = shared.upgrade() {
                handle(RehydrationCoordinator { shared }, event);
            }
        })
    }

    fn report_failure(&self, document_id: &DocumentId, err: &HighlightError) {
        crate::warn_log!("[rehydrate] load failed | {} | {}", document_id, err);
        if let Some(hook) = &self.shared.hooks.load_failed {
            hook(document_id, err);
        }
    }
}
