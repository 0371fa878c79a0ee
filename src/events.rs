//! Lifecycle events that drive rehydration.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::highlight::DocumentId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    DocumentSelected,
    PageChanged,
    LayoutChanged,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    DocumentSelected { document_id: DocumentId },
    PageChanged { page: usize },
    LayoutChanged,
}

impl LifecycleEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            LifecycleEvent::DocumentSelected { .. } => EventKind::DocumentSelected,
            LifecycleEvent::PageChanged { .. } => EventKind::PageChanged,
            LifecycleEvent::LayoutChanged => EventKind::LayoutChanged,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

pub type EventHandler = Rc<dyn Fn(&LifecycleEvent)>;

/// Event source the coordinator listens on. Keeps the last event of every kind
/// so late subscribers can catch up.
pub trait Subscribable {
    fn subscribe(&self, kind: EventKind, handler: EventHandler) -> SubscriptionId;
    fn unsubscribe(&self, id: SubscriptionId) -> bool;
    fn dispatch(&self, event: LifecycleEvent);
    fn last(&self, kind: EventKind) -> Option<LifecycleEvent>;
    /// Records an event for replay without delivering it.
    fn remember(&self, event: &LifecycleEvent);
}

#[derive(Default)]
struct BusState {
    next_id: u64,
    handlers: Vec<(SubscriptionId, EventKind, EventHandler)>,
    last: HashMap<EventKind, LifecycleEvent>,
}

/// In-process event bus. Handlers may subscribe, unsubscribe or dispatch from
/// inside a handler; they see the handler list as it was when dispatch began.
#[derive(Default)]
pub struct EventBus {
    state: RefCell<BusState>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.state
            .borrow()
            .handlers
            .iter()
            .filter(|(_, handler_kind, _)| *handler_kind == kind)
            .count()
    }
}

impl Subscribable for EventBus {
    fn subscribe(&self, kind: EventKind, handler: EventHandler) -> SubscriptionId {
        let mut state = self.state.borrow_mut();
        state.next_id += 1;
        let id = SubscriptionId(state.next_id);
        state.handlers.push((id, kind, handler));
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut state = self.state.borrow_mut();
        let before = state.handlers.len();
        state.handlers.retain(|(handler_id, ..)| *handler_id != id);
        state.handlers.len() != before
    }

    fn dispatch(&self, event: LifecycleEvent) {
        let kind = event.kind();
        let handlers: Vec<EventHandler> = {
            let mut state = self.state.borrow_mut();
            state.last.insert(kind, event.clone());
            state
                .handlers
                .iter()
                .filter(|(_, handler_kind, _)| *handler_kind == kind)
                .map(|(_, _, handler)| handler.clone())
                .collect()
        };

        for handler in handlers {
            handler(&event);
        }
    }

    fn last(&self, kind: EventKind) -> Option<LifecycleEvent> {
        self.state.borrow().last.get(&kind).cloned()
    }

    fn remember(&self, event: &LifecycleEvent) {
        self.state
            .borrow_mut()
            .last
            .insert(event.kind(), event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn dispatch_reaches_matching_handlers_only() {
        let bus = EventBus::new();
        let pages = Rc::new(Cell::new(0));
        let layouts = Rc::new(Cell::new(0));

        let counter = pages.clone();
        bus.subscribe(
            EventKind::PageChanged,
            Rc::new(move |_: &LifecycleEvent| counter.set(counter.get() + 1)),
        );
        let counter = layouts.clone();
        bus.subscribe(
            EventKind::LayoutChanged,
            Rc::new(move |_: &LifecycleEvent| counter.set(counter.get() + 1)),
        );

        bus.dispatch(LifecycleEvent::PageChanged { page: 3 });
        bus.dispatch(LifecycleEvent::PageChanged { page: 4 });

        assert_eq!(pages.get(), 2);
        assert_eq!(layouts.get(), 0);
    }

    #[test]
    fn last_event_is_buffered_for_late_subscribers() {
        let bus = EventBus::new();
        assert_eq!(bus.last(EventKind::DocumentSelected), None);

        bus.dispatch(LifecycleEvent::DocumentSelected {
            document_id: "a".into(),
        });
        bus.dispatch(LifecycleEvent::DocumentSelected {
            document_id: "b".into(),
        });

        assert_eq!(
            bus.last(EventKind::DocumentSelected),
            Some(LifecycleEvent::DocumentSelected {
                document_id: "b".into()
            })
        );

        bus.remember(&LifecycleEvent::PageChanged { page: 7 });
        assert_eq!(
            bus.last(EventKind::PageChanged),
            Some(LifecycleEvent::PageChanged { page: 7 })
        );
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let bus = EventBus::new();
        let hits = Rc::new(Cell::new(0));
        let counter = hits.clone();
        let id = bus.subscribe(
            EventKind::LayoutChanged,
            Rc::new(move |_: &LifecycleEvent| counter.set(counter.get() + 1)),
        );

        bus.dispatch(LifecycleEvent::LayoutChanged);
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        bus.dispatch(LifecycleEvent::LayoutChanged);

        assert_eq!(hits.get(), 1);
        assert_eq!(bus.subscriber_count(EventKind::LayoutChanged), 0);
    }

    #[test]
    fn handlers_can_dispatch_reentrantly() {
        let bus = Rc::new(EventBus::new());
        let layouts = Rc::new(Cell::new(0));

        let inner = Rc::downgrade(&bus);
        bus.subscribe(
            EventKind::PageChanged,
            Rc::new(move |_: &LifecycleEvent| {
                if let Some(bus) = inner.upgrade() {
                    bus.dispatch(LifecycleEvent::LayoutChanged);
                }
            }),
        );
        let counter = layouts.clone();
        bus.subscribe(
            EventKind::LayoutChanged,
            Rc::new(move |_: &LifecycleEvent| counter.set(counter.get() + 1)),
        );

        bus.dispatch(LifecycleEvent::PageChanged { page: 1 });
        assert_eq!(layouts.get(), 1);
    }
}
