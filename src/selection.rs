use crate::mapper::{self, DEFAULT_MIN_SELECTION_SIZE, Point, Rect};

/// Rectangle preview drawn while a drag is in progress.
pub trait SelectionFeedback {
    fn show(&mut self, x: f32, y: f32, width: f32, height: f32);
    fn hide(&mut self);
    fn update_from_points(&mut self, a: Point, b: Point);
}

/// Feedback sink for headless use.
#[derive(Debug, Default)]
pub struct NoopFeedback;

impl SelectionFeedback for NoopFeedback {
    fn show(&mut self, _x: f32, _y: f32, _width: f32, _height: f32) {}
    fn hide(&mut self) {}
    fn update_from_points(&mut self, _a: Point, _b: Point) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerId {
    Mouse,
    Touch(u64),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletedSelection {
    pub rect: Rect,
    pub start: Point,
    pub end: Point,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GestureState {
    Idle,
    Selecting {
        pointer: PointerId,
        start: Point,
        current: Point,
    },
}

type CompleteCallback = Box<dyn FnMut(&CompletedSelection)>;

/// Tracks a single pointer drag and turns it into a candidate rectangle.
///
/// Only one pointer is followed at a time. Events from any other pointer, and
/// `update`/`end` calls while idle, are ignored so host event noise never
/// surfaces as an error.
pub struct SelectionGesture {
    state: GestureState,
    enabled: bool,
    min_width: f32,
    min_height: f32,
    feedback: Box<dyn SelectionFeedback>,
    on_complete: Vec<CompleteCallback>,
}

impl SelectionGesture {
    pub fn new(feedback: Box<dyn SelectionFeedback>) -> Self {
        Self::with_min_size(feedback, DEFAULT_MIN_SELECTION_SIZE, DEFAULT_MIN_SELECTION_SIZE)
    }

    pub fn with_min_size(
        feedback: Box<dyn SelectionFeedback>,
        min_width: f32,
        min_height: f32,
    ) -> Self {
        Self {
            state: GestureState::Idle,
            enabled: true,
            min_width,
            min_height,
            feedback,
            on_complete: Vec::new(),
        }
    }

    pub fn on_complete(&mut self, callback: impl FnMut(&CompletedSelection) + 'static) {
        self.on_complete.push(Box::new(callback));
    }

    pub fn state(&self) -> GestureState {
        self.state
    }

    pub fn is_selecting(&self) -> bool {
        matches!(self.state, GestureState::Selecting { .. })
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn active_pointer(&self) -> Option<PointerId> {
        match self.state {
            GestureState::Selecting { pointer, .. } => Some(pointer),
            GestureState::Idle => None,
        }
    }

    /// Live rectangle of the drag in progress.
    pub fn current_rect(&self) -> Option<Rect> {
        match self.state {
            GestureState::Selecting { start, current, .. } => {
                Some(mapper::rect_from_points(start, current))
            }
            GestureState::Idle => None,
        }
    }

    pub fn begin(&mut self, point: Point) -> bool {
        self.begin_with_pointer(PointerId::Mouse, point)
    }

    /// Returns whether the gesture started.
    pub fn begin_with_pointer(&mut self, pointer: PointerId, point: Point) -> bool {
        if !self.enabled || self.is_selecting() {
            return false;
        }

        self.state = GestureState::Selecting {
            pointer,
            start: point,
            current: point,
        };
        self.feedback.show(point.x, point.y, 1.0, 1.0);
        true
    }

    pub fn update(&mut self, point: Point) {
        self.update_pointer(PointerId::Mouse, point);
    }

    pub fn update_pointer(&mut self, pointer: PointerId, point: Point) {
        let GestureState::Selecting {
            pointer: active,
            start,
            ..
        } = self.state
        else {
            return;
        };
        if active != pointer {
            return;
        }

        self.state = GestureState::Selecting {
            pointer,
            start,
            current: point,
        };
        self.feedback.update_from_points(start, point);
    }

    pub fn end(&mut self, point: Point) -> Option<CompletedSelection> {
        self.end_pointer(PointerId::Mouse, point)
    }

    /// Finishes the drag. The gesture returns to idle whether or not the
    /// rectangle was large enough to count as a selection.
    pub fn end_pointer(&mut self, pointer: PointerId, point: Point) -> Option<CompletedSelection> {
        let GestureState::Selecting {
            pointer: active,
            start,
            ..
        } = self.state
        else {
            return None;
        };
        if active != pointer {
            return None;
        }

        self.reset();

        let rect = mapper::rect_from_points(start, point);
        if !mapper::is_significant_size(&rect, self.min_width, self.min_height) {
            crate::debug_log!(
                "[selection] ignored small selection | {}x{}",
                rect.width,
                rect.height
            );
            return None;
        }

        let completed = CompletedSelection {
            rect,
            start,
            end: point,
        };
        for callback in &mut self.on_complete {
            callback(&completed);
        }
        Some(completed)
    }

    /// Cleans up like `end` but never completes.
    pub fn abort(&mut self) {
        if self.is_selecting() {
            self.reset();
        }
    }

    /// Touch cancel or pointer leaving the surface.
    pub fn cancel_pointer(&mut self, pointer: PointerId) {
        if self.active_pointer() == Some(pointer) {
            self.reset();
        }
    }

    pub fn disable(&mut self) {
        self.abort();
        self.enabled = false;
    }

    pub fn enable(&mut self) {
        self.enabled = true;
    }

    fn reset(&mut self) {
        self.state = GestureState::Idle;
        self.feedback.hide();
    }
}
