//! Glue between the pointer, the store and what is drawn on the page.

use std::cell::{Ref, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use futures::FutureExt;

use crate::config::{FocusConfig, HighlightsConfig, SelectionConfig};
use crate::coordinator::{CoordinatorHooks, LoadRequest};
use crate::error::{HighlightError, HighlightResult};
use crate::highlight::{DocumentId, HighlightColor, HighlightGeometry};
use crate::mapper::{self, FocusTransform, PercentRect, Point, Rect};
use crate::overlay::HighlightOverlay;
use crate::persistence::PersistenceGateway;
use crate::selection::{CompletedSelection, SelectionFeedback, SelectionGesture};

/// The rendered page: its size and where it sits inside the viewer container.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PageFrame {
    pub frame: Rect,
    pub offset: Point,
}

/// Whatever renders the document pages.
pub trait RenderSurface {
    fn current_page_index(&self) -> usize;
    /// `None` while no page is rendered.
    fn page_frame(&self) -> Option<PageFrame>;
}

pub struct HighlightSession {
    gateway: PersistenceGateway,
    surface: Rc<dyn RenderSurface>,
    overlay: RefCell<HighlightOverlay>,
    /// Saved since the last committed load of their document. A load may have
    /// read the store before they were written.
    unsynced: RefCell<HashMap<DocumentId, Vec<HighlightGeometry>>>,
    selection: SelectionConfig,
    focus: FocusConfig,
}

impl HighlightSession {
    pub fn new(
        gateway: PersistenceGateway,
        surface: Rc<dyn RenderSurface>,
        config: &HighlightsConfig,
    ) -> Self {
        Self {
            gateway,
            surface,
            overlay: RefCell::new(HighlightOverlay::new()),
            unsynced: RefCell::new(HashMap::new()),
            selection: config.selection.clone(),
            focus: config.focus.clone(),
        }
    }

    pub fn gateway(&self) -> &PersistenceGateway {
        &self.gateway
    }

    pub fn overlay(&self) -> Ref<'_, HighlightOverlay> {
        self.overlay.borrow()
    }

    /// Gesture using the configured significance thresholds.
    pub fn new_gesture(&self, feedback: Box<dyn SelectionFeedback>) -> SelectionGesture {
        SelectionGesture::with_min_size(feedback, self.selection.min_width, self.selection.min_height)
    }

    fn page_frame(&self) -> HighlightResult<PageFrame> {
        self.surface.page_frame().ok_or_else(|| {
            HighlightError::InvalidReference("no page is rendered".to_string())
        })
    }

    /// Turns a finished drag (in viewer coordinates) into a saved highlight on
    /// the current page. Returns `None` when the part inside the page is too
    /// small to keep.
    pub async fn record_selection(
        &self,
        document_id: &DocumentId,
        selection: &CompletedSelection,
        color: HighlightColor,
    ) -> HighlightResult<Option<HighlightGeometry>> {
        let page = self.page_frame()?;
        let local = mapper::normalize_to_target(&selection.rect, &page.frame, page.offset);
        if !mapper::is_significant_size(&local, self.selection.min_width, self.selection.min_height)
        {
            crate::debug_log!(
                "[session] selection outside page ignored | {}x{}",
                local.width,
                local.height
            );
            return Ok(None);
        }

        let table = self.gateway.mapper();
        let geometry = HighlightGeometry::from_rect(
            &local,
            &page.frame,
            color,
            table.confidence_for(color),
            Some(self.surface.current_page_index()),
            table,
        )?;
        let id = self.gateway.save(&geometry, document_id).await?;
        let saved = geometry.with_id(id);

        self.unsynced
            .borrow_mut()
            .entry(document_id.clone())
            .or_default()
            .push(saved.clone());
        let mut overlay = self.overlay.borrow_mut();
        if overlay.document_id() == Some(document_id) {
            overlay.push(saved.clone());
        }
        Ok(Some(saved))
    }

    /// Load hook for the coordinator. The displayed set is replaced in one step
    /// and only while the request is still current. Highlights saved while the
    /// load was running are merged in.
    pub async fn load(&self, request: LoadRequest) -> HighlightResult<()> {
        let mut geometries = self.gateway.load(&request.document_id).await?;
        if !request.ticket.is_current() {
            crate::debug_log!(
                "[session] discarding outdated load | {} generation={}",
                request.document_id,
                request.generation
            );
            return Ok(());
        }

        if let Some(saved) = self.unsynced.borrow_mut().remove(&request.document_id) {
            geometries.extend(saved);
        }
        let page = self.surface.page_frame().unwrap_or_else(|| {
            crate::debug_log!(
                "[session] no page rendered, layout waits for reposition | {}",
                request.document_id
            );
            PageFrame::default()
        });
        let mut overlay = self.overlay.borrow_mut();
        overlay.replace(request.document_id, geometries, page.frame, page.offset);
        overlay.set_page(self.surface.current_page_index());
        Ok(())
    }

    pub fn reposition(&self) {
        if let Some(page) = self.surface.page_frame() {
            self.overlay.borrow_mut().reposition(page.frame, page.offset);
        }
    }

    /// Drops the displayed set when another document becomes current.
    pub fn clear(&self) {
        self.overlay.borrow_mut().clear();
    }

    pub fn show_page(&self, page: usize) {
        self.overlay.borrow_mut().set_page(page);
        self.reposition();
    }

    /// Hooks that make this session the coordinator's loader and renderer.
    pub fn coordinator_hooks(self: &Rc<Self>) -> CoordinatorHooks {
        let loader = Rc::clone(self);
        let pager = Rc::clone(self);
        let layout = Rc::clone(self);
        let clearer = Rc::clone(self);
        CoordinatorHooks::new(move |request| {
            let session = Rc::clone(&loader);
            async move { session.load(request).await }.boxed_local()
        })
        .on_page_visibility(move |page| pager.show_page(page))
        .on_reposition(move || layout.reposition())
        .on_clear(move || clearer.clear())
    }

    /// Transform that zooms the viewer onto a highlight. `viewport` is in the
    /// same coordinate space as the page offset.
    pub fn focus_on(
        &self,
        geometry: &HighlightGeometry,
        viewport: &Rect,
    ) -> HighlightResult<FocusTransform> {
        let page = self.page_frame()?;
        let target = geometry.to_absolute_rect(&page.frame, page.offset.x, page.offset.y);
        Ok(mapper::focus_transform(
            &target,
            viewport,
            self.focus.padding,
            self.focus.max_scale,
        ))
    }

    pub fn crop_for(&self, geometry: &HighlightGeometry) -> PercentRect {
        mapper::crop_area(&geometry.percent_rect(), self.focus.crop_padding)
    }
}
