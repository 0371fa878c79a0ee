use std::collections::HashSet;

use crate::highlight::{DocumentId, HighlightGeometry};
use crate::mapper::{Point, Rect};

#[derive(Debug, Clone, PartialEq)]
pub struct DisplayedHighlight {
    pub geometry: HighlightGeometry,
    pub signature: String,
    /// Absolute rectangle for the frame last applied.
    pub rect: Rect,
    pub visible: bool,
}

/// The set of highlights currently drawn over the page. Rectangles are always
/// derived from the stored percentages, never kept as the source of truth.
#[derive(Debug, Default)]
pub struct HighlightOverlay {
    document_id: Option<DocumentId>,
    items: Vec<DisplayedHighlight>,
    signatures: HashSet<String>,
    frame: Rect,
    offset: Point,
    page: Option<usize>,
}

impl HighlightOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn document_id(&self) -> Option<&DocumentId> {
        self.document_id.as_ref()
    }

    pub fn items(&self) -> &[DisplayedHighlight] {
        &self.items
    }

    pub fn visible(&self) -> impl Iterator<Item = &DisplayedHighlight> {
        self.items.iter().filter(|item| item.visible)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Swaps in the full set for a document in one step. Duplicates by
    /// signature are dropped.
    pub fn replace(
        &mut self,
        document_id: DocumentId,
        geometries: Vec<HighlightGeometry>,
        frame: Rect,
        offset: Point,
    ) {
        self.items.clear();
        self.signatures.clear();
        self.document_id = Some(document_id);
        self.frame = frame;
        self.offset = offset;

        let total = geometries.len();
        for geometry in geometries {
            self.insert(geometry);
        }
        if self.items.len() != total {
            crate::debug_log!(
                "[overlay] dropped duplicate highlights | {}",
                total - self.items.len()
            );
        }
    }

    /// Adds one highlight to the current document. Returns false for a duplicate
    /// or when no document is shown.
    pub fn push(&mut self, geometry: HighlightGeometry) -> bool {
        if self.document_id.is_none() {
            return false;
        }
        self.insert(geometry)
    }

    pub fn reposition(&mut self, frame: Rect, offset: Point) {
        self.frame = frame;
        self.offset = offset;
        for item in &mut self.items {
            item.rect = item.geometry.to_absolute_rect(&frame, offset.x, offset.y);
        }
    }

    pub fn set_page(&mut self, page: usize) {
        self.page = Some(page);
        for item in &mut self.items {
            item.visible = item.geometry.is_visible_on(page);
        }
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.signatures.clear();
        self.document_id = None;
    }

    fn insert(&mut self, geometry: HighlightGeometry) -> bool {
        let Some(document_id) = &self.document_id else {
            return false;
        };
        let signature = geometry.signature(document_id);
        if !self.signatures.insert(signature.clone()) {
            return false;
        }

        let rect = geometry.to_absolute_rect(&self.frame, self.offset.x, self.offset.y);
        let visible = self.page.is_none_or(|page| geometry.is_visible_on(page));
        self.items.push(DisplayedHighlight {
            geometry,
            signature,
            rect,
            visible,
        });
        true
    }
}
