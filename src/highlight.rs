//! The persisted highlight value and its record shape.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{HighlightError, HighlightResult};
use crate::mapper::{self, PercentRect, Point, Rect};

/// Identity of a document as handed out by the host. Hosts are not consistent
/// about the type, so both textual and numeric ids are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DocumentId {
    Number(u64),
    Text(String),
}

impl DocumentId {
    /// Numeric form of a textual id made of digits, e.g. `"42"` -> `42`.
    pub fn numeric_alias(&self) -> Option<DocumentId> {
        match self {
            DocumentId::Text(text) => text.trim().parse::<u64>().ok().map(DocumentId::Number),
            DocumentId::Number(_) => None,
        }
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentId::Number(number) => write!(f, "{number}"),
            DocumentId::Text(text) => f.write_str(text),
        }
    }
}

impl From<&str> for DocumentId {
    fn from(value: &str) -> Self {
        DocumentId::Text(value.to_string())
    }
}

impl From<String> for DocumentId {
    fn from(value: String) -> Self {
        DocumentId::Text(value)
    }
}

impl From<u64> for DocumentId {
    fn from(value: u64) -> Self {
        DocumentId::Number(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HighlightId(pub u64);

impl fmt::Display for HighlightId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Confidence {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HighlightColor {
    Red,
    Yellow,
    Green,
}

/// Pairs confidence ordinals with color labels. Injected wherever records are
/// decoded so the table lives in exactly one place.
pub trait ConfidenceMapper {
    fn color_for(&self, confidence: Confidence) -> HighlightColor;
    fn confidence_for(&self, color: HighlightColor) -> Confidence;
    fn ordinal(&self, confidence: Confidence) -> u8;
    fn from_ordinal(&self, ordinal: u8) -> Option<Confidence>;
    fn label(&self, color: HighlightColor) -> &'static str;
    fn from_label(&self, label: &str) -> Option<HighlightColor>;
}

/// The fixed kPDF table: 1 = red, 2 = yellow, 3 = green.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardConfidenceMapper;

type TableRow = (Confidence, HighlightColor, u8, &'static str);

/// Row `i` holds the `i`-th variant of both enums.
const CONFIDENCE_TABLE: [TableRow; 3] = [
    (Confidence::Low, HighlightColor::Red, 1, "red"),
    (Confidence::Medium, HighlightColor::Yellow, 2, "yellow"),
    (Confidence::High, HighlightColor::Green, 3, "green"),
];

fn row_for_confidence(confidence: Confidence) -> &'static TableRow {
    &CONFIDENCE_TABLE[confidence as usize]
}

fn row_for_color(color: HighlightColor) -> &'static TableRow {
    &CONFIDENCE_TABLE[color as usize]
}

impl ConfidenceMapper for StandardConfidenceMapper {
    fn color_for(&self, confidence: Confidence) -> HighlightColor {
        row_for_confidence(confidence).1
    }

    fn confidence_for(&self, color: HighlightColor) -> Confidence {
        row_for_color(color).0
    }

    fn ordinal(&self, confidence: Confidence) -> u8 {
        row_for_confidence(confidence).2
    }

    fn from_ordinal(&self, ordinal: u8) -> Option<Confidence> {
        CONFIDENCE_TABLE
            .iter()
            .find(|(_, _, entry, _)| *entry == ordinal)
            .map(|(confidence, ..)| *confidence)
    }

    fn label(&self, color: HighlightColor) -> &'static str {
        row_for_color(color).3
    }

    fn from_label(&self, label: &str) -> Option<HighlightColor> {
        let label = label.trim();
        CONFIDENCE_TABLE
            .iter()
            .find(|(_, _, _, entry)| entry.eq_ignore_ascii_case(label))
            .map(|(_, color, ..)| *color)
    }
}

/// Flat persisted shape. Never carries pixel data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HighlightRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<HighlightId>,
    pub document_id: DocumentId,
    #[serde(default)]
    pub page: Option<usize>,
    #[serde(default)]
    pub confidence: Option<u8>,
    #[serde(default)]
    pub color: Option<String>,
    pub x_pct: f32,
    pub y_pct: f32,
    pub w_pct: f32,
    pub h_pct: f32,
}

/// One highlight in page-relative space. Immutable: changes produce a new value.
#[derive(Debug, Clone, PartialEq)]
pub struct HighlightGeometry {
    id: Option<HighlightId>,
    page: Option<usize>,
    color: HighlightColor,
    confidence: Confidence,
    rect: PercentRect,
}

impl HighlightGeometry {
    pub fn new(
        rect: PercentRect,
        color: HighlightColor,
        confidence: Confidence,
        page: Option<usize>,
        mapper: &dyn ConfidenceMapper,
    ) -> HighlightResult<Self> {
        if !rect.is_finite() {
            return Err(HighlightError::InvalidGeometry(format!(
                "non-finite percentages {rect:?}"
            )));
        }
        if mapper.color_for(confidence) != color {
            return Err(HighlightError::InvalidGeometry(format!(
                "color {} does not match confidence {}",
                mapper.label(color),
                mapper.ordinal(confidence)
            )));
        }

        Ok(Self {
            id: None,
            page,
            color,
            confidence,
            rect,
        })
    }

    /// `rect` is relative to the frame origin.
    pub fn from_rect(
        rect: &Rect,
        frame: &Rect,
        color: HighlightColor,
        confidence: Confidence,
        page: Option<usize>,
        mapper: &dyn ConfidenceMapper,
    ) -> HighlightResult<Self> {
        let pct = mapper::to_percentages(rect, frame)?;
        Self::new(pct, color, confidence, page, mapper)
    }

    /// Confidence is authoritative: a stale color label is re-derived from it.
    pub fn from_record(
        record: &HighlightRecord,
        mapper: &dyn ConfidenceMapper,
    ) -> HighlightResult<Self> {
        let confidence = match (record.confidence, record.color.as_deref()) {
            (Some(ordinal), _) => mapper.from_ordinal(ordinal).ok_or_else(|| {
                HighlightError::InvalidGeometry(format!("unknown confidence ordinal {ordinal}"))
            })?,
            (None, Some(label)) => mapper
                .from_label(label)
                .map(|color| mapper.confidence_for(color))
                .ok_or_else(|| {
                    HighlightError::InvalidGeometry(format!("unknown color label '{label}'"))
                })?,
            (None, None) => {
                return Err(HighlightError::InvalidGeometry(
                    "record has neither confidence nor color".to_string(),
                ));
            }
        };

        let color = mapper.color_for(confidence);
        if let Some(label) = record.color.as_deref()
            && mapper.from_label(label) != Some(color)
        {
            crate::debug_log!(
                "[highlight] record {:?} color '{}' disagrees with confidence, using {}",
                record.id,
                label,
                mapper.label(color)
            );
        }

        let rect = PercentRect::new(record.x_pct, record.y_pct, record.w_pct, record.h_pct);
        let geometry = Self::new(rect, color, confidence, record.page, mapper)?;
        Ok(match record.id {
            Some(id) => geometry.with_id(id),
            None => geometry,
        })
    }

    pub fn with_id(&self, id: HighlightId) -> Self {
        Self {
            id: Some(id),
            ..self.clone()
        }
    }

    pub fn id(&self) -> Option<HighlightId> {
        self.id
    }

    pub fn page(&self) -> Option<usize> {
        self.page
    }

    pub fn color(&self) -> HighlightColor {
        self.color
    }

    pub fn confidence(&self) -> Confidence {
        self.confidence
    }

    pub fn percent_rect(&self) -> PercentRect {
        self.rect
    }

    /// `None` pages are shown on every page.
    pub fn is_visible_on(&self, page: usize) -> bool {
        self.page.is_none_or(|own| own == page)
    }

    pub fn to_absolute_rect(&self, frame: &Rect, offset_x: f32, offset_y: f32) -> Rect {
        mapper::from_percentages(&self.rect, frame, Point::new(offset_x, offset_y))
    }

    pub fn to_record(
        &self,
        document_id: &DocumentId,
        mapper: &dyn ConfidenceMapper,
    ) -> HighlightRecord {
        HighlightRecord {
            id: self.id,
            document_id: document_id.clone(),
            page: self.page,
            confidence: Some(mapper.ordinal(self.confidence)),
            color: Some(mapper.label(self.color).to_string()),
            x_pct: self.rect.x_pct,
            y_pct: self.rect.y_pct,
            w_pct: self.rect.w_pct,
            h_pct: self.rect.h_pct,
        }
    }

    /// Deterministic key for spotting the same region loaded twice.
    pub fn signature(&self, document_id: &DocumentId) -> String {
        let page = self
            .page
            .map(|page| page.to_string())
            .unwrap_or_else(|| "*".to_string());
        format!(
            "{}|{}|{:?}|{:.6}|{:.6}|{:.6}|{:.6}",
            document_id,
            page,
            self.confidence,
            self.rect.x_pct,
            self.rect.y_pct,
            self.rect.w_pct,
            self.rect.h_pct
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> HighlightRecord {
        HighlightRecord {
            id: Some(HighlightId(7)),
            document_id: DocumentId::from("doc-1"),
            page: Some(2),
            confidence: Some(3),
            color: Some("green".to_string()),
            x_pct: 0.125,
            y_pct: 0.375,
            w_pct: 0.125,
            h_pct: 0.15,
        }
    }

    #[test]
    fn standard_table_agrees_both_ways() {
        let mapper = StandardConfidenceMapper;
        let expected = [
            (Confidence::Low, HighlightColor::Red, 1, "red"),
            (Confidence::Medium, HighlightColor::Yellow, 2, "yellow"),
            (Confidence::High, HighlightColor::Green, 3, "green"),
        ];
        for (confidence, color, ordinal, label) in expected {
            assert_eq!(mapper.color_for(confidence), color);
            assert_eq!(mapper.confidence_for(color), confidence);
            assert_eq!(mapper.ordinal(confidence), ordinal);
            assert_eq!(mapper.from_ordinal(ordinal), Some(confidence));
            assert_eq!(mapper.label(color), label);
            assert_eq!(mapper.from_label(label), Some(color));
        }
        assert_eq!(mapper.from_ordinal(0), None);
        assert_eq!(mapper.from_label("blue"), None);
    }

    #[test]
    fn selection_scenario_percentages() {
        let frame = Rect::sized(400.0, 200.0);
        let viewer_rect = mapper::rect_from_points(Point::new(100.0, 100.0), Point::new(150.0, 130.0));
        let local = mapper::normalize_to_target(&viewer_rect, &frame, Point::new(50.0, 25.0));
        let geometry = HighlightGeometry::from_rect(
            &local,
            &frame,
            HighlightColor::Yellow,
            Confidence::Medium,
            Some(0),
            &StandardConfidenceMapper,
        )
        .unwrap();

        let pct = geometry.percent_rect();
        assert!((pct.x_pct - 0.125).abs() < 1e-6);
        assert!((pct.y_pct - 0.375).abs() < 1e-6);
        assert!((pct.w_pct - 0.125).abs() < 1e-6);
        assert!((pct.h_pct - 0.15).abs() < 1e-6);
        assert_eq!(geometry.id(), None);
    }

    #[test]
    fn construction_rejects_bad_input() {
        let mapper = StandardConfidenceMapper;
        let nan = PercentRect::new(f32::NAN, 0.0, 0.1, 0.1);
        assert!(matches!(
            HighlightGeometry::new(nan, HighlightColor::Red, Confidence::Low, None, &mapper),
            Err(HighlightError::InvalidGeometry(_))
        ));

        let rect = PercentRect::new(0.1, 0.1, 0.1, 0.1);
        assert!(matches!(
            HighlightGeometry::new(rect, HighlightColor::Green, Confidence::Low, None, &mapper),
            Err(HighlightError::InvalidGeometry(_))
        ));
    }

    #[test]
    fn confidence_wins_over_stale_color() {
        let mut stale = record();
        stale.color = Some("red".to_string());
        let geometry = HighlightGeometry::from_record(&stale, &StandardConfidenceMapper).unwrap();
        assert_eq!(geometry.confidence(), Confidence::High);
        assert_eq!(geometry.color(), HighlightColor::Green);
        assert_eq!(geometry.id(), Some(HighlightId(7)));
    }

    #[test]
    fn record_without_confidence_uses_color() {
        let mut legacy = record();
        legacy.confidence = None;
        legacy.color = Some("Yellow".to_string());
        let geometry = HighlightGeometry::from_record(&legacy, &StandardConfidenceMapper).unwrap();
        assert_eq!(geometry.confidence(), Confidence::Medium);
    }

    #[test]
    fn record_with_unknown_values_fails() {
        let mapper = StandardConfidenceMapper;

        let mut unknown = record();
        unknown.confidence = Some(9);
        assert!(HighlightGeometry::from_record(&unknown, &mapper).is_err());

        let mut unlabeled = record();
        unlabeled.confidence = None;
        unlabeled.color = Some("purple".to_string());
        assert!(HighlightGeometry::from_record(&unlabeled, &mapper).is_err());

        let mut empty = record();
        empty.confidence = None;
        empty.color = None;
        assert!(HighlightGeometry::from_record(&empty, &mapper).is_err());
    }

    #[test]
    fn record_round_trip_keeps_identity() {
        let mapper = StandardConfidenceMapper;
        let geometry = HighlightGeometry::from_record(&record(), &mapper).unwrap();
        assert_eq!(geometry.to_record(&DocumentId::from("doc-1"), &mapper), record());
    }

    #[test]
    fn absolute_rect_uses_current_frame() {
        let geometry = HighlightGeometry::from_record(&record(), &StandardConfidenceMapper).unwrap();
        let rect = geometry.to_absolute_rect(&Rect::sized(800.0, 400.0), 50.0, 25.0);
        assert!((rect.left - 150.0).abs() < 1e-4);
        assert!((rect.top - 175.0).abs() < 1e-4);
        assert!((rect.width - 100.0).abs() < 1e-4);
        assert!((rect.height - 60.0).abs() < 1e-4);
    }

    #[test]
    fn signature_ignores_identity_and_color_label() {
        let mapper = StandardConfidenceMapper;
        let doc = DocumentId::from("doc-1");
        let saved = HighlightGeometry::from_record(&record(), &mapper).unwrap();
        let mut unsaved = record();
        unsaved.id = None;
        let unsaved = HighlightGeometry::from_record(&unsaved, &mapper).unwrap();

        assert_eq!(saved.signature(&doc), unsaved.signature(&doc));
        assert_ne!(saved.signature(&doc), saved.signature(&DocumentId::from("doc-2")));
    }

    #[test]
    fn page_visibility() {
        let mapper = StandardConfidenceMapper;
        let pinned = HighlightGeometry::from_record(&record(), &mapper).unwrap();
        assert!(pinned.is_visible_on(2));
        assert!(!pinned.is_visible_on(3));

        let mut everywhere = record();
        everywhere.page = None;
        let everywhere = HighlightGeometry::from_record(&everywhere, &mapper).unwrap();
        assert!(everywhere.is_visible_on(0) && everywhere.is_visible_on(99));
    }

    #[test]
    fn document_id_accepts_strings_and_numbers() {
        let text: DocumentId = serde_json::from_str("\"42\"").unwrap();
        let number: DocumentId = serde_json::from_str("42").unwrap();
        assert_eq!(text, DocumentId::Text("42".to_string()));
        assert_eq!(number, DocumentId::Number(42));
        assert_eq!(text.numeric_alias(), Some(number.clone()));
        assert_eq!(number.numeric_alias(), None);
        assert_eq!(DocumentId::from("score.pdf").numeric_alias(), None);
    }
}
