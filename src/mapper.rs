//! Pixel <-> page-relative geometry.
//!
//! Every function here is pure and takes its reference frame as an argument,
//! so a resize and a zoom are both handled by recomputing against the new frame.

use serde::{Deserialize, Serialize};

use crate::error::{HighlightError, HighlightResult};

pub const DEFAULT_MIN_SELECTION_SIZE: f32 = 2.0;
pub const DEFAULT_MAX_FOCUS_SCALE: f32 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle in pixels. Also used as a reference frame, where
/// `left`/`top` is the frame origin in client coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(left: f32, top: f32, width: f32, height: f32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// Frame of the given size anchored at the origin.
    pub fn sized(width: f32, height: f32) -> Self {
        Self::new(0.0, 0.0, width, height)
    }

    pub fn right(&self) -> f32 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.top + self.height
    }

    pub fn origin(&self) -> Point {
        Point::new(self.left, self.top)
    }

    pub fn center(&self) -> Point {
        Point::new(self.left + self.width / 2.0, self.top + self.height / 2.0)
    }
}

/// Rectangle expressed as fractions of a page's rendered bounds.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PercentRect {
    pub x_pct: f32,
    pub y_pct: f32,
    pub w_pct: f32,
    pub h_pct: f32,
}

impl PercentRect {
    pub fn new(x_pct: f32, y_pct: f32, w_pct: f32, h_pct: f32) -> Self {
        Self {
            x_pct,
            y_pct,
            w_pct,
            h_pct,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.x_pct.is_finite()
            && self.y_pct.is_finite()
            && self.w_pct.is_finite()
            && self.h_pct.is_finite()
    }
}

/// Scale and translation that bring a target rectangle to the center of a viewport.
/// Screen position = local position * scale + translate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FocusTransform {
    pub scale: f32,
    pub translate_x: f32,
    pub translate_y: f32,
}

pub fn relative_point(
    frame: Option<&Rect>,
    client_x: f32,
    client_y: f32,
) -> HighlightResult<Point> {
    let frame = frame.ok_or_else(|| {
        HighlightError::InvalidReference("no reference frame for pointer position".to_string())
    })?;
    Ok(Point::new(client_x - frame.left, client_y - frame.top))
}

pub fn rect_from_points(a: Point, b: Point) -> Rect {
    let left = a.x.min(b.x);
    let top = a.y.min(b.y);
    Rect::new(left, top, (a.x - b.x).abs(), (a.y - b.y).abs())
}

/// Rejects accidental clicks and taps: both dimensions must exceed their threshold.
pub fn is_significant_size(rect: &Rect, min_width: f32, min_height: f32) -> bool {
    rect.width > min_width && rect.height > min_height
}

/// Clamps a container-relative rectangle into a nested target whose origin sits
/// at `target_offset` inside the container. Each edge is clamped on its own, so a
/// rectangle entirely outside the target collapses onto the nearest border.
pub fn normalize_to_target(rect: &Rect, target: &Rect, target_offset: Point) -> Rect {
    let clamp_x = |value: f32| (value - target_offset.x).clamp(0.0, target.width.max(0.0));
    let clamp_y = |value: f32| (value - target_offset.y).clamp(0.0, target.height.max(0.0));

    let left = clamp_x(rect.left);
    let top = clamp_y(rect.top);
    let right = clamp_x(rect.right());
    let bottom = clamp_y(rect.bottom());

    Rect::new(left, top, (right - left).max(0.0), (bottom - top).max(0.0))
}

/// `rect` is relative to the frame origin; only the frame's size is used.
pub fn to_percentages(rect: &Rect, frame: &Rect) -> HighlightResult<PercentRect> {
    if !(frame.width > 0.0 && frame.height > 0.0) {
        return Err(HighlightError::InvalidReference(format!(
            "frame has no area ({}x{})",
            frame.width, frame.height
        )));
    }

    Ok(PercentRect::new(
        rect.left / frame.width,
        rect.top / frame.height,
        rect.width / frame.width,
        rect.height / frame.height,
    ))
}

pub fn from_percentages(pct: &PercentRect, frame: &Rect, offset: Point) -> Rect {
    Rect::new(
        offset.x + pct.x_pct * frame.width,
        offset.y + pct.y_pct * frame.height,
        pct.w_pct * frame.width,
        pct.h_pct * frame.height,
    )
}

/// `target` and `viewport` must share a coordinate space. The scale never exceeds
/// `max_scale`; a degenerate target is zoomed to `max_scale`.
pub fn focus_transform(
    target: &Rect,
    viewport: &Rect,
    padding: f32,
    max_scale: f32,
) -> FocusTransform {
    let available_width = (viewport.width - 2.0 * padding).max(1.0);
    let available_height = (viewport.height - 2.0 * padding).max(1.0);

    let scale_x = if target.width > 0.0 {
        available_width / target.width
    } else {
        max_scale
    };
    let scale_y = if target.height > 0.0 {
        available_height / target.height
    } else {
        max_scale
    };
    let scale = scale_x.min(scale_y).min(max_scale);

    let center = target.center();
    let local_x = center.x - viewport.left;
    let local_y = center.y - viewport.top;

    FocusTransform {
        scale,
        translate_x: viewport.width / 2.0 - local_x * scale,
        translate_y: viewport.height / 2.0 - local_y * scale,
    }
}

/// Grows a percentage rectangle by `padding` on every side, clamped to the page.
pub fn crop_area(pct: &PercentRect, padding: f32) -> PercentRect {
    let left = (pct.x_pct - padding).max(0.0);
    let top = (pct.y_pct - padding).max(0.0);
    let right = (pct.x_pct + pct.w_pct + padding).min(1.0);
    let bottom = (pct.y_pct + pct.h_pct + padding).min(1.0);

    PercentRect::new(left, top, (right - left).max(0.0), (bottom - top).max(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f32, b: f32) {
        assert!((a - b).abs() < 1e-4, "{a} != {b}");
    }

    #[test]
    fn relative_point_requires_frame() {
        let frame = Rect::new(50.0, 25.0, 400.0, 200.0);
        let point = relative_point(Some(&frame), 100.0, 100.0).unwrap();
        assert_eq!(point, Point::new(50.0, 75.0));

        let err = relative_point(None, 1.0, 1.0).unwrap_err();
        assert!(matches!(err, HighlightError::InvalidReference(_)));
    }

    #[test]
    fn rect_from_points_any_direction() {
        let rect = rect_from_points(Point::new(150.0, 130.0), Point::new(100.0, 100.0));
        assert_eq!(rect, Rect::new(100.0, 100.0, 50.0, 30.0));
    }

    #[test]
    fn significance_needs_both_dimensions() {
        assert!(!is_significant_size(&Rect::sized(1.0, 1.0), 2.0, 2.0));
        assert!(!is_significant_size(&Rect::sized(2.0, 10.0), 2.0, 2.0));
        assert!(!is_significant_size(&Rect::sized(10.0, 2.0), 2.0, 2.0));
        assert!(is_significant_size(&Rect::sized(10.0, 10.0), 2.0, 2.0));
    }

    #[test]
    fn normalize_clamps_overshoot() {
        let target = Rect::sized(400.0, 200.0);
        let offset = Point::new(50.0, 25.0);

        let rect = normalize_to_target(&Rect::new(0.0, 0.0, 600.0, 400.0), &target, offset);
        assert_eq!(rect, Rect::new(0.0, 0.0, 400.0, 200.0));

        let outside = normalize_to_target(&Rect::new(480.0, 260.0, 10.0, 10.0), &target, offset);
        assert_eq!(outside, Rect::new(400.0, 200.0, 0.0, 0.0));
    }

    #[test]
    fn normalize_never_leaves_target_bounds() {
        let target = Rect::sized(400.0, 200.0);
        let offset = Point::new(50.0, 25.0);
        let probes = [
            Rect::new(-500.0, -500.0, 50.0, 50.0),
            Rect::new(-20.0, 10.0, 1000.0, 5.0),
            Rect::new(300.0, 100.0, 500.0, 500.0),
            Rect::new(1000.0, 1000.0, 1.0, 1.0),
            Rect::new(60.0, 30.0, 20.0, 20.0),
        ];
        for probe in probes {
            let rect = normalize_to_target(&probe, &target, offset);
            assert!(rect.left >= 0.0 && rect.right() <= target.width, "{rect:?}");
            assert!(rect.top >= 0.0 && rect.bottom() <= target.height, "{rect:?}");
            assert!(rect.width >= 0.0 && rect.height >= 0.0);
        }
    }

    #[test]
    fn percentages_round_trip() {
        let frames = [
            Rect::sized(400.0, 200.0),
            Rect::new(13.0, 7.0, 612.0, 792.0),
            Rect::sized(1.5, 3.25),
        ];
        for frame in frames {
            let rect = Rect::new(frame.width * 0.2, frame.height * 0.7, frame.width * 0.3, frame.height * 0.1);
            let pct = to_percentages(&rect, &frame).unwrap();
            let back = from_percentages(&pct, &frame, Point::default());
            assert_close(back.left, rect.left);
            assert_close(back.top, rect.top);
            assert_close(back.width, rect.width);
            assert_close(back.height, rect.height);
        }
    }

    #[test]
    fn percentages_follow_a_resized_frame() {
        let pct = to_percentages(&Rect::new(50.0, 75.0, 50.0, 30.0), &Rect::sized(400.0, 200.0)).unwrap();
        let zoomed = from_percentages(&pct, &Rect::sized(800.0, 400.0), Point::new(10.0, 20.0));
        assert_close(zoomed.left, 110.0);
        assert_close(zoomed.top, 170.0);
        assert_close(zoomed.width, 100.0);
        assert_close(zoomed.height, 60.0);
    }

    #[test]
    fn percentages_reject_empty_frame() {
        let err = to_percentages(&Rect::sized(1.0, 1.0), &Rect::sized(0.0, 100.0)).unwrap_err();
        assert!(matches!(err, HighlightError::InvalidReference(_)));
    }

    #[test]
    fn focus_centers_and_caps_scale() {
        let viewport = Rect::sized(1000.0, 800.0);

        let small = Rect::new(100.0, 100.0, 10.0, 10.0);
        let transform = focus_transform(&small, &viewport, 20.0, 4.0);
        assert_close(transform.scale, 4.0);
        assert_close(105.0 * transform.scale + transform.translate_x, 500.0);
        assert_close(105.0 * transform.scale + transform.translate_y, 400.0);

        let wide = Rect::new(0.0, 0.0, 480.0, 100.0);
        let transform = focus_transform(&wide, &viewport, 20.0, 4.0);
        assert_close(transform.scale, 2.0);
        assert_close(240.0 * transform.scale + transform.translate_x, 500.0);
    }

    #[test]
    fn crop_area_pads_and_clamps() {
        let crop = crop_area(&PercentRect::new(0.02, 0.5, 0.2, 0.48), 0.05);
        assert_close(crop.x_pct, 0.0);
        assert_close(crop.y_pct, 0.45);
        assert_close(crop.w_pct, 0.27);
        assert_close(crop.h_pct, 0.55);
    }
}
