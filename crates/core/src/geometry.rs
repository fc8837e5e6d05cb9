//! Normalized page coordinate space
//!
//! Annotations are stored as fractions of the page's width and height so they
//! stay valid under zoom and device pixel ratio changes. Pixel dimensions only
//! enter the picture while handling pointer input and at draw time.
//!
//! Coordinate system:
//! - Origin (0, 0) at the top-left of the page
//! - X increases to the right, Y increases downward
//! - Committed values lie in `[0, 1]` on both axes

use serde::{Deserialize, Serialize};

/// A point in normalized page space
///
/// In-progress gestures may produce values outside `[0, 1]`; anything
/// persisted after a commit is clamped with [`NormalizedPoint::clamped`].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct NormalizedPoint {
    pub x: f64,
    pub y: f64,
}

impl NormalizedPoint {
    /// Create a new normalized point
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Clamp both axes into `[0, 1]`
    pub fn clamped(self) -> Self {
        Self {
            x: clamp_unit(self.x),
            y: clamp_unit(self.y),
        }
    }

    /// Whether both axes already lie in `[0, 1]`
    pub fn is_within_page(&self) -> bool {
        (0.0..=1.0).contains(&self.x) && (0.0..=1.0).contains(&self.y)
    }

    /// Offset by a delta and clamp the result into the page
    pub fn translated(self, delta: NormalizedDelta) -> Self {
        Self::new(self.x + delta.dx, self.y + delta.dy).clamped()
    }
}

/// A displacement in normalized units
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct NormalizedDelta {
    pub dx: f64,
    pub dy: f64,
}

impl NormalizedDelta {
    /// Delta that moves `from` onto `to`
    pub fn between(from: NormalizedPoint, to: NormalizedPoint) -> Self {
        Self {
            dx: to.x - from.x,
            dy: to.y - from.y,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.dx == 0.0 && self.dy == 0.0
    }
}

/// A point in page pixel space at the current zoom
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PixelPoint {
    pub x: f64,
    pub y: f64,
}

impl PixelPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another pixel point
    pub fn distance_to(&self, other: &PixelPoint) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Axis-aligned rectangle in pixel space
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PixelRect {
    /// Left edge
    pub x: f64,
    /// Top edge
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl PixelRect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Rectangle spanning two arbitrary opposite corners
    pub fn from_corners(a: PixelPoint, b: PixelPoint) -> Self {
        Self {
            x: a.x.min(b.x),
            y: a.y.min(b.y),
            width: (a.x - b.x).abs(),
            height: (a.y - b.y).abs(),
        }
    }

    /// Grow the rectangle by `padding` on every side
    pub fn expanded(&self, padding: f64) -> Self {
        Self {
            x: self.x - padding,
            y: self.y - padding,
            width: self.width + padding * 2.0,
            height: self.height + padding * 2.0,
        }
    }

    /// Inclusive containment test
    pub fn contains(&self, point: &PixelPoint) -> bool {
        point.x >= self.x
            && point.x <= self.x + self.width
            && point.y >= self.y
            && point.y <= self.y + self.height
    }

    pub fn center(&self) -> PixelPoint {
        PixelPoint::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

/// Pixel dimensions of the rendered page
///
/// Supplied by the rendering collaborator and treated as authoritative.
/// A zero (or non-finite) dimension means no page is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PageSize {
    pub width: f64,
    pub height: f64,
}

impl PageSize {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Whether a page with usable dimensions is loaded
    pub fn is_loaded(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }

    /// Convert a pixel position into normalized space, `None` when no page is loaded
    pub fn normalize(&self, point: PixelPoint) -> Option<NormalizedPoint> {
        if !self.is_loaded() {
            return None;
        }
        Some(normalize(point.x, point.y, self.width, self.height))
    }

    /// Convert a normalized position into pixels on this page
    pub fn denormalize(&self, point: NormalizedPoint) -> PixelPoint {
        denormalize(point, self.width, self.height)
    }

    /// Convert a pixel-space extent into a normalized delta
    pub fn normalize_extent(&self, width: f64, height: f64) -> Option<NormalizedDelta> {
        if !self.is_loaded() {
            return None;
        }
        Some(NormalizedDelta {
            dx: width / self.width,
            dy: height / self.height,
        })
    }
}

/// Divide a pixel position by the page dimensions
///
/// No clamping is applied so that drag gestures can leave the page
/// transiently without losing precision.
pub fn normalize(px: f64, py: f64, page_width: f64, page_height: f64) -> NormalizedPoint {
    NormalizedPoint {
        x: px / page_width,
        y: py / page_height,
    }
}

/// Inverse of [`normalize`], used at draw time
pub fn denormalize(point: NormalizedPoint, page_width: f64, page_height: f64) -> PixelPoint {
    PixelPoint {
        x: point.x * page_width,
        y: point.y * page_height,
    }
}

/// Clamp a single coordinate into `[0, 1]`
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_denormalize() {
        let point = normalize(100.0, 80.0, 1000.0, 800.0);
        assert!((point.x - 0.1).abs() < 1e-12);
        assert!((point.y - 0.1).abs() < 1e-12);

        let back = denormalize(point, 1000.0, 800.0);
        assert!((back.x - 100.0).abs() < 1e-9);
        assert!((back.y - 80.0).abs() < 1e-9);
    }

    #[test]
    fn test_normalize_does_not_clamp() {
        let point = normalize(-50.0, 1200.0, 1000.0, 800.0);
        assert!(point.x < 0.0);
        assert!(point.y > 1.0);
        assert!(!point.is_within_page());

        let clamped = point.clamped();
        assert_eq!(clamped, NormalizedPoint::new(0.0, 1.0));
    }

    #[test]
    fn test_unloaded_page_size() {
        let size = PageSize::new(0.0, 600.0);
        assert!(!size.is_loaded());
        assert!(size.normalize(PixelPoint::new(10.0, 10.0)).is_none());
        assert!(PageSize::default().normalize_extent(5.0, 5.0).is_none());
    }

    #[test]
    fn test_translated_clamps() {
        let point = NormalizedPoint::new(0.98, 0.02);
        let moved = point.translated(NormalizedDelta { dx: 0.05, dy: -0.05 });
        assert_eq!(moved, NormalizedPoint::new(1.0, 0.0));
    }

    #[test]
    fn test_rect_expanded_contains() {
        let rect = PixelRect::from_corners(PixelPoint::new(50.0, 40.0), PixelPoint::new(10.0, 20.0));
        assert_eq!(rect, PixelRect::new(10.0, 20.0, 40.0, 20.0));
        assert!(!rect.contains(&PixelPoint::new(5.0, 20.0)));
        assert!(rect.expanded(10.0).contains(&PixelPoint::new(5.0, 20.0)));
    }

    #[test]
    fn test_clamp_unit_nan() {
        assert_eq!(clamp_unit(f64::NAN), 0.0);
        assert_eq!(clamp_unit(1.5), 1.0);
        assert_eq!(clamp_unit(-0.5), 0.0);
    }
}
