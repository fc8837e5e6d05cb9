//! Shape tool state machine
//!
//! `Idle → Dragging → {Committed | Discarded}`. A [`ShapeDrag`] is the
//! `Dragging` state; the session holds it between pointer-down and pointer-up
//! and drops it on cancel. Stamps skip the drag entirely, see [`place_stamp`].

use crate::annotation::{Color, DragShape, Shape, ShapeKind, StampKind};
use crate::geometry::{NormalizedPoint, PageSize};

/// Result of releasing a shape drag
#[derive(Debug, Clone, PartialEq)]
pub enum ShapeOutcome {
    /// The shape is large enough to keep, corners clamped into the page
    Committed(Shape),
    /// Both sides were below the minimum size; nothing is created
    Discarded,
}

/// A shape being dragged out from its first corner
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeDrag {
    shape: Shape,
}

impl ShapeDrag {
    /// Pointer-down: both corners at the down position
    pub fn begin(kind: DragShape, point: NormalizedPoint, color: Color, width: f64, fill: bool) -> Self {
        Self {
            shape: Shape::new(kind.into(), point, color, width, fill),
        }
    }

    /// Pointer-move: only the second corner follows the pointer
    pub fn update(&mut self, point: NormalizedPoint) {
        self.shape.end = point;
    }

    /// The in-progress shape, drawn as an overlay while dragging
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Pointer-up: commit or discard against the minimum size in page pixels
    pub fn finish(self, page: PageSize, min_size_px: f64) -> ShapeOutcome {
        if !page.is_loaded() || self.shape.is_below_min_size(page, min_size_px) {
            return ShapeOutcome::Discarded;
        }

        let mut shape = self.shape;
        shape.clamp_corners();
        ShapeOutcome::Committed(shape)
    }
}

/// Place a fixed-size stamp with its top-left corner at `point`
///
/// `size_px` is the stamp's pixel size on the current page. Returns `None`
/// when no page is loaded.
pub fn place_stamp(kind: StampKind, point: NormalizedPoint, page: PageSize, size_px: (f64, f64)) -> Option<Shape> {
    let extent = page.normalize_extent(size_px.0, size_px.1)?;

    let mut shape = Shape::new(
        ShapeKind::Stamp {
            stamp_kind: kind,
            label: kind.label(),
        },
        point,
        kind.color(),
        2.0,
        false,
    );
    shape.end = NormalizedPoint::new(point.x + extent.dx, point.y + extent.dy);
    shape.clamp_corners();
    Some(shape)
}
