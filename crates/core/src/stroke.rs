//! Stroke capture for the pen, eraser and highlight tools
//!
//! A [`StrokeCapture`] is the "drawing" state of a free-hand gesture: it is
//! created on pointer-down, extended on every pointer-move and turned into a
//! committed [`Stroke`] on pointer-up. The color and width are copied into the
//! stroke when the gesture starts, so later brush changes never touch a stroke
//! that is already in progress.

use crate::annotation::{Color, Stroke, StrokeTool};
use crate::geometry::{NormalizedPoint, PageSize, PixelPoint};
use crate::text_layer::TextLayer;

/// Parameters sampled at the cubic segment between the last two points
const SMOOTHING_SAMPLES: [f64; 3] = [0.25, 0.5, 0.75];

/// Options applied to every captured point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureOptions {
    /// Run the local smoothing pass
    pub smoothing: bool,
    /// Snap the pen's Y to the nearest detected text line
    pub snap_to_text: bool,
    /// Snap radius in pixels
    pub snap_radius_px: f64,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            smoothing: true,
            snap_to_text: false,
            snap_radius_px: 15.0,
        }
    }
}

/// In-progress free-hand stroke
#[derive(Debug, Clone, PartialEq)]
pub struct StrokeCapture {
    stroke: Stroke,
}

impl StrokeCapture {
    /// Start a new stroke at the pointer-down position
    pub fn begin(tool: StrokeTool, color: Color, width: f64, point: NormalizedPoint) -> Self {
        Self {
            stroke: Stroke::new(tool, color, width, point),
        }
    }

    /// The stroke captured so far
    pub fn stroke(&self) -> &Stroke {
        &self.stroke
    }

    /// Append a pointer-move sample
    ///
    /// Returns how many points were appended. Points already in the stroke
    /// are never rewritten, so callers can draw just the new tail.
    pub fn extend(
        &mut self,
        point: NormalizedPoint,
        page: PageSize,
        text_layer: Option<&TextLayer>,
        options: CaptureOptions,
    ) -> usize {
        let mut point = point;

        if options.snap_to_text && self.stroke.tool == StrokeTool::Pen {
            if let Some(line_y) =
                text_layer.and_then(|layer| layer.nearest_line_y(point.y, page, options.snap_radius_px))
            {
                point.y = line_y;
            }
        }

        let points = &mut self.stroke.points;
        if points.last() == Some(&point) {
            return 0;
        }

        if options.smoothing && points.len() >= 2 {
            let a = points[points.len() - 2];
            let b = points[points.len() - 1];
            let before = points.len();
            points.extend(smooth_segment(a, b, point));
            return points.len() - before;
        }

        points.push(point);
        1
    }

    /// Freeze the stroke, clamping every point into the page
    pub fn finish(self) -> Stroke {
        let mut stroke = self.stroke;
        stroke.clamp_points();
        stroke
    }
}

/// Points of a Catmull-Rom segment from `b` to `c`, with `a` as the previous control
///
/// The segment ends exactly on `c`; `b` itself is not repeated.
pub fn smooth_segment(a: NormalizedPoint, b: NormalizedPoint, c: NormalizedPoint) -> Vec<NormalizedPoint> {
    // Tangents at b and c, the latter clamped to the chord since no later point exists yet
    let m1 = ((c.x - a.x) / 2.0, (c.y - a.y) / 2.0);
    let m2 = ((c.x - b.x) / 2.0, (c.y - b.y) / 2.0);

    let mut out: Vec<NormalizedPoint> = SMOOTHING_SAMPLES
        .iter()
        .map(|&t| {
            let t2 = t * t;
            let t3 = t2 * t;
            let h00 = 2.0 * t3 - 3.0 * t2 + 1.0;
            let h10 = t3 - 2.0 * t2 + t;
            let h01 = -2.0 * t3 + 3.0 * t2;
            let h11 = t3 - t2;
            NormalizedPoint::new(
                h00 * b.x + h10 * m1.0 + h01 * c.x + h11 * m2.0,
                h00 * b.y + h10 * m1.1 + h01 * c.y + h11 * m2.1,
            )
        })
        .collect();
    out.push(c);
    out
}

/// In-progress manual highlight drag
///
/// The band is the rectangle between the pointer-down corner and the current
/// pointer position, kept as a four-corner stroke while dragging.
#[derive(Debug, Clone, PartialEq)]
pub struct HighlightDrag {
    anchor: NormalizedPoint,
    stroke: Stroke,
}

impl HighlightDrag {
    pub fn begin(color: Color, width: f64, point: NormalizedPoint) -> Self {
        Self {
            anchor: point,
            stroke: Stroke::highlight(color, width, point, point),
        }
    }

    /// Move the opposite corner to `point`
    pub fn update(&mut self, point: NormalizedPoint) {
        let id = self.stroke.id;
        self.stroke = Stroke {
            id,
            ..Stroke::highlight(self.stroke.color, self.stroke.width, self.anchor, point)
        };
    }

    pub fn stroke(&self) -> &Stroke {
        &self.stroke
    }

    /// Freeze the band, or `None` when it is smaller than `min_size_px` on both axes
    pub fn finish(self, page: PageSize, min_size_px: f64) -> Option<Stroke> {
        let (Some(first), Some(third)) = (self.stroke.points.first(), self.stroke.points.get(2)) else {
            return None;
        };
        let a = page.denormalize(*first);
        let b = page.denormalize(*third);
        if (b.x - a.x).abs() < min_size_px && (b.y - a.y).abs() < min_size_px {
            return None;
        }

        let mut stroke = self.stroke;
        stroke.clamp_points();
        Some(stroke)
    }
}

/// Resolve the text token under a click into a committed highlight band
///
/// Returns `None` when no text layer is available or nothing is under the pointer.
pub fn auto_highlight(
    text_layer: Option<&TextLayer>,
    point: PixelPoint,
    page: PageSize,
    color: Color,
    width: f64,
) -> Option<Stroke> {
    let (min, max) = text_layer?.item_at(point, page)?;
    let mut stroke = Stroke::highlight(color, width, min, max);
    stroke.clamp_points();
    Some(stroke)
}
