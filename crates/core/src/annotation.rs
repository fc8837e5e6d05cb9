//! Annotation data model
//!
//! Three annotation kinds live on a page: free-hand strokes, bounded shapes
//! and text labels. All spatial fields are in normalized page space (see
//! [`crate::geometry`]), so a page's pixel dimensions are only needed at draw
//! time.

use crate::geometry::{NormalizedDelta, NormalizedPoint, PageSize, PixelRect};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a stroke
///
/// Stable across the document lifetime and persisted with the stroke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StrokeId(Uuid);

impl StrokeId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for StrokeId {
    fn default() -> Self {
        Self::new()
    }
}

/// Unique identifier for a shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ShapeId(Uuid);

impl ShapeId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ShapeId {
    fn default() -> Self {
        Self::new()
    }
}

/// Unique identifier for a text annotation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TextId(Uuid);

impl TextId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TextId {
    fn default() -> Self {
        Self::new()
    }
}

/// RGBA color representation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    /// Create a new color
    pub fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }
}

/// Common markup colors
impl Color {
    pub const RED: Color = Color { r: 220, g: 38, b: 38, a: 255 };
    pub const GREEN: Color = Color { r: 22, g: 163, b: 74, a: 255 };
    pub const BLUE: Color = Color { r: 37, g: 99, b: 235, a: 255 };
    pub const YELLOW: Color = Color { r: 250, g: 204, b: 21, a: 255 };
    pub const BLACK: Color = Color { r: 0, g: 0, b: 0, a: 255 };
    pub const WHITE: Color = Color { r: 255, g: 255, b: 255, a: 255 };
    /// Translucent yellow used for highlight bands
    pub const HIGHLIGHT: Color = Color { r: 250, g: 204, b: 21, a: 96 };
}

/// Tool a stroke was drawn with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrokeTool {
    /// Free-hand polyline
    Pen,
    /// Free-hand polyline rendered in "remove pixels" mode
    Eraser,
    /// Four-corner rectangle band
    Highlight,
}

/// A free-hand or highlight stroke
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    pub id: StrokeId,
    pub tool: StrokeTool,
    pub color: Color,
    /// Stroke thickness in pixels, or highlight-band thickness
    pub width: f64,
    /// Ordered normalized points
    pub points: Vec<NormalizedPoint>,
}

impl Stroke {
    /// Start a stroke with a single point
    pub fn new(tool: StrokeTool, color: Color, width: f64, first: NormalizedPoint) -> Self {
        Self {
            id: StrokeId::new(),
            tool,
            color,
            width,
            points: vec![first],
        }
    }

    /// Build a highlight band from two opposite corners
    ///
    /// The points are the rectangle's corners in the order top-left,
    /// top-right, bottom-right, bottom-left.
    pub fn highlight(color: Color, width: f64, a: NormalizedPoint, b: NormalizedPoint) -> Self {
        let mut stroke = Self::new(StrokeTool::Highlight, color, width, a);
        stroke.points = rectangle_corners(a, b).to_vec();
        stroke
    }

    /// First captured point, `None` for a malformed stroke
    pub fn first_point(&self) -> Option<NormalizedPoint> {
        self.points.first().copied()
    }

    /// Clamp every point into the page
    pub fn clamp_points(&mut self) {
        for point in &mut self.points {
            *point = point.clamped();
        }
    }

    /// Shift every point by `delta`, clamping into the page
    pub fn translate(&mut self, delta: NormalizedDelta) {
        for point in &mut self.points {
            *point = point.translated(delta);
        }
    }
}

/// Corners of the axis-aligned rectangle spanned by `a` and `b`
pub fn rectangle_corners(a: NormalizedPoint, b: NormalizedPoint) -> [NormalizedPoint; 4] {
    let (min_x, max_x) = (a.x.min(b.x), a.x.max(b.x));
    let (min_y, max_y) = (a.y.min(b.y), a.y.max(b.y));
    [
        NormalizedPoint::new(min_x, min_y),
        NormalizedPoint::new(max_x, min_y),
        NormalizedPoint::new(max_x, max_y),
        NormalizedPoint::new(min_x, max_y),
    ]
}

/// Kind of pre-built stamp
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StampKind {
    Date,
    Approved,
    Rejected,
}

impl StampKind {
    /// Label rendered inside the stamp at placement time
    pub fn label(&self) -> String {
        match self {
            StampKind::Date => chrono::Local::now().format("%Y-%m-%d").to_string(),
            StampKind::Approved => "APPROVED".to_string(),
            StampKind::Rejected => "REJECTED".to_string(),
        }
    }

    /// Fixed stamp color
    pub fn color(&self) -> Color {
        match self {
            StampKind::Date => Color::BLUE,
            StampKind::Approved => Color::GREEN,
            StampKind::Rejected => Color::RED,
        }
    }
}

/// Shapes that are created by dragging out two corners
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DragShape {
    Line,
    Rectangle,
    Circle,
    Arrow,
}

/// Geometry kind of a shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ShapeKind {
    Line,
    Rectangle,
    /// Ellipse inscribed in the two-corner bounding box
    Circle,
    /// Line with an arrowhead at the second corner
    Arrow,
    /// Fixed-size labelled stamp
    Stamp { stamp_kind: StampKind, label: String },
}

impl From<DragShape> for ShapeKind {
    fn from(shape: DragShape) -> Self {
        match shape {
            DragShape::Line => ShapeKind::Line,
            DragShape::Rectangle => ShapeKind::Rectangle,
            DragShape::Circle => ShapeKind::Circle,
            DragShape::Arrow => ShapeKind::Arrow,
        }
    }
}

/// A bounded two-corner shape or stamp
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shape {
    pub id: ShapeId,
    pub kind: ShapeKind,
    /// First corner `(x1, y1)`
    pub start: NormalizedPoint,
    /// Second corner `(x2, y2)`
    pub end: NormalizedPoint,
    pub color: Color,
    pub width: f64,
    #[serde(default)]
    pub fill: bool,
}

impl Shape {
    /// Create a shape with both corners at `at`
    pub fn new(kind: ShapeKind, at: NormalizedPoint, color: Color, width: f64, fill: bool) -> Self {
        Self {
            id: ShapeId::new(),
            kind,
            start: at,
            end: at,
            color,
            width,
            fill,
        }
    }

    /// Bounding box in pixel space on a page of the given size
    pub fn pixel_bounds(&self, page: PageSize) -> PixelRect {
        PixelRect::from_corners(page.denormalize(self.start), page.denormalize(self.end))
    }

    /// Whether both sides of the bounding box are below `min_px` pixels
    pub fn is_below_min_size(&self, page: PageSize, min_px: f64) -> bool {
        let bounds = self.pixel_bounds(page);
        bounds.width < min_px && bounds.height < min_px
    }

    pub fn is_stamp(&self) -> bool {
        matches!(self.kind, ShapeKind::Stamp { .. })
    }

    pub fn clamp_corners(&mut self) {
        self.start = self.start.clamped();
        self.end = self.end.clamped();
    }

    /// Shift both corners by `delta`, clamping into the page
    pub fn translate(&mut self, delta: NormalizedDelta) {
        self.start = self.start.translated(delta);
        self.end = self.end.translated(delta);
    }
}

/// A positioned text label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextAnnotation {
    pub id: TextId,
    /// Top-left anchor of the text box
    pub anchor: NormalizedPoint,
    /// Content, may contain line breaks
    pub text: String,
    /// Font size in display pixels
    pub font_size: f64,
    pub color: Color,
    /// Optional normalized wrap width
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
}

impl TextAnnotation {
    pub fn new(anchor: NormalizedPoint, text: impl Into<String>, font_size: f64, color: Color) -> Self {
        Self {
            id: TextId::new(),
            anchor,
            text: text.into(),
            font_size,
            color,
            width: None,
        }
    }

    /// Shift the anchor by `delta`, clamping into the page
    pub fn translate(&mut self, delta: NormalizedDelta) {
        self.anchor = self.anchor.translated(delta);
    }
}

/// Working set of one page
///
/// Vector order is insertion order, which is also paint order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PageAnnotationSet {
    #[serde(default)]
    pub strokes: Vec<Stroke>,
    #[serde(default)]
    pub shapes: Vec<Shape>,
    #[serde(default)]
    pub texts: Vec<TextAnnotation>,
}

impl PageAnnotationSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of entities across the three collections
    pub fn len(&self) -> usize {
        self.strokes.len() + self.shapes.len() + self.texts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stroke(&self, id: StrokeId) -> Option<&Stroke> {
        self.strokes.iter().find(|s| s.id == id)
    }

    pub fn shape(&self, id: ShapeId) -> Option<&Shape> {
        self.shapes.iter().find(|s| s.id == id)
    }

    pub fn text(&self, id: TextId) -> Option<&TextAnnotation> {
        self.texts.iter().find(|t| t.id == id)
    }

    pub fn text_mut(&mut self, id: TextId) -> Option<&mut TextAnnotation> {
        self.texts.iter_mut().find(|t| t.id == id)
    }

    /// Remove every entity from the page
    pub fn clear(&mut self) {
        self.strokes.clear();
        self.shapes.clear();
        self.texts.clear();
    }
}
