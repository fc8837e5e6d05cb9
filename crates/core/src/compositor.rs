// Layer compositor - turns the live annotation set into per-layer display lists
//
// Four layers are stacked bottom to top: the page bitmap, ink (strokes), text
// and shapes. Every redraw clears one layer and walks its collection in
// insertion order, so paint order always equals z-order. In-progress entities
// are drawn on top of the committed collection without being added to it.

use crate::annotation::{Color, PageAnnotationSet, Shape, ShapeKind, Stroke, StrokeTool, TextAnnotation};
use crate::geometry::{NormalizedPoint, PageSize, PixelPoint, PixelRect};
use crate::selection::{text_block_bounds, SelectionSet};
use crate::tool::Tool;

/// Arrowhead half-angle in radians (30 degrees)
const ARROW_HEAD_ANGLE: f64 = std::f64::consts::PI / 6.0;
/// Minimum arrowhead length in pixels
const ARROW_HEAD_MIN: f64 = 10.0;
/// Selection outline padding in pixels
const SELECTION_PADDING: f64 = 4.0;

/// Drawing layers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerKind {
    /// Rasterized document page
    Page,
    /// Strokes (pen, eraser, highlight)
    Ink,
    /// Text labels
    Text,
    /// Shapes and stamps, plus selection outlines
    Shape,
}

/// Fixed layer order, bottom to top
pub const LAYER_ORDER: [LayerKind; 4] = [LayerKind::Page, LayerKind::Ink, LayerKind::Text, LayerKind::Shape];

impl LayerKind {
    fn index(self) -> usize {
        match self {
            LayerKind::Page => 0,
            LayerKind::Ink => 1,
            LayerKind::Text => 2,
            LayerKind::Shape => 3,
        }
    }
}

/// How a primitive combines with what is already on its layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlendMode {
    /// Paint over
    #[default]
    Draw,
    /// Remove pixels already on the layer
    Erase,
}

/// Display-list entry in page pixel space
#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    /// The page raster, filling the layer
    PageBitmap { width: f32, height: f32 },
    /// Free-hand polyline
    Polyline {
        points: Vec<[f32; 2]>,
        width: f32,
        color: Color,
        blend: BlendMode,
    },
    /// Translucent highlight band
    Band { corners: [[f32; 2]; 4], color: Color },
    Line {
        start: [f32; 2],
        end: [f32; 2],
        width: f32,
        color: Color,
    },
    /// Line plus the two arrowhead wings ending at `end`
    Arrow {
        start: [f32; 2],
        end: [f32; 2],
        wings: [[f32; 2]; 2],
        width: f32,
        color: Color,
    },
    Rectangle {
        origin: [f32; 2],
        size: [f32; 2],
        width: f32,
        color: Color,
        fill: bool,
    },
    Ellipse {
        center: [f32; 2],
        radii: [f32; 2],
        width: f32,
        color: Color,
        fill: bool,
    },
    /// Bordered stamp box with a centered label
    Stamp {
        origin: [f32; 2],
        size: [f32; 2],
        label: String,
        color: Color,
    },
    /// Text block, already wrapped into lines
    Text {
        origin: [f32; 2],
        lines: Vec<String>,
        font_size: f32,
        color: Color,
    },
    /// Dashed outline around a selected entity
    SelectionBox { origin: [f32; 2], size: [f32; 2] },
}

/// One layer's display list
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    pub kind: LayerKind,
    pub primitives: Vec<Primitive>,
    /// Incremented every time the layer is cleared
    pub revision: u64,
}

impl Layer {
    fn new(kind: LayerKind) -> Self {
        Self {
            kind,
            primitives: Vec::new(),
            revision: 0,
        }
    }

    fn clear(&mut self) {
        self.primitives.clear();
        self.revision += 1;
    }
}

/// Entity being captured, drawn over the committed set
#[derive(Debug, Clone, Copy, Default)]
pub enum Overlay<'a> {
    #[default]
    None,
    Stroke(&'a Stroke),
    Shape(&'a Shape),
    /// Draft of a text entry; replaces the committed text with the same id
    Text(&'a TextAnnotation),
}

/// Owner of the live annotation set and its layers
#[derive(Debug, Clone)]
pub struct Compositor {
    page: PageSize,
    live: PageAnnotationSet,
    layers: [Layer; 4],
}

impl Default for Compositor {
    fn default() -> Self {
        Self::new()
    }
}

impl Compositor {
    pub fn new() -> Self {
        Self {
            page: PageSize::default(),
            live: PageAnnotationSet::default(),
            layers: LAYER_ORDER.map(Layer::new),
        }
    }

    pub fn page_size(&self) -> PageSize {
        self.page
    }

    /// Set the rendered page dimensions and redraw the page layer
    pub fn set_page(&mut self, page: PageSize) {
        self.page = page;
        let layer = &mut self.layers[LayerKind::Page.index()];
        layer.clear();
        if page.is_loaded() {
            layer.primitives.push(Primitive::PageBitmap {
                width: page.width as f32,
                height: page.height as f32,
            });
        }
    }

    /// The live working set
    pub fn working_set(&self) -> &PageAnnotationSet {
        &self.live
    }

    pub(crate) fn working_set_mut(&mut self) -> &mut PageAnnotationSet {
        &mut self.live
    }

    /// Swap in a new working set, returning the previous one
    ///
    /// Layers are not redrawn; callers follow up with [`Compositor::redraw_all`].
    pub fn replace_working_set(&mut self, set: PageAnnotationSet) -> PageAnnotationSet {
        std::mem::replace(&mut self.live, set)
    }

    /// Layers in paint order
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn layer(&self, kind: LayerKind) -> &Layer {
        &self.layers[kind.index()]
    }

    /// Layer that receives pointer events for `tool`
    pub fn event_layer(tool: &Tool) -> LayerKind {
        match tool {
            Tool::Pen | Tool::Eraser | Tool::Highlight(_) => LayerKind::Ink,
            Tool::Text => LayerKind::Text,
            Tool::Select | Tool::Shape(_) | Tool::Stamp(_) => LayerKind::Shape,
        }
    }

    /// Clear and redraw every annotation layer
    pub fn redraw_all(&mut self, selection: &SelectionSet, overlay: Overlay<'_>) {
        let (stroke, shape, text) = match overlay {
            Overlay::None => (None, None, None),
            Overlay::Stroke(stroke) => (Some(stroke), None, None),
            Overlay::Shape(shape) => (None, Some(shape), None),
            Overlay::Text(text) => (None, None, Some(text)),
        };
        self.redraw_ink(stroke);
        self.redraw_texts(text);
        self.redraw_shapes(shape, selection);
    }

    /// Redraw the ink layer, with an optional in-progress stroke on top
    pub fn redraw_ink(&mut self, in_progress: Option<&Stroke>) {
        let page = self.page;
        let layer = &mut self.layers[LayerKind::Ink.index()];
        layer.clear();
        if !page.is_loaded() {
            return;
        }
        for stroke in self.live.strokes.iter().chain(in_progress) {
            if let Some(primitive) = stroke_primitive(stroke, &stroke.points, page) {
                layer.primitives.push(primitive);
            }
        }
    }

    /// Draw only the newest segment of a stroke being captured
    ///
    /// `appended` is the number of points just added to the stroke; the tail
    /// is drawn from the point before them so the segment connects.
    pub fn append_ink(&mut self, stroke: &Stroke, appended: usize) {
        if !self.page.is_loaded() || appended == 0 {
            return;
        }
        let start = stroke.points.len().saturating_sub(appended + 1);
        if let Some(primitive) = stroke_primitive(stroke, &stroke.points[start..], self.page) {
            self.layers[LayerKind::Ink.index()].primitives.push(primitive);
        }
    }

    /// Redraw the text layer
    ///
    /// A draft replaces the committed text with the same id, or is drawn in
    /// addition when it is new.
    pub fn redraw_texts(&mut self, draft: Option<&TextAnnotation>) {
        let page = self.page;
        let layer = &mut self.layers[LayerKind::Text.index()];
        layer.clear();
        if !page.is_loaded() {
            return;
        }

        let draft_id = draft.map(|text| text.id);
        for text in self
            .live
            .texts
            .iter()
            .filter(|text| Some(text.id) != draft_id)
            .chain(draft)
        {
            if text.text.is_empty() {
                continue;
            }
            let origin = page.denormalize(text.anchor);
            let wrap_px = text.width.map(|width| width * page.width);
            layer.primitives.push(Primitive::Text {
                origin: to_f32(origin),
                lines: wrap_text(&text.text, text.font_size, wrap_px),
                font_size: text.font_size as f32,
                color: text.color,
            });
        }
    }

    /// Redraw the shape layer, then selection outlines on top
    pub fn redraw_shapes(&mut self, in_progress: Option<&Shape>, selection: &SelectionSet) {
        let page = self.page;
        let layer = &mut self.layers[LayerKind::Shape.index()];
        layer.clear();
        if !page.is_loaded() {
            return;
        }

        for shape in self.live.shapes.iter().chain(in_progress) {
            layer.primitives.push(shape_primitive(shape, page));
        }

        if selection.is_empty() {
            return;
        }
        let stroke_boxes = self
            .live
            .strokes
            .iter()
            .filter(|stroke| selection.contains_stroke(stroke.id))
            .filter_map(|stroke| stroke_bounds(stroke, page));
        let shape_boxes = self
            .live
            .shapes
            .iter()
            .filter(|shape| selection.contains_shape(shape.id))
            .map(|shape| shape.pixel_bounds(page));
        let text_boxes = self
            .live
            .texts
            .iter()
            .filter(|text| selection.contains_text(text.id))
            .map(|text| text_block_bounds(text, page));

        for bounds in stroke_boxes.chain(shape_boxes).chain(text_boxes) {
            let outline = bounds.expanded(SELECTION_PADDING);
            layer.primitives.push(Primitive::SelectionBox {
                origin: [outline.x as f32, outline.y as f32],
                size: [outline.width as f32, outline.height as f32],
            });
        }
    }
}

fn to_f32(point: PixelPoint) -> [f32; 2] {
    [point.x as f32, point.y as f32]
}

fn stroke_primitive(stroke: &Stroke, points: &[NormalizedPoint], page: PageSize) -> Option<Primitive> {
    if points.is_empty() {
        return None;
    }

    match stroke.tool {
        StrokeTool::Highlight if points.len() == 4 && points.len() == stroke.points.len() => {
            let corners = [
                to_f32(page.denormalize(points[0])),
                to_f32(page.denormalize(points[1])),
                to_f32(page.denormalize(points[2])),
                to_f32(page.denormalize(points[3])),
            ];
            Some(Primitive::Band {
                corners,
                color: stroke.color,
            })
        }
        tool => Some(Primitive::Polyline {
            points: points.iter().map(|p| to_f32(page.denormalize(*p))).collect(),
            width: stroke.width as f32,
            color: stroke.color,
            blend: if tool == StrokeTool::Eraser {
                BlendMode::Erase
            } else {
                BlendMode::Draw
            },
        }),
    }
}

fn stroke_bounds(stroke: &Stroke, page: PageSize) -> Option<PixelRect> {
    let first = page.denormalize(stroke.first_point()?);
    let (mut min, mut max) = (first, first);
    for point in stroke.points.iter().map(|p| page.denormalize(*p)) {
        min = PixelPoint::new(min.x.min(point.x), min.y.min(point.y));
        max = PixelPoint::new(max.x.max(point.x), max.y.max(point.y));
    }
    Some(PixelRect::from_corners(min, max))
}

fn shape_primitive(shape: &Shape, page: PageSize) -> Primitive {
    let start = page.denormalize(shape.start);
    let end = page.denormalize(shape.end);
    let bounds = PixelRect::from_corners(start, end);
    let width = shape.width as f32;

    match &shape.kind {
        ShapeKind::Line => Primitive::Line {
            start: to_f32(start),
            end: to_f32(end),
            width,
            color: shape.color,
        },
        ShapeKind::Arrow => Primitive::Arrow {
            start: to_f32(start),
            end: to_f32(end),
            wings: arrow_wings(start, end, shape.width),
            width,
            color: shape.color,
        },
        ShapeKind::Rectangle => Primitive::Rectangle {
            origin: [bounds.x as f32, bounds.y as f32],
            size: [bounds.width as f32, bounds.height as f32],
            width,
            color: shape.color,
            fill: shape.fill,
        },
        ShapeKind::Circle => Primitive::Ellipse {
            center: to_f32(bounds.center()),
            radii: [(bounds.width / 2.0) as f32, (bounds.height / 2.0) as f32],
            width,
            color: shape.color,
            fill: shape.fill,
        },
        ShapeKind::Stamp { label, .. } => Primitive::Stamp {
            origin: [bounds.x as f32, bounds.y as f32],
            size: [bounds.width as f32, bounds.height as f32],
            label: label.clone(),
            color: shape.color,
        },
    }
}

/// Arrowhead wing tips for a line ending at `end`
fn arrow_wings(start: PixelPoint, end: PixelPoint, width: f64) -> [[f32; 2]; 2] {
    let length = start.distance_to(&end);
    if length == 0.0 {
        return [to_f32(end), to_f32(end)];
    }

    let head = (width * 4.0).max(ARROW_HEAD_MIN).min(length);
    let angle = (end.y - start.y).atan2(end.x - start.x);
    let wing = |offset: f64| {
        let theta = angle + std::f64::consts::PI + offset;
        to_f32(PixelPoint::new(end.x + head * theta.cos(), end.y + head * theta.sin()))
    };
    [wing(ARROW_HEAD_ANGLE), wing(-ARROW_HEAD_ANGLE)]
}

/// Split text into lines at line breaks, then greedily at word boundaries
///
/// Wrapping estimates glyph widths at 0.6 × the font size. Without a wrap
/// width only explicit line breaks split the text.
pub fn wrap_text(text: &str, font_size: f64, wrap_px: Option<f64>) -> Vec<String> {
    let max_chars = wrap_px
        .filter(|px| *px > 0.0 && font_size > 0.0)
        .map(|px| ((px / (font_size * 0.6)).floor() as usize).max(1));

    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        let Some(max_chars) = max_chars else {
            lines.push(paragraph.to_string());
            continue;
        };

        let mut current = String::new();
        for word in paragraph.split(' ') {
            let needed = if current.is_empty() {
                word.chars().count()
            } else {
                current.chars().count() + 1 + word.chars().count()
            };
            if needed > max_chars && !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
        }
        lines.push(current);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::DragShape;

    fn loaded() -> Compositor {
        let mut compositor = Compositor::new();
        compositor.set_page(PageSize::new(1000.0, 800.0));
        compositor
    }

    fn pen(points: &[(f64, f64)]) -> Stroke {
        let mut stroke = Stroke::new(StrokeTool::Pen, Color::BLACK, 2.0, NormalizedPoint::new(points[0].0, points[0].1));
        stroke
            .points
            .extend(points[1..].iter().map(|&(x, y)| NormalizedPoint::new(x, y)));
        stroke
    }

    #[test]
    fn test_layer_order_is_fixed() {
        let compositor = loaded();
        let kinds: Vec<LayerKind> = compositor.layers().iter().map(|layer| layer.kind).collect();
        assert_eq!(kinds, LAYER_ORDER.to_vec());
        assert_eq!(
            compositor.layer(LayerKind::Page).primitives,
            vec![Primitive::PageBitmap { width: 1000.0, height: 800.0 }]
        );
    }

    #[test]
    fn test_redraw_preserves_insertion_order() {
        let mut compositor = loaded();
        let first = pen(&[(0.1, 0.1), (0.2, 0.1)]);
        let second = pen(&[(0.5, 0.5), (0.6, 0.6)]);
        compositor.working_set_mut().strokes.push(first);
        compositor.working_set_mut().strokes.push(second);

        compositor.redraw_ink(None);
        let before = compositor.layer(LayerKind::Ink).primitives.clone();
        compositor.redraw_ink(None);
        assert_eq!(compositor.layer(LayerKind::Ink).primitives, before);

        match &before[0] {
            Primitive::Polyline { points, .. } => assert_eq!(points[0], [100.0, 80.0]),
            other => panic!("Unexpected primitive {other:?}"),
        }
    }

    #[test]
    fn test_overlay_does_not_mutate_live_set() {
        let mut compositor = loaded();
        let draft = Shape::new(DragShape::Rectangle.into(), NormalizedPoint::new(0.1, 0.1), Color::RED, 2.0, false);

        compositor.redraw_shapes(Some(&draft), &SelectionSet::new());
        assert_eq!(compositor.layer(LayerKind::Shape).primitives.len(), 1);
        assert!(compositor.working_set().shapes.is_empty());

        // Discarded gesture leaves no trace
        compositor.redraw_all(&SelectionSet::new(), Overlay::None);
        assert!(compositor.layer(LayerKind::Shape).primitives.is_empty());
    }

    #[test]
    fn test_eraser_uses_erase_blend() {
        let mut compositor = loaded();
        let mut eraser = pen(&[(0.1, 0.1), (0.2, 0.2)]);
        eraser.tool = StrokeTool::Eraser;
        compositor.working_set_mut().strokes.push(eraser);
        compositor.redraw_ink(None);

        assert!(matches!(
            compositor.layer(LayerKind::Ink).primitives[0],
            Primitive::Polyline { blend: BlendMode::Erase, .. }
        ));
    }

    #[test]
    fn test_append_ink_draws_only_tail() {
        let mut compositor = loaded();
        let stroke = pen(&[(0.1, 0.1), (0.2, 0.1), (0.3, 0.1), (0.4, 0.1)]);
        compositor.redraw_ink(None);
        let revision = compositor.layer(LayerKind::Ink).revision;

        compositor.append_ink(&stroke, 2);
        let layer = compositor.layer(LayerKind::Ink);
        assert_eq!(layer.revision, revision);
        match &layer.primitives[0] {
            Primitive::Polyline { points, .. } => assert_eq!(points.len(), 3),
            other => panic!("Unexpected primitive {other:?}"),
        }
    }

    #[test]
    fn test_unloaded_page_is_noop() {
        let mut compositor = Compositor::new();
        compositor.working_set_mut().strokes.push(pen(&[(0.1, 0.1)]));
        compositor.redraw_all(&SelectionSet::new(), Overlay::None);
        assert!(compositor.layers().iter().all(|layer| layer.primitives.is_empty()));
    }

    #[test]
    fn test_unloading_page_clears_annotation_layers() {
        let mut compositor = loaded();
        compositor.working_set_mut().strokes.push(pen(&[(0.1, 0.1), (0.2, 0.2)]));
        compositor
            .working_set_mut()
            .texts
            .push(TextAnnotation::new(NormalizedPoint::new(0.3, 0.3), "note", 14.0, Color::BLACK));
        compositor.redraw_all(&SelectionSet::new(), Overlay::None);
        assert!(!compositor.layer(LayerKind::Ink).primitives.is_empty());

        compositor.set_page(PageSize::default());
        compositor.redraw_all(&SelectionSet::new(), Overlay::None);
        assert!(compositor.layers().iter().all(|layer| layer.primitives.is_empty()));
    }

    #[test]
    fn test_text_draft_replaces_committed_copy() {
        let mut compositor = loaded();
        let text = TextAnnotation::new(NormalizedPoint::new(0.1, 0.1), "old", 14.0, Color::BLACK);
        let mut draft = text.clone();
        draft.text = "new".to_string();
        compositor.working_set_mut().texts.push(text);

        compositor.redraw_texts(Some(&draft));
        let primitives = &compositor.layer(LayerKind::Text).primitives;
        assert_eq!(primitives.len(), 1);
        match &primitives[0] {
            Primitive::Text { lines, .. } => assert_eq!(lines, &vec!["new".to_string()]),
            other => panic!("Unexpected primitive {other:?}"),
        }
    }

    #[test]
    fn test_selection_outlines_on_top_layer() {
        let mut compositor = loaded();
        let stroke = pen(&[(0.1, 0.1), (0.2, 0.2)]);
        let mut selection = SelectionSet::new();
        selection.stroke_ids.insert(stroke.id);
        compositor.working_set_mut().strokes.push(stroke);

        compositor.redraw_all(&selection, Overlay::None);
        assert!(matches!(
            compositor.layer(LayerKind::Shape).primitives[0],
            Primitive::SelectionBox { .. }
        ));
    }

    #[test]
    fn test_event_layer_follows_tool() {
        assert_eq!(Compositor::event_layer(&Tool::Pen), LayerKind::Ink);
        assert_eq!(Compositor::event_layer(&Tool::Text), LayerKind::Text);
        assert_eq!(Compositor::event_layer(&Tool::Shape(DragShape::Arrow)), LayerKind::Shape);
        assert_eq!(Compositor::event_layer(&Tool::Select), LayerKind::Shape);
    }

    #[test]
    fn test_wrap_text() {
        // 10px font wraps at 6px per glyph: 60px fits 10 characters
        let lines = wrap_text("hello world again\nend", 10.0, Some(60.0));
        assert_eq!(lines, vec!["hello", "world", "again", "end"]);
        assert_eq!(wrap_text("a\nb", 10.0, None), vec!["a", "b"]);
    }

    #[test]
    fn test_arrow_wings_point_back() {
        let wings = arrow_wings(PixelPoint::new(0.0, 0.0), PixelPoint::new(100.0, 0.0), 2.0);
        assert!(wings[0][0] < 100.0 && wings[1][0] < 100.0);
        assert!((wings[0][1] + wings[1][1]).abs() < 1e-4);
    }
}
