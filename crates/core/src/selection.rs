//! Selection hit-testing and group transform
//!
//! Hit-testing runs once per select-tool pointer-down in pixel space with
//! approximations: strokes are hit near their first point,
//! shapes by their padded bounding box and texts by an estimated glyph box.

use std::collections::BTreeSet;

use crate::annotation::{PageAnnotationSet, Shape, ShapeId, Stroke, StrokeId, TextAnnotation, TextId};
use crate::geometry::{NormalizedDelta, NormalizedPoint, PageSize, PixelPoint, PixelRect};

/// Average glyph width as a fraction of the font size
const GLYPH_WIDTH_FACTOR: f64 = 0.6;
/// Line height as a fraction of the font size
const LINE_HEIGHT_FACTOR: f64 = 1.2;

/// Ids of the selected entities, grouped by kind
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SelectionSet {
    pub stroke_ids: BTreeSet<StrokeId>,
    pub shape_ids: BTreeSet<ShapeId>,
    pub text_ids: BTreeSet<TextId>,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.stroke_ids.is_empty() && self.shape_ids.is_empty() && self.text_ids.is_empty()
    }

    pub fn len(&self) -> usize {
        self.stroke_ids.len() + self.shape_ids.len() + self.text_ids.len()
    }

    pub fn clear(&mut self) {
        self.stroke_ids.clear();
        self.shape_ids.clear();
        self.text_ids.clear();
    }

    /// Add every id of `other` to this selection
    pub fn union(&mut self, other: SelectionSet) {
        self.stroke_ids.extend(other.stroke_ids);
        self.shape_ids.extend(other.shape_ids);
        self.text_ids.extend(other.text_ids);
    }

    pub fn contains_stroke(&self, id: StrokeId) -> bool {
        self.stroke_ids.contains(&id)
    }

    pub fn contains_shape(&self, id: ShapeId) -> bool {
        self.shape_ids.contains(&id)
    }

    pub fn contains_text(&self, id: TextId) -> bool {
        self.text_ids.contains(&id)
    }
}

/// Hit-test tolerances in pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitTestConfig {
    /// Maximum distance from a stroke's first point
    pub stroke_radius: f64,
    /// Padding around a shape's bounding box
    pub shape_padding: f64,
    /// Padding around a text's estimated box
    pub text_padding: f64,
}

impl Default for HitTestConfig {
    fn default() -> Self {
        Self {
            stroke_radius: 20.0,
            shape_padding: 10.0,
            text_padding: 10.0,
        }
    }
}

/// Whether `pointer` hits `stroke`
///
/// A stroke without points never hits.
pub fn hit_stroke(stroke: &Stroke, pointer: PixelPoint, page: PageSize, config: &HitTestConfig) -> bool {
    stroke
        .first_point()
        .is_some_and(|first| page.denormalize(first).distance_to(&pointer) < config.stroke_radius)
}

/// Whether `pointer` lies in the shape's padded bounding box
pub fn hit_shape(shape: &Shape, pointer: PixelPoint, page: PageSize, config: &HitTestConfig) -> bool {
    shape
        .pixel_bounds(page)
        .expanded(config.shape_padding)
        .contains(&pointer)
}

/// Estimated pixel box used to hit a text annotation
///
/// The whole content counts as one run of glyphs on a single line.
pub fn text_bounds(text: &TextAnnotation, page: PageSize) -> PixelRect {
    let anchor = page.denormalize(text.anchor);
    PixelRect::new(
        anchor.x,
        anchor.y,
        text.text.chars().count() as f64 * text.font_size * GLYPH_WIDTH_FACTOR,
        text.font_size * LINE_HEIGHT_FACTOR,
    )
}

/// Estimated pixel box of the text as laid out line by line, for outlines
pub fn text_block_bounds(text: &TextAnnotation, page: PageSize) -> PixelRect {
    let anchor = page.denormalize(text.anchor);
    let longest_line = text.text.lines().map(|line| line.chars().count()).max().unwrap_or(0);
    let line_count = text.text.lines().count().max(1);
    PixelRect::new(
        anchor.x,
        anchor.y,
        longest_line as f64 * text.font_size * GLYPH_WIDTH_FACTOR,
        line_count as f64 * text.font_size * LINE_HEIGHT_FACTOR,
    )
}

/// Whether `pointer` lies in the text's padded estimated box
///
/// Empty texts never hit.
pub fn hit_text(text: &TextAnnotation, pointer: PixelPoint, page: PageSize, config: &HitTestConfig) -> bool {
    if text.text.is_empty() {
        return false;
    }
    text_bounds(text, page).expanded(config.text_padding).contains(&pointer)
}

/// Every entity of `set` under `pointer`
pub fn hit_test(set: &PageAnnotationSet, pointer: PixelPoint, page: PageSize, config: &HitTestConfig) -> SelectionSet {
    if !page.is_loaded() {
        return SelectionSet::new();
    }

    SelectionSet {
        stroke_ids: set
            .strokes
            .iter()
            .filter(|stroke| hit_stroke(stroke, pointer, page, config))
            .map(|stroke| stroke.id)
            .collect(),
        shape_ids: set
            .shapes
            .iter()
            .filter(|shape| hit_shape(shape, pointer, page, config))
            .map(|shape| shape.id)
            .collect(),
        text_ids: set
            .texts
            .iter()
            .filter(|text| hit_text(text, pointer, page, config))
            .map(|text| text.id)
            .collect(),
    }
}

/// Update `selection` for a click at `pointer`
///
/// With `additive` the hits are merged into the current selection, otherwise
/// they replace it. Returns whether anything was under the pointer.
pub fn select_at(
    selection: &mut SelectionSet,
    set: &PageAnnotationSet,
    pointer: PixelPoint,
    page: PageSize,
    config: &HitTestConfig,
    additive: bool,
) -> bool {
    let hits = hit_test(set, pointer, page, config);
    let hit_anything = !hits.is_empty();
    if additive {
        selection.union(hits);
    } else {
        *selection = hits;
    }
    hit_anything
}

/// Remove every selected entity from `set`
///
/// Returns whether anything was removed.
pub fn remove_selection(set: &mut PageAnnotationSet, selection: &SelectionSet) -> bool {
    let before = set.len();
    set.strokes.retain(|stroke| !selection.contains_stroke(stroke.id));
    set.shapes.retain(|shape| !selection.contains_shape(shape.id));
    set.texts.retain(|text| !selection.contains_text(text.id));
    set.len() != before
}

/// Apply `delta` to every selected entity of `set`, clamping into the page
pub fn translate_selection(set: &mut PageAnnotationSet, selection: &SelectionSet, delta: NormalizedDelta) {
    for stroke in set.strokes.iter_mut().filter(|s| selection.contains_stroke(s.id)) {
        stroke.translate(delta);
    }
    for shape in set.shapes.iter_mut().filter(|s| selection.contains_shape(s.id)) {
        shape.translate(delta);
    }
    for text in set.texts.iter_mut().filter(|t| selection.contains_text(t.id)) {
        text.translate(delta);
    }
}

/// An in-progress move of the selected entities
///
/// Every update recomputes positions from the pre-drag snapshot so clamping
/// at the page edge never accumulates.
#[derive(Debug, Clone)]
pub struct GroupDrag {
    start: NormalizedPoint,
    origin: PageAnnotationSet,
    delta: NormalizedDelta,
}

impl GroupDrag {
    pub fn begin(start: NormalizedPoint, live: &PageAnnotationSet) -> Self {
        Self {
            start,
            origin: live.clone(),
            delta: NormalizedDelta::default(),
        }
    }

    /// Move the selection so it follows the pointer at `now`
    pub fn update(&mut self, now: NormalizedPoint, selection: &SelectionSet, live: &mut PageAnnotationSet) {
        self.delta = NormalizedDelta::between(self.start, now);
        let mut moved = self.origin.clone();
        translate_selection(&mut moved, selection, self.delta);
        *live = moved;
    }

    /// Current pointer displacement since the drag started
    pub fn delta(&self) -> NormalizedDelta {
        self.delta
    }

    /// Release the drag
    ///
    /// Returns the pre-drag set when the selection actually moved, which is
    /// the history frame for the commit.
    pub fn finish(self) -> Option<PageAnnotationSet> {
        if self.delta.is_zero() {
            None
        } else {
            Some(self.origin)
        }
    }

    /// Abort the drag, restoring the pre-drag positions
    pub fn cancel(self, live: &mut PageAnnotationSet) {
        *live = self.origin;
    }
}
