//! Annotation session for one open document
//!
//! The session is the page controller's view of the engine. It owns the live
//! working set (through the [`Compositor`]), the undo/redo stacks, the
//! selection and the gesture state machine, and it keeps the active page in
//! sync with the store.
//!
//! Every mutation of the working set goes through a commit point:
//! 1. the pre-mutation set is pushed onto the undo stack (redo is cleared)
//! 2. the set is mutated and the layers are redrawn
//! 3. all three collections of the active page are written
//!
//! Store failures never roll back the in-memory set; they are logged and kept
//! as [`AnnotationSession::last_persistence_error`].

use std::sync::Arc;

use crate::annotation::{Color, PageAnnotationSet, TextId};
use crate::compositor::{Compositor, Overlay};
use crate::config::EngineConfig;
use crate::geometry::{PageSize, PixelPoint};
use crate::history::History;
use crate::page_order::{PageOrder, PageOrderError};
use crate::persistence::{AnnotationRepository, DocumentId, KeyValueStore, StoreError, StoreResult, StoredPage};
use crate::selection::{hit_text, remove_selection, select_at, GroupDrag, SelectionSet};
use crate::shape_tool::{place_stamp, ShapeDrag, ShapeOutcome};
use crate::stroke::{auto_highlight, HighlightDrag, StrokeCapture};
use crate::text_edit::{TextEditOutcome, TextEditSession};
use crate::text_layer::{TextDetector, TextLayer};
use crate::tool::{HighlightMode, Tool};
use crate::write_coordinator::{AutosaveOutcome, Autosaver, PageWriter, WriteGate};

/// Page geometry supplied by the rendering collaborator
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageView {
    /// Rendered page size in pixels
    pub size: PageSize,
    /// Zoom factor the page was rendered at
    pub zoom: f64,
}

impl PageView {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            size: PageSize::new(width, height),
            zoom: 1.0,
        }
    }

    pub fn with_zoom(mut self, zoom: f64) -> Self {
        self.zoom = zoom;
        self
    }
}

impl Default for PageView {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

/// Drawing settings copied into new entities
#[derive(Debug, Clone, PartialEq)]
pub struct Brush {
    /// Pen, eraser and shape color
    pub color: Color,
    /// Pen, eraser and shape width in pixels
    pub width: f64,
    pub highlight_color: Color,
    /// Highlight band thickness
    pub highlight_width: f64,
    /// Fill rectangles and circles
    pub fill: bool,
    pub font_size: f64,
    pub text_color: Color,
}

impl Default for Brush {
    fn default() -> Self {
        Self {
            color: Color::BLACK,
            width: 2.0,
            highlight_color: Color::HIGHLIGHT,
            highlight_width: 12.0,
            fill: false,
            font_size: 16.0,
            text_color: Color::BLACK,
        }
    }
}

/// A pointer sample in page pixel space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    pub position: PixelPoint,
    /// Modifier held: selection clicks add to the current selection
    pub additive: bool,
}

impl PointerEvent {
    pub fn at(x: f64, y: f64) -> Self {
        Self {
            position: PixelPoint::new(x, y),
            additive: false,
        }
    }

    pub fn with_additive(mut self, additive: bool) -> Self {
        self.additive = additive;
        self
    }
}

/// Pointer sequencing state
#[derive(Debug, Default)]
enum Gesture {
    #[default]
    Idle,
    Stroke(StrokeCapture),
    Highlight(HighlightDrag),
    Shape(ShapeDrag),
    Move(GroupDrag),
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct ActivePage {
    display_index: usize,
    stored: StoredPage,
}

/// Live annotation state of one document
pub struct AnnotationSession {
    document: DocumentId,
    config: EngineConfig,
    page_order: PageOrder,
    active: Option<ActivePage>,
    view: PageView,
    tool: Tool,
    brush: Brush,
    compositor: Compositor,
    history: History,
    selection: SelectionSet,
    gesture: Gesture,
    text_edit: Option<TextEditSession>,
    text_detector: Option<Box<dyn TextDetector>>,
    text_layer: Option<TextLayer>,
    writer: PageWriter,
    autosaver: Option<Autosaver>,
    last_persistence_error: Option<StoreError>,
}

impl std::fmt::Debug for AnnotationSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnnotationSession")
            .field("document", &self.document)
            .field("active", &self.active)
            .field("tool", &self.tool)
            .field("annotations", &self.compositor.working_set().len())
            .finish_non_exhaustive()
    }
}

impl AnnotationSession {
    /// Open a document with `page_count` pages backed by `store`
    ///
    /// No page is active until [`AnnotationSession::activate_page`] is called.
    pub fn new(document: DocumentId, page_count: u32, store: Arc<dyn KeyValueStore>, config: EngineConfig) -> Self {
        let writer = PageWriter::new(AnnotationRepository::new(store));
        let autosaver = (!config.autosave_interval.is_zero())
            .then(|| Autosaver::spawn(writer.clone(), config.autosave_interval));

        tracing::info!(document = %document, page_count, "annotation session opened");

        Self {
            document,
            page_order: PageOrder::identity(page_count),
            active: None,
            view: PageView::default(),
            tool: Tool::default(),
            brush: Brush::default(),
            compositor: Compositor::new(),
            history: History::new(config.history_limit),
            selection: SelectionSet::new(),
            gesture: Gesture::Idle,
            text_edit: None,
            text_detector: None,
            text_layer: None,
            writer,
            autosaver,
            last_persistence_error: None,
            config,
        }
    }

    /// Attach a text-detection collaborator used for snapping and auto-highlight
    pub fn with_text_detector(mut self, detector: Box<dyn TextDetector>) -> Self {
        self.text_detector = Some(detector);
        self
    }

    /// Replace the identity page order
    pub fn with_page_order(mut self, order: PageOrder) -> Self {
        self.page_order = order;
        self
    }

    // Accessors

    pub fn document(&self) -> &DocumentId {
        &self.document
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    pub fn brush(&self) -> &Brush {
        &self.brush
    }

    /// Brush changes apply to entities started afterwards only
    pub fn brush_mut(&mut self) -> &mut Brush {
        &mut self.brush
    }

    pub fn working_set(&self) -> &PageAnnotationSet {
        self.compositor.working_set()
    }

    pub fn compositor(&self) -> &Compositor {
        &self.compositor
    }

    pub fn selection(&self) -> &SelectionSet {
        &self.selection
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn view(&self) -> PageView {
        self.view
    }

    pub fn page_order(&self) -> &PageOrder {
        &self.page_order
    }

    /// Stored id of the active page
    pub fn active_page(&self) -> Option<StoredPage> {
        self.active.map(|active| active.stored)
    }

    pub fn active_display_index(&self) -> Option<usize> {
        self.active.map(|active| active.display_index)
    }

    pub fn text_layer(&self) -> Option<&TextLayer> {
        self.text_layer.as_ref()
    }

    pub fn text_edit(&self) -> Option<&TextEditSession> {
        self.text_edit.as_ref()
    }

    pub fn is_gesture_active(&self) -> bool {
        !matches!(self.gesture, Gesture::Idle)
    }

    /// Most recent store failure, kept for the notification layer
    pub fn last_persistence_error(&self) -> Option<&StoreError> {
        self.last_persistence_error.as_ref()
    }

    pub fn take_persistence_error(&mut self) -> Option<StoreError> {
        self.last_persistence_error.take()
    }

    /// Gate serializing store writes, shared with the autosave thread
    pub fn write_gate(&self) -> &Arc<WriteGate> {
        self.writer.gate()
    }

    // Page lifecycle

    /// Make the page at `display_index` live
    ///
    /// Any gesture in progress is cancelled and an open text entry is
    /// confirmed first. The working set is rebuilt from the store; history
    /// and selection start empty.
    pub fn activate_page(&mut self, display_index: usize, view: PageView) -> Result<(), PageOrderError> {
        let stored = self.page_order.resolve(display_index)?;

        self.discard_gesture();
        self.confirm_text_edit();

        let (set, errors) = self.writer.repository().load_page(&self.document, stored);
        let load_failed = !errors.is_empty();
        for err in errors {
            self.record_error(err);
        }

        self.view = view;
        self.compositor.set_page(view.size);
        self.compositor.replace_working_set(set);
        self.history.reset();
        self.selection.clear();
        self.active = Some(ActivePage { display_index, stored });
        self.text_layer = self.detect_text(stored, view);
        // A partially loaded page is only written back by the next commit
        if load_failed {
            self.writer.unpublish();
        } else {
            self.writer
                .publish(&self.document, stored, self.compositor.working_set());
        }
        self.redraw();

        tracing::info!(
            document = %self.document,
            display_index,
            page = %stored,
            annotations = self.compositor.working_set().len(),
            "page activated"
        );
        Ok(())
    }

    /// Apply new page pixel dimensions without touching normalized data
    pub fn resize_page(&mut self, view: PageView) {
        self.view = view;
        self.compositor.set_page(view.size);
        self.redraw();
    }

    /// Move a page in the display order; the active page keeps its stored id
    pub fn move_page(&mut self, from: usize, to: usize) -> Result<(), PageOrderError> {
        self.page_order.move_page(from, to)?;
        if let Some(active) = self.active.as_mut() {
            if let Some(index) = self.page_order.display_index_of(active.stored) {
                active.display_index = index;
            }
        }
        Ok(())
    }

    fn detect_text(&self, page: StoredPage, view: PageView) -> Option<TextLayer> {
        let detector = self.text_detector.as_ref()?;
        match detector.detect(page, view.zoom) {
            Ok(items) => Some(TextLayer::new(items, view.size)).filter(|layer| !layer.is_empty()),
            Err(err) => {
                tracing::debug!(error = %err, page = %page, "text detection unavailable");
                None
            }
        }
    }

    // Tools

    /// Switch tools
    ///
    /// Any gesture in progress is discarded without commit, an open text
    /// entry is confirmed and the selection is cleared.
    pub fn set_tool(&mut self, tool: Tool) {
        if tool == self.tool {
            return;
        }

        self.discard_gesture();
        self.confirm_text_edit();
        self.selection.clear();
        self.tool = tool;
        self.redraw();
        tracing::debug!(tool = tool.name(), "tool changed");
    }

    // Pointer handling

    pub fn pointer_down(&mut self, event: PointerEvent) {
        let page = self.view.size;
        if self.active.is_none() {
            return;
        }
        let Some(point) = page.normalize(event.position) else {
            return;
        };

        if self.text_edit.is_some() {
            self.confirm_text_edit();
        }
        self.discard_gesture();

        match self.tool {
            Tool::Pen | Tool::Eraser => {
                let Some(stroke_tool) = self.tool.stroke_tool() else {
                    return;
                };
                let capture = StrokeCapture::begin(stroke_tool, self.brush.color, self.brush.width, point);
                self.compositor.redraw_ink(Some(capture.stroke()));
                self.gesture = Gesture::Stroke(capture);
            }
            Tool::Highlight(HighlightMode::Auto) => {
                let stroke = auto_highlight(
                    self.text_layer.as_ref(),
                    event.position,
                    page,
                    self.brush.highlight_color,
                    self.brush.highlight_width,
                );
                match stroke {
                    Some(stroke) => self.commit(|set| set.strokes.push(stroke)),
                    None => tracing::debug!("no text under pointer to highlight"),
                }
            }
            Tool::Highlight(HighlightMode::Manual) => {
                let drag = HighlightDrag::begin(self.brush.highlight_color, self.brush.highlight_width, point);
                self.compositor.redraw_ink(Some(drag.stroke()));
                self.gesture = Gesture::Highlight(drag);
            }
            Tool::Shape(kind) => {
                let drag = ShapeDrag::begin(kind, point, self.brush.color, self.brush.width, self.brush.fill);
                self.compositor.redraw_shapes(Some(drag.shape()), &self.selection);
                self.gesture = Gesture::Shape(drag);
            }
            Tool::Stamp(kind) => {
                if let Some(stamp) = place_stamp(kind, point, page, self.config.stamp_size_px) {
                    self.commit(|set| set.shapes.push(stamp));
                }
            }
            Tool::Text => {
                let hit_config = self.config.hit_test();
                let existing = self
                    .compositor
                    .working_set()
                    .texts
                    .iter()
                    .rev()
                    .find(|text| hit_text(text, event.position, page, &hit_config));
                let session = match existing {
                    Some(text) => TextEditSession::open_existing(text),
                    None => TextEditSession::open_new(point, self.brush.font_size, self.brush.text_color),
                };
                self.compositor.redraw_texts(Some(session.draft()));
                self.text_edit = Some(session);
            }
            Tool::Select => {
                let hit_anything = select_at(
                    &mut self.selection,
                    self.compositor.working_set(),
                    event.position,
                    page,
                    &self.config.hit_test(),
                    event.additive,
                );
                if hit_anything {
                    self.gesture = Gesture::Move(GroupDrag::begin(point, self.compositor.working_set()));
                }
                self.redraw();
            }
        }
    }

    pub fn pointer_move(&mut self, event: PointerEvent) {
        let page = self.view.size;
        let Some(point) = page.normalize(event.position) else {
            return;
        };

        match &mut self.gesture {
            Gesture::Idle => {}
            Gesture::Stroke(capture) => {
                let appended = capture.extend(point, page, self.text_layer.as_ref(), self.config.capture_options());
                self.compositor.append_ink(capture.stroke(), appended);
            }
            Gesture::Highlight(drag) => {
                drag.update(point);
                self.compositor.redraw_ink(Some(drag.stroke()));
            }
            Gesture::Shape(drag) => {
                drag.update(point);
                self.compositor.redraw_shapes(Some(drag.shape()), &self.selection);
            }
            Gesture::Move(drag) => {
                drag.update(point, &self.selection, self.compositor.working_set_mut());
                self.compositor.redraw_all(&self.selection, Overlay::None);
            }
        }
    }

    pub fn pointer_up(&mut self, event: PointerEvent) {
        let page = self.view.size;
        let gesture = std::mem::take(&mut self.gesture);
        let point = page.normalize(event.position);

        match gesture {
            Gesture::Idle => {}
            Gesture::Stroke(capture) => {
                let stroke = capture.finish();
                self.commit(|set| set.strokes.push(stroke));
            }
            Gesture::Highlight(mut drag) => {
                if let Some(point) = point {
                    drag.update(point);
                }
                match drag.finish(page, self.config.min_shape_size_px) {
                    Some(stroke) => self.commit(|set| set.strokes.push(stroke)),
                    None => self.redraw(),
                }
            }
            Gesture::Shape(mut drag) => {
                if let Some(point) = point {
                    drag.update(point);
                }
                match drag.finish(page, self.config.min_shape_size_px) {
                    ShapeOutcome::Committed(shape) => self.commit(|set| set.shapes.push(shape)),
                    ShapeOutcome::Discarded => {
                        tracing::debug!("shape below minimum size discarded");
                        self.redraw();
                    }
                }
            }
            Gesture::Move(mut drag) => {
                if let Some(point) = point {
                    drag.update(point, &self.selection, self.compositor.working_set_mut());
                }
                match drag.finish() {
                    Some(pre_drag) => self.finish_commit(pre_drag),
                    None => self.redraw(),
                }
            }
        }
    }

    /// Abort the gesture in progress, e.g. when the pointer leaves the canvas
    pub fn cancel_gesture(&mut self) {
        if self.is_gesture_active() {
            self.discard_gesture();
            tracing::debug!("gesture cancelled");
            self.redraw();
        }
    }

    fn discard_gesture(&mut self) {
        if let Gesture::Move(drag) = std::mem::take(&mut self.gesture) {
            drag.cancel(self.compositor.working_set_mut());
        }
    }

    // Selection

    /// Remove every selected entity in one commit point
    ///
    /// Returns whether anything was removed.
    pub fn delete_selection(&mut self) -> bool {
        if self.selection.is_empty() {
            return false;
        }

        let pre = self.compositor.working_set().clone();
        let removed = remove_selection(self.compositor.working_set_mut(), &self.selection);
        self.selection.clear();
        if removed {
            self.finish_commit(pre);
        } else {
            self.redraw();
        }
        removed
    }

    /// Remove every annotation on the active page in one commit point
    pub fn clear_page(&mut self) -> bool {
        if self.active.is_none() || self.compositor.working_set().is_empty() {
            return false;
        }

        self.discard_gesture();
        self.selection.clear();
        self.commit(PageAnnotationSet::clear);
        true
    }

    // Text entry

    /// Re-open a committed text for editing
    pub fn open_text_edit(&mut self, id: TextId) -> bool {
        let Some(text) = self.compositor.working_set().text(id) else {
            return false;
        };
        let session = TextEditSession::open_existing(text);
        self.compositor.redraw_texts(Some(session.draft()));
        self.text_edit = Some(session);
        true
    }

    /// Change the open text entry and redraw its draft
    pub fn update_text_edit(&mut self, edit: impl FnOnce(&mut TextEditSession)) -> bool {
        let Some(session) = self.text_edit.as_mut() else {
            return false;
        };
        edit(session);
        self.compositor.redraw_texts(Some(session.draft()));
        true
    }

    /// Confirm the open text entry
    ///
    /// Creating, changing or removing a text is a commit point; confirming
    /// an unchanged text is not.
    pub fn confirm_text_edit(&mut self) -> Option<TextEditOutcome> {
        let session = self.text_edit.take()?;
        let pre = self.compositor.working_set().clone();
        let outcome = session.confirm(self.compositor.working_set_mut());

        if outcome.is_commit() {
            self.finish_commit(pre);
        } else {
            self.compositor.redraw_texts(None);
        }
        tracing::debug!(?outcome, "text entry confirmed");
        Some(outcome)
    }

    /// Close the open text entry without changing anything
    pub fn cancel_text_edit(&mut self) -> bool {
        if self.text_edit.take().is_none() {
            return false;
        }
        self.compositor.redraw_texts(None);
        true
    }

    // History

    /// Step back one commit; a no-op when there is nothing to undo
    pub fn undo(&mut self) -> bool {
        self.discard_gesture();
        let Some(previous) = self.history.undo(self.compositor.working_set()) else {
            return false;
        };
        self.compositor.replace_working_set(previous);
        self.redraw();
        self.persist();
        true
    }

    /// Step forward one undone commit; a no-op when there is nothing to redo
    pub fn redo(&mut self) -> bool {
        self.discard_gesture();
        let Some(next) = self.history.redo(self.compositor.working_set()) else {
            return false;
        };
        self.compositor.replace_working_set(next);
        self.redraw();
        self.persist();
        true
    }

    // Persistence

    /// Write the active page now, waiting for any write in flight
    pub fn flush(&mut self) -> StoreResult<bool> {
        let result = self.writer.flush();
        if let Err(err) = &result {
            tracing::warn!(error = %err, "flush failed");
        }
        result
    }

    /// Run one autosave tick on the calling thread
    pub fn autosave_now(&mut self) -> AutosaveOutcome {
        self.writer.autosave_tick()
    }

    fn commit(&mut self, mutate: impl FnOnce(&mut PageAnnotationSet)) {
        let pre = self.compositor.working_set().clone();
        mutate(self.compositor.working_set_mut());
        self.finish_commit(pre);
    }

    /// Record a commit point whose mutation is already applied
    fn finish_commit(&mut self, pre_mutation: PageAnnotationSet) {
        self.history.commit(pre_mutation);
        self.redraw();
        self.persist();
        tracing::debug!(
            annotations = self.compositor.working_set().len(),
            undo = self.history.undo_len(),
            "commit"
        );
    }

    fn persist(&mut self) {
        let Some(active) = self.active else {
            return;
        };
        if let Err(err) = self
            .writer
            .persist(&self.document, active.stored, self.compositor.working_set())
        {
            self.record_error(err);
        }
    }

    fn record_error(&mut self, err: StoreError) {
        tracing::warn!(document = %self.document, error = %err, "annotation persistence failed");
        self.last_persistence_error = Some(err);
    }

    fn redraw(&mut self) {
        let overlay = match &self.gesture {
            Gesture::Stroke(capture) => Overlay::Stroke(capture.stroke()),
            Gesture::Highlight(drag) => Overlay::Stroke(drag.stroke()),
            Gesture::Shape(drag) => Overlay::Shape(drag.shape()),
            Gesture::Idle | Gesture::Move(_) => match &self.text_edit {
                Some(session) => Overlay::Text(session.draft()),
                None => Overlay::None,
            },
        };
        self.compositor.redraw_all(&self.selection, overlay);
    }
}

impl Drop for AnnotationSession {
    fn drop(&mut self) {
        // The autosaver flushes on its own drop
        if self.autosaver.is_none() {
            if let Err(err) = self.writer.flush() {
                tracing::warn!(error = %err, "final flush failed");
            }
        }
    }
}
