//! End-to-end annotation session scenarios

use std::sync::Arc;
use std::time::Duration;

use pagemark_core::{
    AnnotationKind, AnnotationRepository, AnnotationSession, AutosaveOutcome, Color, DocumentId, DragShape,
    EngineConfig, KeyValueStore, LayerKind, MemoryStore, NormalizedPoint, PageAnnotationSet, PageOrder, PageView,
    PointerEvent, StoreError, StoreKey, StoreResult, StoredPage, Stroke, StrokeTool, Tool,
};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn config() -> EngineConfig {
    EngineConfig::default().with_autosave_interval(Duration::ZERO)
}

fn open(store: Arc<MemoryStore>, config: EngineConfig, view: PageView) -> AnnotationSession {
    init_tracing();
    let mut session = AnnotationSession::new(DocumentId::new("scenario.pdf"), 3, store, config);
    session.activate_page(0, view).unwrap();
    session
}

fn drag(session: &mut AnnotationSession, from: (f64, f64), to: (f64, f64)) {
    session.pointer_down(PointerEvent::at(from.0, from.1));
    session.pointer_move(PointerEvent::at(to.0, to.1));
    session.pointer_up(PointerEvent::at(to.0, to.1));
}

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

/// Store that fails every call
struct OfflineStore;

impl KeyValueStore for OfflineStore {
    fn read(&self, _key: &StoreKey) -> StoreResult<Option<Vec<u8>>> {
        Err(StoreError::Backend("offline".to_string()))
    }

    fn write(&self, _key: &StoreKey, _bytes: &[u8]) -> StoreResult<()> {
        Err(StoreError::Backend("offline".to_string()))
    }

    fn delete(&self, _key: &StoreKey) -> StoreResult<()> {
        Err(StoreError::Backend("offline".to_string()))
    }
}

#[test]
fn pen_stroke_commits_one_stroke() {
    let mut session = open(Arc::new(MemoryStore::new()), config(), PageView::new(1000.0, 800.0));

    session.pointer_down(PointerEvent::at(100.0, 80.0));
    session.pointer_move(PointerEvent::at(150.0, 80.0));
    session.pointer_move(PointerEvent::at(200.0, 80.0));
    session.pointer_up(PointerEvent::at(200.0, 80.0));

    let strokes = &session.working_set().strokes;
    assert_eq!(strokes.len(), 1);
    assert_eq!(strokes[0].tool, StrokeTool::Pen);

    let first = strokes[0].points.first().unwrap();
    let last = strokes[0].points.last().unwrap();
    assert!(approx(first.x, 0.1) && approx(first.y, 0.1));
    assert!(approx(last.x, 0.2) && approx(last.y, 0.1));

    assert_eq!(session.history().undo_len(), 1);
    assert_eq!(session.history().redo_len(), 0);
}

#[test]
fn sub_threshold_rectangle_commits_nothing() {
    let store = Arc::new(MemoryStore::new());
    let mut session = open(store.clone(), config(), PageView::new(800.0, 600.0));
    session.set_tool(Tool::Shape(DragShape::Rectangle));

    drag(&mut session, (400.0, 300.0), (400.8, 300.6));

    assert!(session.working_set().shapes.is_empty());
    assert!(!session.can_undo());
    assert!(store.is_empty());
    assert!(session.compositor().layer(LayerKind::Shape).primitives.is_empty());
}

#[test]
fn group_move_then_undo_restores_both() {
    let mut session = open(
        Arc::new(MemoryStore::new()),
        config().with_smoothing(false),
        PageView::new(1000.0, 800.0),
    );

    drag(&mut session, (100.0, 100.0), (200.0, 100.0));
    session.set_tool(Tool::Shape(DragShape::Rectangle));
    drag(&mut session, (500.0, 400.0), (600.0, 480.0));
    let before_move = session.working_set().clone();

    session.set_tool(Tool::Select);
    session.pointer_down(PointerEvent::at(100.0, 100.0));
    session.pointer_up(PointerEvent::at(100.0, 100.0));

    // Additive click on the shape, then drag by (50, 40) px = (0.05, 0.05)
    session.pointer_down(PointerEvent::at(550.0, 440.0).with_additive(true));
    session.pointer_move(PointerEvent::at(580.0, 460.0));
    session.pointer_up(PointerEvent::at(600.0, 480.0));
    assert_eq!(session.selection().len(), 2);

    let moved = session.working_set();
    assert!(approx(moved.strokes[0].points[0].x, 0.15));
    assert!(approx(moved.strokes[0].points[0].y, 0.175));
    assert!(approx(moved.shapes[0].start.x, 0.55));
    assert!(approx(moved.shapes[0].start.y, 0.55));
    assert_eq!(session.history().undo_len(), 3);

    assert!(session.undo());
    assert_eq!(session.working_set(), &before_move);
    assert_eq!(session.selection().len(), 2);
}

#[test]
fn group_move_clamps_into_page() {
    let mut session = open(
        Arc::new(MemoryStore::new()),
        config().with_smoothing(false),
        PageView::new(1000.0, 800.0),
    );
    session.set_tool(Tool::Shape(DragShape::Circle));
    drag(&mut session, (800.0, 600.0), (950.0, 750.0));

    session.set_tool(Tool::Select);
    session.pointer_down(PointerEvent::at(850.0, 650.0));
    session.pointer_move(PointerEvent::at(1200.0, 1000.0));
    session.pointer_up(PointerEvent::at(1400.0, 1100.0));

    let shape = &session.working_set().shapes[0];
    for point in [shape.start, shape.end] {
        assert!(point.is_within_page());
    }
    assert_eq!(shape.end.x, 1.0);
    assert_eq!(shape.end.y, 1.0);
}

#[test]
fn page_switch_resets_history() {
    let store = Arc::new(MemoryStore::new());
    let mut session = open(store, config(), PageView::new(1000.0, 800.0));

    drag(&mut session, (100.0, 100.0), (200.0, 100.0));
    drag(&mut session, (100.0, 300.0), (200.0, 300.0));
    assert_eq!(session.history().undo_len(), 2);
    session.undo();
    assert!(session.can_redo());

    session.activate_page(1, PageView::new(1000.0, 800.0)).unwrap();
    assert!(!session.can_undo());
    assert!(!session.can_redo());
    assert!(session.working_set().is_empty());

    // The undone state is what page 1 persisted
    session.activate_page(0, PageView::new(1000.0, 800.0)).unwrap();
    assert_eq!(session.working_set().strokes.len(), 1);
}

#[test]
fn undo_redo_round_trip_over_many_commits() {
    let mut session = open(Arc::new(MemoryStore::new()), config(), PageView::new(1000.0, 800.0));

    for i in 0..6 {
        let y = 100.0 + i as f64 * 50.0;
        drag(&mut session, (100.0, y), (300.0, y + 10.0));
    }
    session.set_tool(Tool::Shape(DragShape::Arrow));
    drag(&mut session, (400.0, 400.0), (600.0, 500.0));

    let final_state = session.working_set().clone();
    let commits = session.history().undo_len();
    assert_eq!(commits, 7);

    for _ in 0..commits {
        assert!(session.undo());
    }
    assert!(session.working_set().is_empty());
    assert!(!session.undo());

    for _ in 0..commits {
        assert!(session.redo());
    }
    assert_eq!(session.working_set(), &final_state);
    assert!(!session.redo());
}

#[test]
fn store_round_trip_across_sessions() {
    let store = Arc::new(MemoryStore::new());
    let saved = {
        let mut session = open(store.clone(), config(), PageView::new(1000.0, 800.0));
        drag(&mut session, (123.0, 456.0), (321.0, 654.0));
        session.set_tool(Tool::Shape(DragShape::Line));
        drag(&mut session, (10.0, 10.0), (700.0, 20.0));
        session.set_tool(Tool::Text);
        session.pointer_down(PointerEvent::at(333.0, 222.0));
        session.update_text_edit(|edit| edit.set_text("first\nsecond"));
        session.confirm_text_edit();
        session.working_set().clone()
    };

    // Reopened at a different render size
    let session = open(store, config(), PageView::new(500.0, 400.0));
    assert_eq!(session.working_set(), &saved);
}

#[test]
fn redraw_is_stable() {
    let mut session = open(Arc::new(MemoryStore::new()), config(), PageView::new(1000.0, 800.0));
    drag(&mut session, (100.0, 100.0), (200.0, 150.0));
    drag(&mut session, (300.0, 100.0), (400.0, 150.0));
    session.set_tool(Tool::Shape(DragShape::Rectangle));
    drag(&mut session, (100.0, 400.0), (200.0, 500.0));

    let first: Vec<_> = session.compositor().layers().iter().map(|l| l.primitives.clone()).collect();
    session.resize_page(PageView::new(1000.0, 800.0));
    let second: Vec<_> = session.compositor().layers().iter().map(|l| l.primitives.clone()).collect();
    assert_eq!(first, second);
}

#[test]
fn autosave_skips_while_write_in_flight() {
    let store = Arc::new(MemoryStore::new());
    let mut session = open(store.clone(), config(), PageView::new(1000.0, 800.0));
    drag(&mut session, (100.0, 100.0), (200.0, 100.0));

    let gate = Arc::clone(session.write_gate());
    let guard = gate.acquire();
    assert!(matches!(session.autosave_now(), AutosaveOutcome::SkippedInFlight));
    drop(guard);

    assert!(matches!(session.autosave_now(), AutosaveOutcome::Written));
    assert_eq!(store.len(), 3);
}

#[test]
fn persistence_failure_keeps_memory_state() {
    init_tracing();
    let mut session = AnnotationSession::new(DocumentId::new("offline.pdf"), 2, Arc::new(OfflineStore), config());
    session.activate_page(0, PageView::new(1000.0, 800.0)).unwrap();
    assert!(session.take_persistence_error().is_some());

    drag(&mut session, (100.0, 100.0), (200.0, 100.0));
    assert_eq!(session.working_set().strokes.len(), 1);
    assert!(matches!(session.last_persistence_error(), Some(StoreError::Backend(_))));

    assert!(session.undo());
    assert!(session.working_set().is_empty());
    assert!(session.redo());
    assert_eq!(session.working_set().strokes.len(), 1);
}

#[test]
fn zero_size_page_is_noop() {
    let mut session = open(Arc::new(MemoryStore::new()), config(), PageView::new(0.0, 0.0));
    drag(&mut session, (100.0, 100.0), (200.0, 100.0));
    assert!(session.working_set().is_empty());
    assert!(session.compositor().layers().iter().all(|layer| layer.primitives.is_empty()));
}

#[test]
fn reordered_pages_read_and_write_stored_ids() {
    init_tracing();
    let store = Arc::new(MemoryStore::new());
    let document = DocumentId::new("reordered.pdf");

    let mut seeded = PageAnnotationSet::new();
    seeded
        .strokes
        .push(Stroke::new(StrokeTool::Pen, Color::BLUE, 3.0, NormalizedPoint::new(0.4, 0.6)));
    AnnotationRepository::new(store.clone())
        .save_page(&document, StoredPage(2), &seeded)
        .unwrap();
    let key = |kind, page| StoreKey::new(kind, document.clone(), StoredPage(page));
    let before: Vec<_> = AnnotationKind::ALL
        .into_iter()
        .map(|kind| store.read(&key(kind, 2)).unwrap())
        .collect();

    let mut session = AnnotationSession::new(document.clone(), 3, store.clone(), config())
        .with_page_order(PageOrder::from_stored(vec![2, 1, 3]).unwrap());
    session.activate_page(0, PageView::new(1000.0, 800.0)).unwrap();
    assert_eq!(session.active_page(), Some(StoredPage(2)));
    assert_eq!(session.working_set(), &seeded);

    drag(&mut session, (100.0, 100.0), (200.0, 100.0));
    assert_eq!(session.working_set().strokes.len(), 2);

    // Only stored page 2 changed; display index 0 never reaches the store as page 1
    assert_eq!(store.len(), 3);
    let after: Vec<_> = AnnotationKind::ALL
        .into_iter()
        .map(|kind| store.read(&key(kind, 2)).unwrap())
        .collect();
    assert_ne!(after[0], before[0]);
    assert_eq!(after[1..], before[1..]);
    for page in [1, 3] {
        for kind in AnnotationKind::ALL {
            assert!(!store.contains(&key(kind, page)));
        }
    }
}
