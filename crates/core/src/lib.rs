//! Pagemark Core Library
//!
//! Annotation engine for paginated documents: resolution-independent
//! annotation model, pointer-driven capture, layer compositing, per-page
//! undo/redo and store synchronization.

pub mod annotation;
pub mod compositor;
pub mod config;
pub mod geometry;
pub mod history;
pub mod page_order;
pub mod persistence;
pub mod selection;
pub mod session;
pub mod shape_tool;
pub mod stroke;
pub mod text_edit;
pub mod text_layer;
pub mod tool;
pub mod write_coordinator;

pub use annotation::{
    Color, DragShape, PageAnnotationSet, Shape, ShapeId, ShapeKind, StampKind, Stroke, StrokeId,
    StrokeTool, TextAnnotation, TextId,
};
pub use compositor::{BlendMode, Compositor, Layer, LayerKind, Overlay, Primitive, LAYER_ORDER};
pub use config::{ConfigError, EngineConfig};
pub use geometry::{denormalize, normalize, NormalizedDelta, NormalizedPoint, PageSize, PixelPoint, PixelRect};
pub use history::{History, HistoryFrame};
pub use page_order::{PageOrder, PageOrderError};
pub use persistence::{
    AnnotationKind, AnnotationRepository, DocumentId, KeyValueStore, MemoryStore, StoreError, StoreKey,
    StoreResult, StoredPage,
};
pub use selection::{GroupDrag, HitTestConfig, SelectionSet};
pub use session::{AnnotationSession, Brush, PageView, PointerEvent};
pub use shape_tool::{ShapeDrag, ShapeOutcome};
pub use stroke::{CaptureOptions, HighlightDrag, StrokeCapture};
pub use text_edit::{TextEditOutcome, TextEditSession};
pub use text_layer::{TextDetectionError, TextDetector, TextItem, TextLayer};
pub use tool::{HighlightMode, Tool};
pub use write_coordinator::{AutosaveOutcome, Autosaver, PageWriter, WriteGate};
