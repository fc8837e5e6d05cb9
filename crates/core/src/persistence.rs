//! Per-page annotation persistence
//!
//! Annotations are stored as three independent collections per page
//! (strokes, shapes, texts) in an external key-value store keyed by document
//! and stored page number. Each collection is written whole as a versioned
//! JSON envelope; there is no partial update.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::io;
use std::sync::{Arc, Mutex, PoisonError};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::annotation::{PageAnnotationSet, Shape, Stroke, TextAnnotation};

/// Schema version written into every collection envelope
pub const SCHEMA_VERSION: u32 = 1;

/// Error types for store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("store backend error: {0}")]
    Backend(String),
    #[error("{key} was written by a newer schema (version {version})")]
    UnsupportedVersion { key: StoreKey, version: u32 },
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Stable identifier of a document in the store
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stored page identifier (1-based), as opposed to a display position
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StoredPage(pub u32);

impl fmt::Display for StoredPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The three per-page collections
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnotationKind {
    Strokes,
    Shapes,
    Texts,
}

impl AnnotationKind {
    pub const ALL: [AnnotationKind; 3] = [AnnotationKind::Strokes, AnnotationKind::Shapes, AnnotationKind::Texts];

    pub fn as_str(&self) -> &'static str {
        match self {
            AnnotationKind::Strokes => "strokes",
            AnnotationKind::Shapes => "shapes",
            AnnotationKind::Texts => "texts",
        }
    }
}

/// Key of one collection in the store
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StoreKey {
    pub kind: AnnotationKind,
    pub document: DocumentId,
    pub page: StoredPage,
}

impl StoreKey {
    pub fn new(kind: AnnotationKind, document: DocumentId, page: StoredPage) -> Self {
        Self { kind, document, page }
    }
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.document, self.page, self.kind.as_str())
    }
}

/// Physical persistence engine
///
/// Each call is atomic on its own; nothing spans calls.
pub trait KeyValueStore: Send + Sync {
    /// Bytes stored under `key`, `None` when absent
    fn read(&self, key: &StoreKey) -> StoreResult<Option<Vec<u8>>>;

    /// Replace whatever is stored under `key`
    fn write(&self, key: &StoreKey, bytes: &[u8]) -> StoreResult<()>;

    /// Remove `key`; deleting an absent key succeeds
    fn delete(&self, key: &StoreKey) -> StoreResult<()>;
}

/// In-memory store, used in tests and as a scratch backend
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<StoreKey, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: &StoreKey) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }
}

impl KeyValueStore for MemoryStore {
    fn read(&self, key: &StoreKey) -> StoreResult<Option<Vec<u8>>> {
        Ok(self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned())
    }

    fn write(&self, key: &StoreKey, bytes: &[u8]) -> StoreResult<()> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.clone(), bytes.to_vec());
        Ok(())
    }

    fn delete(&self, key: &StoreKey) -> StoreResult<()> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
    }
}

/// An annotation type stored as one whole collection per page
pub trait PageCollection: Serialize + DeserializeOwned {
    const KIND: AnnotationKind;
}

impl PageCollection for Stroke {
    const KIND: AnnotationKind = AnnotationKind::Strokes;
}

impl PageCollection for Shape {
    const KIND: AnnotationKind = AnnotationKind::Shapes;
}

impl PageCollection for TextAnnotation {
    const KIND: AnnotationKind = AnnotationKind::Texts;
}

#[derive(Serialize)]
struct EnvelopeRef<'a, T> {
    version: u32,
    items: &'a [T],
}

#[derive(Deserialize)]
struct Envelope<T> {
    version: u32,
    items: Vec<T>,
}

/// Typed access to the per-page collections of a store
#[derive(Clone)]
pub struct AnnotationRepository {
    store: Arc<dyn KeyValueStore>,
}

impl fmt::Debug for AnnotationRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnnotationRepository").finish_non_exhaustive()
    }
}

impl AnnotationRepository {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    /// Replace the stored collection of `T` for a page
    pub fn save<T: PageCollection>(&self, document: &DocumentId, page: StoredPage, items: &[T]) -> StoreResult<()> {
        let key = StoreKey::new(T::KIND, document.clone(), page);
        let bytes = serde_json::to_vec(&EnvelopeRef {
            version: SCHEMA_VERSION,
            items,
        })?;
        self.store.write(&key, &bytes)
    }

    /// Load the collection of `T` for a page; a missing key is an empty collection
    pub fn load<T: PageCollection>(&self, document: &DocumentId, page: StoredPage) -> StoreResult<Vec<T>> {
        let key = StoreKey::new(T::KIND, document.clone(), page);
        let Some(bytes) = self.store.read(&key)? else {
            return Ok(Vec::new());
        };

        let envelope: Envelope<T> = serde_json::from_slice(&bytes)?;
        if envelope.version > SCHEMA_VERSION {
            return Err(StoreError::UnsupportedVersion {
                key,
                version: envelope.version,
            });
        }
        Ok(envelope.items)
    }

    pub fn delete<T: PageCollection>(&self, document: &DocumentId, page: StoredPage) -> StoreResult<()> {
        self.store.delete(&StoreKey::new(T::KIND, document.clone(), page))
    }

    /// Every non-empty collection of `T` for pages `1..=page_count`
    pub fn load_all<T: PageCollection>(
        &self,
        document: &DocumentId,
        page_count: u32,
    ) -> StoreResult<BTreeMap<StoredPage, Vec<T>>> {
        let mut pages = BTreeMap::new();
        for page in (1..=page_count).map(StoredPage) {
            let items = self.load::<T>(document, page)?;
            if !items.is_empty() {
                pages.insert(page, items);
            }
        }
        Ok(pages)
    }

    /// Read all three collections of a page
    ///
    /// Each collection loads independently: one that fails to read comes
    /// back empty and its error is returned alongside.
    pub fn load_page(&self, document: &DocumentId, page: StoredPage) -> (PageAnnotationSet, Vec<StoreError>) {
        let mut errors = Vec::new();
        let mut set = PageAnnotationSet::new();

        match self.load::<Stroke>(document, page) {
            Ok(strokes) => set.strokes = strokes,
            Err(err) => errors.push(err),
        }
        match self.load::<Shape>(document, page) {
            Ok(shapes) => set.shapes = shapes,
            Err(err) => errors.push(err),
        }
        match self.load::<TextAnnotation>(document, page) {
            Ok(texts) => set.texts = texts,
            Err(err) => errors.push(err),
        }

        (set, errors)
    }

    /// Write all three collections of a page
    ///
    /// Every write is attempted; the first failure is returned.
    pub fn save_page(&self, document: &DocumentId, page: StoredPage, set: &PageAnnotationSet) -> StoreResult<()> {
        let strokes = self.save(document, page, &set.strokes);
        let shapes = self.save(document, page, &set.shapes);
        let texts = self.save(document, page, &set.texts);
        strokes.and(shapes).and(texts)
    }

    /// Remove all three collections of a page
    pub fn delete_page(&self, document: &DocumentId, page: StoredPage) -> StoreResult<()> {
        let strokes = self.delete::<Stroke>(document, page);
        let shapes = self.delete::<Shape>(document, page);
        let texts = self.delete::<TextAnnotation>(document, page);
        strokes.and(shapes).and(texts)
    }
}
