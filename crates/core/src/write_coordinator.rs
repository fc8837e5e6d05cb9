//! Write coordination between commit points and the autosave timer
//!
//! Commit points write the active page synchronously. A background thread
//! rewrites the same page on a fixed interval. Both go through a shared
//! [`WriteGate`]: commits wait for it, autosave ticks skip when it is held, so
//! two writes for the same page never interleave and ticks never queue up.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};
use std::thread;
use std::time::{Duration, Instant};

use crate::annotation::PageAnnotationSet;
use crate::persistence::{AnnotationRepository, DocumentId, StoreError, StoreResult, StoredPage};

/// Longest the autosave thread sleeps before re-checking its stop flag
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Mutual exclusion for store writes
#[derive(Debug, Default)]
pub struct WriteGate {
    lock: Mutex<()>,
}

impl WriteGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until no other write is in flight
    pub fn acquire(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Take the gate only if it is free
    pub fn try_acquire(&self) -> Option<MutexGuard<'_, ()>> {
        match self.lock.try_lock() {
            Ok(guard) => Some(guard),
            Err(TryLockError::Poisoned(poisoned)) => Some(poisoned.into_inner()),
            Err(TryLockError::WouldBlock) => None,
        }
    }

    pub fn is_in_flight(&self) -> bool {
        matches!(self.lock.try_lock(), Err(TryLockError::WouldBlock))
    }
}

/// The last committed state of the active page
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedPage {
    pub document: DocumentId,
    pub page: StoredPage,
    pub set: PageAnnotationSet,
}

/// Result of one autosave tick
#[derive(Debug)]
pub enum AutosaveOutcome {
    /// The published page was written
    Written,
    /// Another write held the gate; nothing was queued
    SkippedInFlight,
    /// No page is published
    Idle,
    Failed(StoreError),
}

/// Writes pages through the gate and tracks the published snapshot
#[derive(Debug, Clone)]
pub struct PageWriter {
    repo: AnnotationRepository,
    gate: Arc<WriteGate>,
    published: Arc<Mutex<Option<PublishedPage>>>,
}

impl PageWriter {
    pub fn new(repo: AnnotationRepository) -> Self {
        Self {
            repo,
            gate: Arc::new(WriteGate::new()),
            published: Arc::new(Mutex::new(None)),
        }
    }

    pub fn repository(&self) -> &AnnotationRepository {
        &self.repo
    }

    pub fn gate(&self) -> &Arc<WriteGate> {
        &self.gate
    }

    /// Record `set` as the page's committed state without writing it
    pub fn publish(&self, document: &DocumentId, page: StoredPage, set: &PageAnnotationSet) {
        let _guard = self.gate.acquire();
        self.store_snapshot(document, page, set);
    }

    /// Stop autosaving until the next publish
    pub fn unpublish(&self) {
        let _guard = self.gate.acquire();
        *self.published.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn published(&self) -> Option<PublishedPage> {
        self.published
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Publish and write a committed page, waiting for any write in flight
    pub fn persist(&self, document: &DocumentId, page: StoredPage, set: &PageAnnotationSet) -> StoreResult<()> {
        let _guard = self.gate.acquire();
        self.store_snapshot(document, page, set);
        self.repo.save_page(document, page, set)
    }

    /// Write the published page, waiting for any write in flight
    ///
    /// Returns `Ok(false)` when nothing is published.
    pub fn flush(&self) -> StoreResult<bool> {
        let _guard = self.gate.acquire();
        self.write_published()
    }

    /// Write the published page unless a write is already in flight
    pub fn autosave_tick(&self) -> AutosaveOutcome {
        let Some(_guard) = self.gate.try_acquire() else {
            tracing::debug!("autosave skipped, write in flight");
            return AutosaveOutcome::SkippedInFlight;
        };

        match self.write_published() {
            Ok(true) => AutosaveOutcome::Written,
            Ok(false) => AutosaveOutcome::Idle,
            Err(err) => {
                tracing::warn!(error = %err, "autosave failed");
                AutosaveOutcome::Failed(err)
            }
        }
    }

    fn store_snapshot(&self, document: &DocumentId, page: StoredPage, set: &PageAnnotationSet) {
        *self.published.lock().unwrap_or_else(PoisonError::into_inner) = Some(PublishedPage {
            document: document.clone(),
            page,
            set: set.clone(),
        });
    }

    /// Caller holds the gate
    fn write_published(&self) -> StoreResult<bool> {
        let Some(published) = self.published() else {
            return Ok(false);
        };
        self.repo
            .save_page(&published.document, published.page, &published.set)?;
        tracing::debug!(document = %published.document, page = %published.page, "page written");
        Ok(true)
    }
}

/// Background thread that rewrites the published page on an interval
pub struct Autosaver {
    writer: PageWriter,
    interval: Duration,
    should_stop: Arc<AtomicBool>,
    thread_handle: Option<thread::JoinHandle<()>>,
}

impl std::fmt::Debug for Autosaver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Autosaver")
            .field("interval", &self.interval)
            .field("running", &self.thread_handle.is_some())
            .finish()
    }
}

impl Autosaver {
    /// Start the timer thread
    pub fn spawn(writer: PageWriter, interval: Duration) -> Self {
        let should_stop = Arc::new(AtomicBool::new(false));
        let thread_handle = Self::spawn_background_thread(writer.clone(), interval, Arc::clone(&should_stop));

        Self {
            writer,
            interval,
            should_stop,
            thread_handle: Some(thread_handle),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run one tick on the calling thread
    pub fn tick_now(&self) -> AutosaveOutcome {
        self.writer.autosave_tick()
    }

    /// Write the published page now, waiting for any write in flight
    pub fn flush(&self) -> StoreResult<bool> {
        self.writer.flush()
    }

    /// Stop the timer thread and wait for it to exit
    pub fn stop(&mut self) {
        self.should_stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            if handle.join().is_err() {
                tracing::warn!("autosave thread panicked");
            }
        }
    }

    fn spawn_background_thread(
        writer: PageWriter,
        interval: Duration,
        should_stop: Arc<AtomicBool>,
    ) -> thread::JoinHandle<()> {
        thread::spawn(move || {
            let poll = interval.min(POLL_INTERVAL);
            let mut last_tick = Instant::now();

            while !should_stop.load(Ordering::SeqCst) {
                thread::sleep(poll);
                if last_tick.elapsed() >= interval && !should_stop.load(Ordering::SeqCst) {
                    writer.autosave_tick();
                    last_tick = Instant::now();
                }
            }
        })
    }
}

impl Drop for Autosaver {
    fn drop(&mut self) {
        self.stop();

        // Final flush so nothing committed is lost on close
        if let Err(err) = self.writer.flush() {
            tracing::warn!(error = %err, "final autosave flush failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::{Color, Stroke, StrokeTool};
    use crate::geometry::NormalizedPoint;
    use crate::persistence::{AnnotationKind, KeyValueStore, MemoryStore, StoreKey};

    fn setup() -> (Arc<MemoryStore>, PageWriter) {
        let store = Arc::new(MemoryStore::new());
        let writer = PageWriter::new(AnnotationRepository::new(store.clone()));
        (store, writer)
    }

    fn one_stroke() -> PageAnnotationSet {
        let mut set = PageAnnotationSet::new();
        set.strokes.push(Stroke::new(StrokeTool::Pen, Color::BLACK, 2.0, NormalizedPoint::new(0.5, 0.5)));
        set
    }

    fn doc() -> DocumentId {
        DocumentId::new("doc")
    }

    #[test]
    fn test_gate_try_acquire() {
        let gate = WriteGate::new();
        assert!(!gate.is_in_flight());
        let guard = gate.acquire();
        assert!(gate.is_in_flight());
        assert!(gate.try_acquire().is_none());
        drop(guard);
        assert!(gate.try_acquire().is_some());
    }

    #[test]
    fn test_tick_skips_while_write_in_flight() {
        let (store, writer) = setup();
        writer.publish(&doc(), StoredPage(1), &one_stroke());

        let guard = writer.gate().acquire();
        assert!(matches!(writer.autosave_tick(), AutosaveOutcome::SkippedInFlight));
        assert!(store.is_empty());
        drop(guard);

        assert!(matches!(writer.autosave_tick(), AutosaveOutcome::Written));
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_tick_without_published_page_is_idle() {
        let (_store, writer) = setup();
        assert!(matches!(writer.autosave_tick(), AutosaveOutcome::Idle));
        assert!(!writer.flush().unwrap());
    }

    #[test]
    fn test_persist_publishes_and_writes() {
        let (store, writer) = setup();
        let set = one_stroke();
        writer.persist(&doc(), StoredPage(2), &set).unwrap();

        assert_eq!(writer.published().unwrap().set, set);
        let key = StoreKey::new(AnnotationKind::Strokes, doc(), StoredPage(2));
        assert!(store.read(&key).unwrap().is_some());

        writer.unpublish();
        assert!(writer.published().is_none());
    }

    #[test]
    fn test_autosaver_thread_writes_and_flushes_on_drop() {
        let (store, writer) = setup();
        writer.publish(&doc(), StoredPage(1), &one_stroke());

        let autosaver = Autosaver::spawn(writer.clone(), Duration::from_millis(10));
        let deadline = Instant::now() + Duration::from_secs(5);
        while store.is_empty() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(store.len(), 3);

        // A page published after the last tick is written by the final flush
        writer.publish(&doc(), StoredPage(2), &one_stroke());
        drop(autosaver);
        assert!(store.contains(&StoreKey::new(AnnotationKind::Texts, doc(), StoredPage(2))));
    }
}
