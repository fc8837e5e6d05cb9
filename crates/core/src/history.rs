//! Snapshot-based undo/redo for one page
//!
//! Every commit point pushes the working set as it was *before* the mutation.
//! Undo swaps the live set with the top of the undo stack, redo does the
//! reverse, so the stacks always hold whole-page snapshots covering strokes,
//! shapes and texts together.

use std::collections::VecDeque;

use crate::annotation::PageAnnotationSet;

/// Default maximum number of undo frames kept per page
pub const DEFAULT_HISTORY_LIMIT: usize = 200;

/// Frozen copy of a page's annotation set
///
/// Owned exclusively by the stack that holds it and never mutated after it is
/// pushed.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryFrame {
    set: PageAnnotationSet,
}

impl HistoryFrame {
    pub fn new(set: PageAnnotationSet) -> Self {
        Self { set }
    }

    pub fn as_set(&self) -> &PageAnnotationSet {
        &self.set
    }

    pub fn into_set(self) -> PageAnnotationSet {
        self.set
    }
}

/// Undo and redo stacks of the active page
#[derive(Debug, Clone)]
pub struct History {
    /// Most recent frame at the back
    undo: VecDeque<HistoryFrame>,
    /// Most recent frame at the back
    redo: Vec<HistoryFrame>,
    limit: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

impl History {
    /// Create empty stacks keeping at most `limit` undo frames
    pub fn new(limit: usize) -> Self {
        Self {
            undo: VecDeque::new(),
            redo: Vec::new(),
            limit: limit.max(1),
        }
    }

    /// Record a commit point given the set as it was before the mutation
    pub fn commit(&mut self, pre_mutation: PageAnnotationSet) {
        self.redo.clear();
        self.undo.push_back(HistoryFrame::new(pre_mutation));

        // Trim oldest frames past the limit
        while self.undo.len() > self.limit {
            self.undo.pop_front();
        }
    }

    /// Step back once
    ///
    /// Returns the set that should become live, or `None` when there is
    /// nothing to undo. `current` is saved for redo.
    pub fn undo(&mut self, current: &PageAnnotationSet) -> Option<PageAnnotationSet> {
        let frame = self.undo.pop_back()?;
        self.redo.push(HistoryFrame::new(current.clone()));
        Some(frame.into_set())
    }

    /// Step forward once, the mirror of [`History::undo`]
    pub fn redo(&mut self, current: &PageAnnotationSet) -> Option<PageAnnotationSet> {
        let frame = self.redo.pop()?;
        self.undo.push_back(HistoryFrame::new(current.clone()));
        Some(frame.into_set())
    }

    /// Drop both stacks, used when the active page changes
    pub fn reset(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }

    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo.len()
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}
