//! Text entry sessions
//!
//! A session edits a draft copy of a text annotation. Nothing touches the
//! working set until the session is confirmed; cancelling just drops it.

use crate::annotation::{Color, PageAnnotationSet, TextAnnotation, TextId};
use crate::geometry::NormalizedPoint;

/// What confirming a session did to the working set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEditOutcome {
    /// A new text was appended
    Created(TextId),
    /// An existing text was changed in place
    Updated(TextId),
    /// An existing text was confirmed empty and removed
    Removed(TextId),
    /// An existing text was confirmed without changes
    Unchanged,
    /// A new entry was confirmed empty, or its target no longer exists
    Discarded,
}

impl TextEditOutcome {
    /// Whether the working set changed, making this a commit point
    pub fn is_commit(&self) -> bool {
        matches!(
            self,
            TextEditOutcome::Created(_) | TextEditOutcome::Updated(_) | TextEditOutcome::Removed(_)
        )
    }
}

/// An open text entry
#[derive(Debug, Clone, PartialEq)]
pub struct TextEditSession {
    draft: TextAnnotation,
    /// The committed text being edited, `None` for a new entry
    original: Option<TextAnnotation>,
}

impl TextEditSession {
    /// Start a new, empty entry anchored at `anchor`
    pub fn open_new(anchor: NormalizedPoint, font_size: f64, color: Color) -> Self {
        Self {
            draft: TextAnnotation::new(anchor.clamped(), String::new(), font_size, color),
            original: None,
        }
    }

    /// Re-open a committed text for editing
    pub fn open_existing(text: &TextAnnotation) -> Self {
        Self {
            draft: text.clone(),
            original: Some(text.clone()),
        }
    }

    /// Current draft, drawn as an overlay while the session is open
    pub fn draft(&self) -> &TextAnnotation {
        &self.draft
    }

    pub fn is_new(&self) -> bool {
        self.original.is_none()
    }

    pub fn text_id(&self) -> TextId {
        self.draft.id
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.draft.text = text.into();
    }

    pub fn set_font_size(&mut self, font_size: f64) {
        if font_size > 0.0 {
            self.draft.font_size = font_size;
        }
    }

    pub fn set_color(&mut self, color: Color) {
        self.draft.color = color;
    }

    /// Normalized wrap width, `None` for no wrapping
    pub fn set_width_hint(&mut self, width: Option<f64>) {
        self.draft.width = width.filter(|w| *w > 0.0).map(|w| w.min(1.0));
    }

    /// Apply the draft to `set`
    ///
    /// Whitespace-only content counts as empty.
    pub fn confirm(self, set: &mut PageAnnotationSet) -> TextEditOutcome {
        let empty = self.draft.text.trim().is_empty();
        let id = self.draft.id;

        let Some(original) = self.original else {
            if empty {
                return TextEditOutcome::Discarded;
            }
            set.texts.push(self.draft);
            return TextEditOutcome::Created(id);
        };

        if original == self.draft {
            return TextEditOutcome::Unchanged;
        }

        if empty {
            let before = set.texts.len();
            set.texts.retain(|text| text.id != id);
            return if set.texts.len() != before {
                TextEditOutcome::Removed(id)
            } else {
                TextEditOutcome::Discarded
            };
        }

        match set.text_mut(id) {
            Some(text) => {
                *text = self.draft;
                TextEditOutcome::Updated(id)
            }
            None => TextEditOutcome::Discarded,
        }
    }
}
