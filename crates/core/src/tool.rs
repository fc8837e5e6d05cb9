//! Annotation tools

use crate::annotation::{DragShape, StampKind, StrokeTool};
use serde::{Deserialize, Serialize};

/// How the highlight tool picks its rectangle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HighlightMode {
    /// One click highlights the detected text token under the pointer
    #[default]
    Auto,
    /// The rectangle is dragged out by hand
    Manual,
}

/// The active tool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Tool {
    Select,
    #[default]
    Pen,
    Eraser,
    Highlight(HighlightMode),
    Shape(DragShape),
    Stamp(StampKind),
    Text,
}

impl Tool {
    /// Stroke kind produced by free-hand capture with this tool
    pub fn stroke_tool(&self) -> Option<StrokeTool> {
        match self {
            Tool::Pen => Some(StrokeTool::Pen),
            Tool::Eraser => Some(StrokeTool::Eraser),
            Tool::Highlight(_) => Some(StrokeTool::Highlight),
            Tool::Select | Tool::Shape(_) | Tool::Stamp(_) | Tool::Text => None,
        }
    }

    pub fn is_select(&self) -> bool {
        matches!(self, Tool::Select)
    }

    /// Human-readable tool name for logs and toolbars
    pub fn name(&self) -> &'static str {
        match self {
            Tool::Select => "select",
            Tool::Pen => "pen",
            Tool::Eraser => "eraser",
            Tool::Highlight(HighlightMode::Auto) => "highlight",
            Tool::Highlight(HighlightMode::Manual) => "highlight (manual)",
            Tool::Shape(DragShape::Line) => "line",
            Tool::Shape(DragShape::Rectangle) => "rectangle",
            Tool::Shape(DragShape::Circle) => "circle",
            Tool::Shape(DragShape::Arrow) => "arrow",
            Tool::Stamp(_) => "stamp",
            Tool::Text => "text",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stroke_tool_mapping() {
        assert_eq!(Tool::Pen.stroke_tool(), Some(StrokeTool::Pen));
        assert_eq!(Tool::Eraser.stroke_tool(), Some(StrokeTool::Eraser));
        assert_eq!(Tool::Highlight(HighlightMode::Manual).stroke_tool(), Some(StrokeTool::Highlight));
        assert_eq!(Tool::Shape(DragShape::Circle).stroke_tool(), None);
        assert_eq!(Tool::default(), Tool::Pen);
    }
}
