//! Detected text layer used for snapping and auto-highlighting
//!
//! The text-detection collaborator (native text extraction or OCR) reports
//! text items in pixel space at some zoom level. They are normalized on
//! arrival so the layer stays valid when the page is re-rendered at another
//! size. When no detector is available, or it fails, the session simply runs
//! without a text layer.

use crate::geometry::{NormalizedPoint, PageSize, PixelPoint, PixelRect};
use crate::persistence::StoredPage;

/// One detected text token in pixel space
#[derive(Debug, Clone, PartialEq)]
pub struct TextItem {
    pub text: String,
    /// Left edge in pixels
    pub x: f64,
    /// Top edge in pixels
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl TextItem {
    pub fn new(text: impl Into<String>, x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            text: text.into(),
            x,
            y,
            width,
            height,
        }
    }
}

/// Errors reported by a text-detection collaborator
#[derive(Debug, thiserror::Error)]
pub enum TextDetectionError {
    #[error("text detection is not available for page {0}")]
    Unavailable(u32),
    #[error("text detection failed: {0}")]
    Failed(String),
}

/// Text-detection collaborator
///
/// Given a page and zoom level, returns the text items on that page with pixel
/// positions at that zoom.
pub trait TextDetector: Send {
    fn detect(&self, page: StoredPage, zoom: f64) -> Result<Vec<TextItem>, TextDetectionError>;
}

/// Text token with a normalized bounding box
#[derive(Debug, Clone, PartialEq)]
struct NormalizedItem {
    min: NormalizedPoint,
    max: NormalizedPoint,
}

/// Text items of a single page plus their line centers
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TextLayer {
    items: Vec<NormalizedItem>,
    /// Vertical centers of detected lines, normalized and sorted
    lines: Vec<f64>,
}

impl TextLayer {
    /// Build a layer from items detected on a page of `source` pixel size
    ///
    /// Returns an empty layer when `source` is not a loaded page size.
    pub fn new(items: Vec<TextItem>, source: PageSize) -> Self {
        if !source.is_loaded() {
            return Self::default();
        }

        let items: Vec<NormalizedItem> = items
            .into_iter()
            .filter(|item| item.width > 0.0 && item.height > 0.0)
            .map(|item| NormalizedItem {
                min: NormalizedPoint::new(item.x / source.width, item.y / source.height),
                max: NormalizedPoint::new(
                    (item.x + item.width) / source.width,
                    (item.y + item.height) / source.height,
                ),
            })
            .collect();

        let lines = cluster_lines(&items);
        Self { items, lines }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Normalized centers of the detected text lines
    pub fn line_centers(&self) -> &[f64] {
        &self.lines
    }

    /// Y (normalized) of the nearest line center within `radius_px` of `y`
    pub fn nearest_line_y(&self, y: f64, page: PageSize, radius_px: f64) -> Option<f64> {
        if !page.is_loaded() {
            return None;
        }

        self.lines
            .iter()
            .map(|&line| (line, ((line - y) * page.height).abs()))
            .filter(|&(_, distance)| distance <= radius_px)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(line, _)| line)
    }

    /// Normalized corners of the text token under a pixel position
    pub fn item_at(&self, point: PixelPoint, page: PageSize) -> Option<(NormalizedPoint, NormalizedPoint)> {
        if !page.is_loaded() {
            return None;
        }

        self.items
            .iter()
            .find(|item| {
                PixelRect::from_corners(page.denormalize(item.min), page.denormalize(item.max))
                    .contains(&point)
            })
            .map(|item| (item.min, item.max))
    }
}

/// Group items whose vertical centers overlap into lines
fn cluster_lines(items: &[NormalizedItem]) -> Vec<f64> {
    let mut centers: Vec<(f64, f64)> = items
        .iter()
        .map(|item| ((item.min.y + item.max.y) / 2.0, item.max.y - item.min.y))
        .collect();
    centers.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut lines = Vec::new();
    let mut group_sum = 0.0;
    let mut group_count = 0usize;
    let mut group_last = f64::NEG_INFINITY;
    let mut group_tolerance = 0.0;

    for (center, height) in centers {
        if group_count > 0 && center - group_last > group_tolerance {
            lines.push(group_sum / group_count as f64);
            group_sum = 0.0;
            group_count = 0;
        }
        group_sum += center;
        group_count += 1;
        group_last = center;
        group_tolerance = height / 2.0;
    }

    if group_count > 0 {
        lines.push(group_sum / group_count as f64);
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_layer() -> TextLayer {
        // Two lines of text on a 1000x800 page
        TextLayer::new(
            vec![
                TextItem::new("Hello", 100.0, 90.0, 60.0, 20.0),
                TextItem::new("world", 170.0, 91.0, 60.0, 20.0),
                TextItem::new("Second", 100.0, 190.0, 80.0, 20.0),
            ],
            PageSize::new(1000.0, 800.0),
        )
    }

    #[test]
    fn test_lines_are_clustered() {
        let layer = sample_layer();
        assert_eq!(layer.len(), 3);
        assert_eq!(layer.line_centers().len(), 2);
        assert!((layer.line_centers()[0] * 800.0 - 100.5).abs() < 1e-9);
        assert!((layer.line_centers()[1] * 800.0 - 200.0).abs() < 1e-9);
    }

    #[test]
    fn test_nearest_line_within_radius() {
        let layer = sample_layer();
        let page = PageSize::new(1000.0, 800.0);

        let snapped = layer.nearest_line_y(190.0 / 800.0, page, 15.0).unwrap();
        assert!((snapped * 800.0 - 200.0).abs() < 1e-9);

        assert!(layer.nearest_line_y(150.0 / 800.0, page, 15.0).is_none());
    }

    #[test]
    fn test_item_at_follows_page_resize() {
        let layer = sample_layer();
        // Same page rendered at twice the size
        let page = PageSize::new(2000.0, 1600.0);
        let (min, max) = layer.item_at(PixelPoint::new(220.0, 200.0), page).unwrap();
        assert!((min.x - 0.1).abs() < 1e-9);
        assert!((max.x - 0.16).abs() < 1e-9);
        assert!(layer.item_at(PixelPoint::new(5.0, 5.0), page).is_none());
    }

    #[test]
    fn test_unloaded_source_gives_empty_layer() {
        let layer = TextLayer::new(vec![TextItem::new("x", 0.0, 0.0, 5.0, 5.0)], PageSize::default());
        assert!(layer.is_empty());
    }
}
