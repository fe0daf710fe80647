//! Presentation of a classification result: the ranked label list and the
//! bounding-box overlays drawn on top of the rendered image.
//!
//! Overlay geometry depends on the size the image was actually rendered at,
//! not on its pixel dimensions, so the client asks for overlays once layout
//! is known and again whenever the rendered size changes.

use crate::{
    config::DisplayConfig,
    model::{BoundingBox, ClassificationResult, LabelPrediction},
};
use serde::{Deserialize, Serialize};

pub const NO_LABELS_PLACEHOLDER: &str = "No labels predicted or labels are not available.";
pub const NO_DESCRIPTION_PLACEHOLDER: &str = "No description generated.";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelRow {
    pub label: String,
    /// Confidence as a percentage with one decimal, e.g. `98.0%`.
    pub percent: String,
    /// Progress bar fill in [0, 100].
    pub bar: f64,
}

impl From<&LabelPrediction> for LabelRow {
    fn from(prediction: &LabelPrediction) -> Self {
        let percent = prediction.confidence * 100.0;
        Self {
            label: prediction.label.clone(),
            percent: format!("{:.1}%", percent),
            bar: percent.clamp(0.0, 100.0),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultsView {
    pub labels: Vec<LabelRow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels_placeholder: Option<&'static str>,
    pub description: String,
    pub has_description: bool,
}

impl ResultsView {
    pub fn new(result: &ClassificationResult, config: &DisplayConfig) -> Self {
        let labels = label_rows(result, config.max_listed_labels);
        let labels_placeholder = labels.is_empty().then_some(NO_LABELS_PLACEHOLDER);
        let has_description = has_readable_description(&result.description);

        Self {
            labels,
            labels_placeholder,
            description: if result.description.trim().is_empty() {
                NO_DESCRIPTION_PLACEHOLDER.to_string()
            } else {
                result.description.clone()
            },
            has_description,
        }
    }
}

pub fn label_rows(result: &ClassificationResult, max: usize) -> Vec<LabelRow> {
    result.labels.iter().take(max).map(LabelRow::from).collect()
}

/// False for blank text and for the placeholder shown in its place.
pub fn has_readable_description(description: &str) -> bool {
    let trimmed = description.trim();
    !trimmed.is_empty() && trimmed != NO_DESCRIPTION_PLACEHOLDER
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct RenderedSize {
    pub width: f64,
    pub height: f64,
}

impl RenderedSize {
    pub fn is_valid(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptionPlacement {
    Above,
    Below,
}

/// Captions sit above the box unless that would push them past the top edge.
pub fn caption_placement(box_top: f64, caption_height: f64) -> CaptionPlacement {
    if box_top - caption_height < 0.0 {
        CaptionPlacement::Below
    } else {
        CaptionPlacement::Above
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Overlay {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
    pub caption: String,
    pub caption_placement: CaptionPlacement,
    /// Caption anchor in pixels: its bottom edge when placed above, its top
    /// edge when placed below.
    pub caption_y: f64,
}

impl Overlay {
    fn new(
        prediction: &LabelPrediction,
        bbox: &BoundingBox,
        size: RenderedSize,
        config: &DisplayConfig,
    ) -> Self {
        let left = bbox.x * size.width;
        let top = bbox.y * size.height;
        let width = bbox.width * size.width;
        let height = bbox.height * size.height;

        let caption_placement = caption_placement(top, config.caption_height);
        let caption_y = match caption_placement {
            CaptionPlacement::Above => top - config.caption_gap,
            CaptionPlacement::Below => top + height + config.caption_gap,
        };

        Self {
            left,
            top,
            width,
            height,
            caption: format!(
                "{} ({}%)",
                prediction.label,
                (prediction.confidence * 100.0).round() as i64
            ),
            caption_placement,
            caption_y,
        }
    }
}

/// Overlays for the first `max_overlays` labels that carry a box.
pub fn overlays(
    result: &ClassificationResult,
    size: RenderedSize,
    config: &DisplayConfig,
) -> Vec<Overlay> {
    result
        .labels
        .iter()
        .filter_map(|prediction| {
            prediction
                .bounding_box
                .as_ref()
                .map(|bbox| (prediction, bbox))
        })
        .take(config.max_overlays)
        .map(|(prediction, bbox)| Overlay::new(prediction, bbox, size, config))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prediction(label: &str, confidence: f64, bbox: Option<(f64, f64, f64, f64)>) -> LabelPrediction {
        LabelPrediction {
            label: label.to_string(),
            confidence,
            bounding_box: bbox.map(|(x, y, width, height)| BoundingBox {
                x,
                y,
                width,
                height,
            }),
        }
    }

    fn red_square() -> ClassificationResult {
        ClassificationResult {
            labels: vec![prediction("red square", 0.98, Some((0.0, 0.0, 1.0, 1.0)))],
            description: "A red square.".to_string(),
        }
    }

    #[test]
    fn test_red_square_list() {
        let view = ResultsView::new(&red_square(), &DisplayConfig::default());

        assert_eq!(view.labels.len(), 1);
        assert_eq!(view.labels[0].label, "red square");
        assert_eq!(view.labels[0].percent, "98.0%");
        assert!((view.labels[0].bar - 98.0).abs() < 1e-9);
        assert_eq!(view.labels_placeholder, None);
        assert!(view.has_description);
    }

    #[test]
    fn test_red_square_overlay_flips_below() {
        let size = RenderedSize {
            width: 400.0,
            height: 300.0,
        };
        let overlays = overlays(&red_square(), size, &DisplayConfig::default());

        assert_eq!(overlays.len(), 1);
        let overlay = &overlays[0];
        assert_eq!(
            (overlay.left, overlay.top, overlay.width, overlay.height),
            (0.0, 0.0, 400.0, 300.0)
        );
        assert_eq!(overlay.caption, "red square (98%)");
        assert_eq!(overlay.caption_placement, CaptionPlacement::Below);
        assert_eq!(overlay.caption_y, 305.0);
    }

    #[test]
    fn test_empty_result_shows_placeholders() {
        let result = ClassificationResult {
            labels: vec![],
            description: String::new(),
        };
        let view = ResultsView::new(&result, &DisplayConfig::default());

        assert!(view.labels.is_empty());
        assert_eq!(view.labels_placeholder, Some(NO_LABELS_PLACEHOLDER));
        assert_eq!(view.description, NO_DESCRIPTION_PLACEHOLDER);
        assert!(!view.has_description);
    }

    #[test]
    fn test_list_is_truncated_in_model_order() {
        for n in 0..8 {
            let result = ClassificationResult {
                labels: (0..n)
                    .map(|i| prediction(&format!("label {}", i), 0.1 * i as f64, None))
                    .collect(),
                description: "many".to_string(),
            };

            let rows = label_rows(&result, 5);
            assert_eq!(rows.len(), n.min(5));
            for (i, row) in rows.iter().enumerate() {
                assert_eq!(row.label, format!("label {}", i));
            }
        }
    }

    #[test]
    fn test_overlay_count_only_counts_boxed_labels() {
        let size = RenderedSize {
            width: 100.0,
            height: 100.0,
        };
        let config = DisplayConfig::default();

        for boxed in [0usize, 3, 10, 14] {
            let mut labels = vec![prediction("scene", 0.9, None)];
            labels.extend(
                (0..boxed).map(|i| prediction(&format!("obj {}", i), 0.5, Some((0.1, 0.5, 0.2, 0.2)))),
            );
            labels.push(prediction("sky", 0.4, None));
            let result = ClassificationResult {
                labels,
                description: String::new(),
            };

            let drawn = overlays(&result, size, &config);
            assert_eq!(drawn.len(), boxed.min(config.max_overlays));
            if let Some(first) = drawn.first() {
                assert_eq!(first.caption, "obj 0 (50%)");
            }
        }
    }

    #[test]
    fn test_caption_placement_threshold() {
        assert_eq!(caption_placement(0.0, 20.0), CaptionPlacement::Below);
        assert_eq!(caption_placement(19.9, 20.0), CaptionPlacement::Below);
        assert_eq!(caption_placement(20.0, 20.0), CaptionPlacement::Above);
        assert_eq!(caption_placement(150.0, 20.0), CaptionPlacement::Above);
    }

    #[test]
    fn test_overlay_scales_to_rendered_size() {
        let result = ClassificationResult {
            labels: vec![prediction("cat", 0.876, Some((0.25, 0.5, 0.5, 0.25)))],
            description: String::new(),
        };
        let config = DisplayConfig::default();
        let small = overlays(&result, RenderedSize { width: 200.0, height: 100.0 }, &config);
        let large = overlays(&result, RenderedSize { width: 800.0, height: 400.0 }, &config);

        assert_eq!((small[0].left, small[0].top), (50.0, 50.0));
        assert_eq!(small[0].caption_placement, CaptionPlacement::Above);
        assert_eq!(small[0].caption_y, 45.0);
        assert_eq!((large[0].width, large[0].height), (400.0, 100.0));
        assert_eq!(large[0].caption, "cat (88%)");
    }

    #[test]
    fn test_placeholder_description_is_not_readable() {
        assert!(!has_readable_description("  "));
        assert!(!has_readable_description("No description generated."));
        assert!(has_readable_description("A cat."));
    }

    #[test]
    fn test_bar_is_clamped() {
        let row = LabelRow::from(&prediction("odd", 1.2, None));
        assert_eq!(row.bar, 100.0);
        assert_eq!(row.percent, "120.0%");
    }
}
