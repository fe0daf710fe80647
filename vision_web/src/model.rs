use serde::{Deserialize, Serialize};

/// Normalized to [0, 1], origin top-left.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelPrediction {
    pub label: String,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounding_box: Option<BoundingBox>,
}

/// Labels keep the model's order, which is treated as relevance order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub labels: Vec<LabelPrediction>,
    pub description: String,
}

impl From<vision_proto::BoundingBox> for BoundingBox {
    fn from(bbox: vision_proto::BoundingBox) -> Self {
        Self {
            x: bbox.x,
            y: bbox.y,
            width: bbox.width,
            height: bbox.height,
        }
    }
}

impl From<vision_proto::LabelPrediction> for LabelPrediction {
    fn from(prediction: vision_proto::LabelPrediction) -> Self {
        Self {
            label: prediction.label,
            confidence: prediction.confidence,
            bounding_box: prediction.bounding_box.map(BoundingBox::from),
        }
    }
}

impl From<vision_proto::ClassificationResult> for ClassificationResult {
    fn from(result: vision_proto::ClassificationResult) -> Self {
        Self {
            labels: result.labels.into_iter().map(LabelPrediction::from).collect(),
            description: result.description,
        }
    }
}

/// Transient user-facing message, the server side of a toast.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notice {
    pub title: String,
    pub description: String,
    pub variant: NoticeVariant,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeVariant {
    Default,
    Destructive,
}

impl Notice {
    pub fn info(title: &str, description: impl Into<String>) -> Self {
        Self {
            title: title.to_string(),
            description: description.into(),
            variant: NoticeVariant::Default,
        }
    }

    pub fn error(title: &str, description: impl Into<String>) -> Self {
        Self {
            title: title.to_string(),
            description: description.into(),
            variant: NoticeVariant::Destructive,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_proto_keeps_order_and_missing_boxes() {
        let proto = vision_proto::ClassificationResult {
            labels: vec![
                vision_proto::LabelPrediction {
                    label: "dog".to_string(),
                    confidence: 0.9,
                    bounding_box: Some(vision_proto::BoundingBox {
                        x: 0.1,
                        y: 0.2,
                        width: 0.3,
                        height: 0.4,
                    }),
                },
                vision_proto::LabelPrediction {
                    label: "grass".to_string(),
                    confidence: 0.6,
                    bounding_box: None,
                },
            ],
            description: "A dog on grass.".to_string(),
        };

        let result = ClassificationResult::from(proto);
        assert_eq!(result.labels[0].label, "dog");
        assert_eq!(result.labels[0].bounding_box.unwrap().height, 0.4);
        assert_eq!(result.labels[1].bounding_box, None);
    }

    #[test]
    fn test_json_uses_camel_case_and_omits_missing_box() {
        let label = LabelPrediction {
            label: "sky".to_string(),
            confidence: 0.5,
            bounding_box: None,
        };
        let json = serde_json::to_value(&label).unwrap();
        assert!(json.get("boundingBox").is_none());

        let parsed: LabelPrediction = serde_json::from_str(
            r#"{"label":"cat","confidence":0.9,"boundingBox":{"x":0,"y":0,"width":1,"height":1}}"#,
        )
        .unwrap();
        assert!(parsed.bounding_box.is_some());
    }
}
