//! Prompt definitions sent to the hosted model.
//!
//! Each prompt pairs its instruction text with the JSON schema the model is
//! asked to answer in. Schemas use the OpenAPI subset accepted by the
//! `generateContent` endpoint.

use serde_json::{json, Value};
use std::fmt::Write;
use vision_proto::LabelConfidence;

pub struct PromptDefinition {
    pub name: &'static str,
    pub instruction: &'static str,
    pub output_schema: fn() -> Value,
}

pub const CLASSIFY_UPLOADED_IMAGE: PromptDefinition = PromptDefinition {
    name: "classifyUploadedImagePrompt",
    instruction: "You are an AI vision model that classifies images and generates descriptions.
Analyze the image and provide a list of predicted labels with confidence scores.
For distinct, clearly identifiable objects in the image, also provide a 'boundingBox' object containing 'x', 'y', 'width', and 'height' normalized (0-1 range) coordinates for each. 'x' and 'y' should be the top-left corner. If an object cannot be clearly bounded or is not a distinct object (e.g., \"sky\", \"outdoor scene\"), omit the boundingBox for that label.
Then, generate a natural language description of the image based on the predicted labels. Choose the most appropriate level of detail for the description.",
    output_schema: classification_schema,
};

pub const GENERATE_IMAGE_DESCRIPTION: PromptDefinition = PromptDefinition {
    name: "generateImageDescriptionPrompt",
    instruction: "You are an AI expert in describing images based on labels and confidence scores.

Generate a concise natural language description of the image based on the provided labels and their confidence scores.
Choose the most appropriate level of detail for the description.",
    output_schema: description_schema,
};

fn bounding_box_schema() -> Value {
    json!({
        "type": "OBJECT",
        "description": "The bounding box of the detected label on the image. Coordinates are normalized (0-1), origin at top-left. Provided for distinct objects.",
        "properties": {
            "x": { "type": "NUMBER", "description": "Normalized X coordinate of the top-left corner of the bounding box (0-1)." },
            "y": { "type": "NUMBER", "description": "Normalized Y coordinate of the top-left corner of the bounding box (0-1)." },
            "width": { "type": "NUMBER", "description": "Normalized width of the bounding box (0-1)." },
            "height": { "type": "NUMBER", "description": "Normalized height of the bounding box (0-1)." }
        },
        "required": ["x", "y", "width", "height"]
    })
}

pub fn classification_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "labels": {
                "type": "ARRAY",
                "description": "A list of predicted labels, their confidence scores, and optional bounding boxes.",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "label": { "type": "STRING", "description": "The predicted label for the image." },
                        "confidence": { "type": "NUMBER", "description": "The confidence score for the predicted label (0-1)." },
                        "boundingBox": bounding_box_schema()
                    },
                    "required": ["label", "confidence"]
                }
            },
            "description": {
                "type": "STRING",
                "description": "A natural language description of the image based on the predicted labels."
            }
        },
        "required": ["labels", "description"]
    })
}

pub fn description_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "description": { "type": "STRING", "description": "A natural language description of the image." }
        },
        "required": ["description"]
    })
}

/// Instruction text followed by the bullet list of labels.
pub fn render_description_prompt(labels: &[LabelConfidence]) -> String {
    let mut prompt = String::from(GENERATE_IMAGE_DESCRIPTION.instruction);
    prompt.push_str("\n\nLabels:\n");
    for label in labels {
        let _ = writeln!(
            prompt,
            "- {} (Confidence: {})",
            label.label, label.confidence
        );
    }
    prompt
}
