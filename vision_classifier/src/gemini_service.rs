use crate::{
    config::{ModelConfig, SafetySetting},
    data_uri::DataUri,
    model_service::{ModelService, ModelServiceError},
    prompts::{
        render_description_prompt, PromptDefinition, CLASSIFY_UPLOADED_IMAGE,
        GENERATE_IMAGE_DESCRIPTION,
    },
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{sync::Arc, time::Instant};
use tonic::{async_trait, Status};
use tracing::instrument;
use vision_proto::{
    BoundingBox, ClassificationRequest, ClassificationResult, DescriptionRequest,
    DescriptionResponse, LabelPrediction,
};

const JSON_MIME_TYPE: &str = "application/json";
const SAFETY_FINISH_REASON: &str = "SAFETY";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    safety_settings: &'a [SafetySetting],
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
enum Part<'a> {
    Text(&'a str),
    InlineData(InlineData<'a>),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData<'a> {
    mime_type: &'a str,
    data: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
    response_schema: Value,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Deserialize)]
struct ClassificationOutput {
    labels: Vec<LabelOutput>,
    description: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LabelOutput {
    label: String,
    confidence: f64,
    #[serde(default)]
    bounding_box: Option<BoundingBoxOutput>,
}

#[derive(Deserialize)]
struct BoundingBoxOutput {
    x: f64,
    y: f64,
    width: f64,
    height: f64,
}

#[derive(Deserialize)]
struct DescriptionOutput {
    description: String,
}

#[derive(Clone)]
pub struct GeminiModelService {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    safety_settings: Arc<Vec<SafetySetting>>,
}

impl GeminiModelService {
    pub fn new(model_config: &ModelConfig, safety_settings: Vec<SafetySetting>) -> Self {
        tracing::info!(
            "Using model {} with {} safety settings",
            model_config.model_name,
            safety_settings.len()
        );

        Self {
            client: reqwest::Client::new(),
            endpoint: model_config.get_endpoint(),
            api_key: model_config.api_key.clone(),
            safety_settings: Arc::new(safety_settings),
        }
    }

    async fn generate(
        &self,
        prompt: &PromptDefinition,
        parts: Vec<Part<'_>>,
    ) -> Result<String, ModelServiceError> {
        let body = GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts,
            }],
            generation_config: GenerationConfig {
                response_mime_type: JSON_MIME_TYPE,
                response_schema: (prompt.output_schema)(),
            },
            safety_settings: &self.safety_settings,
        };

        let started = Instant::now();
        let response = self
            .client
            .post(&self.endpoint)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        tracing::debug!(
            "Model answered {} to {} in {} ms",
            status,
            prompt.name,
            started.elapsed().as_millis()
        );

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ModelServiceError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let payload: GenerateContentResponse = response.json().await?;
        extract_text(payload)
    }
}

#[async_trait]
impl ModelService for GeminiModelService {
    #[instrument(skip(self, request))]
    async fn classify(
        &self,
        request: ClassificationRequest,
    ) -> Result<ClassificationResult, Status> {
        let image = DataUri::parse(&request.photo_data_uri).map_err(ModelServiceError::from)?;
        tracing::debug!(
            "Classifying {} image ({} base64 chars)",
            image.mime_type,
            image.data.len()
        );

        let parts = vec![
            Part::Text(CLASSIFY_UPLOADED_IMAGE.instruction),
            Part::InlineData(InlineData {
                mime_type: image.mime_type,
                data: image.data,
            }),
        ];

        let text = self
            .generate(&CLASSIFY_UPLOADED_IMAGE, parts)
            .await?;

        Ok(parse_classification(&text)?)
    }

    #[instrument(skip(self, request))]
    async fn describe(&self, request: DescriptionRequest) -> Result<DescriptionResponse, Status> {
        let prompt = render_description_prompt(&request.labels);
        let parts = vec![Part::Text(&prompt)];

        let text = self
            .generate(&GENERATE_IMAGE_DESCRIPTION, parts)
            .await?;

        let output: DescriptionOutput =
            serde_json::from_str(&text).map_err(ModelServiceError::from)?;

        Ok(DescriptionResponse {
            description: output.description,
        })
    }
}

fn extract_text(response: GenerateContentResponse) -> Result<String, ModelServiceError> {
    if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(ModelServiceError::Blocked(reason));
    }

    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or(ModelServiceError::EmptyOutput)?;

    let text: String = candidate
        .content
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect()
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        return match candidate.finish_reason.as_deref() {
            Some(SAFETY_FINISH_REASON) => {
                Err(ModelServiceError::Blocked(SAFETY_FINISH_REASON.to_string()))
            }
            _ => Err(ModelServiceError::EmptyOutput),
        };
    }

    Ok(text)
}

fn check_unit(field: &str, value: f64) -> Result<f64, ModelServiceError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(ModelServiceError::Schema(format!(
            "{} must be within [0, 1], got {}",
            field, value
        )))
    }
}

fn parse_classification(text: &str) -> Result<ClassificationResult, ModelServiceError> {
    let output: ClassificationOutput = serde_json::from_str(text)?;

    let labels = output
        .labels
        .into_iter()
        .map(|label| -> Result<LabelPrediction, ModelServiceError> {
            let bounding_box = label
                .bounding_box
                .map(|b| {
                    Ok::<_, ModelServiceError>(BoundingBox {
                        x: check_unit("boundingBox.x", b.x)?,
                        y: check_unit("boundingBox.y", b.y)?,
                        width: check_unit("boundingBox.width", b.width)?,
                        height: check_unit("boundingBox.height", b.height)?,
                    })
                })
                .transpose()?;

            Ok(LabelPrediction {
                confidence: check_unit("confidence", label.confidence)?,
                label: label.label,
                bounding_box,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ClassificationResult {
        labels,
        description: output.description,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tonic::Code;

    fn response(json: &str) -> GenerateContentResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_request_body_shape() {
        let safety = vec![SafetySetting {
            category: "HARM_CATEGORY_HARASSMENT".to_string(),
            threshold: "BLOCK_MEDIUM_AND_ABOVE".to_string(),
        }];
        let body = GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![
                    Part::Text("describe"),
                    Part::InlineData(InlineData {
                        mime_type: "image/png",
                        data: "AAAA",
                    }),
                ],
            }],
            generation_config: GenerationConfig {
                response_mime_type: JSON_MIME_TYPE,
                response_schema: serde_json::json!({ "type": "OBJECT" }),
            },
            safety_settings: &safety,
        };

        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["contents"][0]["parts"][0]["text"], "describe");
        assert_eq!(
            value["contents"][0]["parts"][1]["inlineData"]["mimeType"],
            "image/png"
        );
        assert_eq!(
            value["generationConfig"]["responseMimeType"],
            "application/json"
        );
        assert_eq!(
            value["safetySettings"][0]["threshold"],
            "BLOCK_MEDIUM_AND_ABOVE"
        );
    }

    #[test]
    fn test_extract_text_joins_parts() {
        let payload = response(
            r#"{"candidates":[{"content":{"parts":[{"text":"{\"a\":"},{"text":"1}"}]},"finishReason":"STOP"}]}"#,
        );
        assert_eq!(extract_text(payload).unwrap(), "{\"a\":1}");
    }

    #[test]
    fn test_extract_text_errors() {
        let blocked = response(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#);
        assert!(matches!(
            extract_text(blocked),
            Err(ModelServiceError::Blocked(_))
        ));

        let empty = response(r#"{"candidates":[]}"#);
        assert!(matches!(
            extract_text(empty),
            Err(ModelServiceError::EmptyOutput)
        ));

        let filtered = response(r#"{"candidates":[{"finishReason":"SAFETY"}]}"#);
        assert!(matches!(
            extract_text(filtered),
            Err(ModelServiceError::Blocked(_))
        ));
    }

    #[test]
    fn test_parse_red_square() {
        let result = parse_classification(
            r#"{"labels":[{"label":"red square","confidence":0.98,"boundingBox":{"x":0,"y":0,"width":1,"height":1}}],"description":"A red square."}"#,
        )
        .unwrap();

        assert_eq!(result.labels.len(), 1);
        assert_eq!(result.labels[0].label, "red square");
        let bbox = result.labels[0].bounding_box.as_ref().unwrap();
        assert_eq!((bbox.width, bbox.height), (1.0, 1.0));
        assert_eq!(result.description, "A red square.");
    }

    #[test]
    fn test_parse_label_without_box() {
        let result =
            parse_classification(r#"{"labels":[{"label":"sky","confidence":0.7}],"description":""}"#)
                .unwrap();
        assert!(result.labels[0].bounding_box.is_none());
    }

    #[test]
    fn test_parse_rejects_partial_box() {
        let err = parse_classification(
            r#"{"labels":[{"label":"dog","confidence":0.7,"boundingBox":{"x":0.1,"y":0.1,"width":0.2}}],"description":"A dog."}"#,
        );
        assert!(matches!(err, Err(ModelServiceError::Schema(_))));
    }

    #[test]
    fn test_parse_rejects_out_of_range_confidence() {
        let err = parse_classification(
            r#"{"labels":[{"label":"dog","confidence":87}],"description":"A dog."}"#,
        );
        assert!(matches!(err, Err(ModelServiceError::Schema(_))));
    }

    #[test]
    fn test_parse_rejects_missing_description() {
        let err = parse_classification(r#"{"labels":[]}"#);
        assert!(matches!(err, Err(ModelServiceError::Schema(_))));
    }

    #[tokio::test]
    async fn test_invalid_data_uri_is_rejected_before_any_request() {
        let service = GeminiModelService::new(
            &ModelConfig {
                api_base: "http://127.0.0.1:9".to_string(),
                model_name: "unused".to_string(),
                api_key: "unused".to_string(),
            },
            Vec::new(),
        );

        let status = service
            .classify(ClassificationRequest {
                photo_data_uri: "not a data uri".to_string(),
            })
            .await
            .unwrap_err();

        assert_eq!(status.code(), Code::InvalidArgument);
    }
}
