use crate::data_uri::DataUriError;
use thiserror::Error;
use tonic::{async_trait, Status};
use vision_proto::{
    ClassificationRequest, ClassificationResult, DescriptionRequest, DescriptionResponse,
};

#[async_trait]
pub trait ModelService: Send + Sync + Clone + 'static {
    async fn classify(&self, request: ClassificationRequest)
        -> Result<ClassificationResult, Status>;
    async fn describe(&self, request: DescriptionRequest) -> Result<DescriptionResponse, Status>;
}

#[derive(Error, Debug)]
pub enum ModelServiceError {
    #[error("Invalid image: {0}")]
    InvalidImage(#[from] DataUriError),
    #[error("Model request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Model API returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("Model blocked the request: {0}")]
    Blocked(String),
    #[error("Model returned no output")]
    EmptyOutput,
    #[error("Model output does not match schema: {0}")]
    Schema(String),
}

impl From<serde_json::Error> for ModelServiceError {
    fn from(err: serde_json::Error) -> Self {
        ModelServiceError::Schema(err.to_string())
    }
}

impl From<ModelServiceError> for Status {
    fn from(err: ModelServiceError) -> Self {
        match err {
            ModelServiceError::InvalidImage(_) => Status::invalid_argument(err.to_string()),
            ModelServiceError::Request(_) => Status::unavailable(err.to_string()),
            ModelServiceError::Api { status, .. } if status == 429 || status >= 500 => {
                Status::unavailable(err.to_string())
            }
            ModelServiceError::Blocked(_) => Status::failed_precondition(err.to_string()),
            _ => Status::internal(err.to_string()),
        }
    }
}
