use crate::model_service::ModelService;
use std::sync::Arc;
use tonic::{async_trait, Request, Response, Status};
use vision_proto::{
    vision_service_server::VisionService, ClassificationRequest, ClassificationResult,
    DescriptionRequest, DescriptionResponse,
};

#[derive(Debug, Clone)]
pub struct InferenceService<M: ModelService> {
    model_service: Arc<M>,
}

impl<M: ModelService> InferenceService<M> {
    pub fn new(model_service: M) -> Self {
        Self {
            model_service: Arc::new(model_service),
        }
    }
}

#[async_trait]
impl<M: ModelService> VisionService for InferenceService<M> {
    async fn classify(
        &self,
        request: Request<ClassificationRequest>,
    ) -> Result<Response<ClassificationResult>, Status> {
        let classification_request = request.into_inner();
        let model_service = self.model_service.clone();
        let result = match model_service.classify(classification_request).await {
            Ok(result) => result,
            Err(status) => {
                tracing::warn!("Classification failed: {}", status.message());
                return Err(status);
            }
        };

        tracing::debug!("Returning {} labels", result.labels.len());
        for (i, prediction) in result.labels.iter().enumerate() {
            match &prediction.bounding_box {
                Some(bbox) => tracing::debug!(
                    "Label {}: {}, confidence={:.3}, bbox=({:.3}, {:.3}, {:.3}, {:.3})",
                    i,
                    prediction.label,
                    prediction.confidence,
                    bbox.x,
                    bbox.y,
                    bbox.width,
                    bbox.height
                ),
                None => tracing::debug!(
                    "Label {}: {}, confidence={:.3}",
                    i,
                    prediction.label,
                    prediction.confidence
                ),
            }
        }

        Ok(Response::new(result))
    }

    async fn describe(
        &self,
        request: Request<DescriptionRequest>,
    ) -> Result<Response<DescriptionResponse>, Status> {
        let description_request = request.into_inner();
        tracing::debug!(
            "Describing image from {} labels",
            description_request.labels.len()
        );
        let response = self.model_service.describe(description_request).await?;

        Ok(Response::new(response))
    }
}
