use super::ApiError;
use crate::{
    model::ClassificationResult,
    results::ResultsView,
    server::SharedState,
    upload::ImageUpload,
};
use axum::{
    extract::{Multipart, State},
    response::Json,
};
use serde::Serialize;
use std::time::Instant;
use tracing::instrument;

const ROUTE: &str = "classify";

#[derive(Debug, Serialize)]
pub struct ClassifyResponse {
    pub result: ClassificationResult,
    pub view: ResultsView,
}

/// One-shot upload and classification, no page session involved.
#[instrument(skip(state, multipart))]
pub async fn classify_image(
    State(state): State<SharedState>,
    multipart: Multipart,
) -> Result<Json<ClassifyResponse>, ApiError> {
    state.metrics.record_request(ROUTE);

    let upload = ImageUpload::from_multipart(multipart, &state.upload_config)
        .await
        .inspect_err(|e| state.metrics.record_upload_rejection(e.reason()))?;
    tracing::info!(
        "Classifying {} ({}, {} bytes)",
        upload.file_name,
        upload.content_type,
        upload.bytes.len()
    );

    let start = Instant::now();
    let outcome = state.classifier.classify(upload.to_data_uri()).await;
    state
        .metrics
        .record_classification_duration(start.elapsed().as_millis() as u64, ROUTE);

    let result = outcome.map_err(|e| {
        tracing::warn!("Classification failed: {}", e);
        state.metrics.record_classification_failure(ROUTE);
        ApiError::Classification(e.user_message())
    })?;

    let view = ResultsView::new(&result, &state.display_config);
    Ok(Json(ClassifyResponse { result, view }))
}
