mod classify;
mod health;
mod index;
mod metrics;
mod sessions;

use crate::{
    config::UploadConfig,
    model::Notice,
    page::PageError,
    server::SharedState,
    upload::UploadError,
};
use axum::{
    extract::DefaultBodyLimit,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post, put},
    Router,
};
use thiserror::Error;

pub fn api_routes(upload_config: &UploadConfig) -> Router<SharedState> {
    // Body limit above the file cap so oversized files get a proper message.
    let upload_routes = Router::new()
        .route("/api/classify", post(classify::classify_image))
        .route(
            "/api/sessions/{id}/selection",
            put(sessions::stage_selection).delete(sessions::clear_selection),
        )
        .layer(DefaultBodyLimit::max(upload_config.body_limit()));

    Router::new()
        .route("/", get(index::index))
        .route("/health", get(health::healthcheck))
        .route("/metrics", get(metrics::metrics_handler))
        .route("/api/sessions", post(sessions::create_session))
        .route(
            "/api/sessions/{id}",
            get(sessions::get_session).delete(sessions::delete_session),
        )
        .route("/api/sessions/{id}/submit", post(sessions::submit))
        .route("/api/sessions/{id}/reset", post(sessions::reset))
        .route("/api/sessions/{id}/overlays", get(sessions::overlays))
        .route("/api/sessions/{id}/speech", post(sessions::toggle_speech))
        .route("/api/sessions/{id}/speech/ended", post(sessions::speech_ended))
        .route("/api/sessions/{id}/speech/error", post(sessions::speech_failed))
        .merge(upload_routes)
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Upload(#[from] UploadError),
    #[error(transparent)]
    Page(#[from] PageError),
    #[error("Session {0} not found")]
    SessionNotFound(String),
    #[error("The page was reset before the analysis finished.")]
    Superseded,
    #[error("{0}")]
    Classification(String),
    #[error("Invalid request: {0}")]
    BadRequest(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Upload(err) | ApiError::Page(PageError::Upload(err)) => err.status(),
            ApiError::Page(PageError::InvalidTransition { .. }) | ApiError::Superseded => {
                StatusCode::CONFLICT
            }
            ApiError::SessionNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Classification(_) => StatusCode::BAD_GATEWAY,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn notice(&self) -> Notice {
        match self {
            ApiError::Upload(err) | ApiError::Page(PageError::Upload(err)) => err.notice(),
            ApiError::Page(PageError::InvalidTransition { .. }) => {
                Notice::error("Please wait", self.to_string())
            }
            ApiError::SessionNotFound(_) => Notice::error(
                "Session expired",
                "This page is no longer active. Reload to start over.",
            ),
            ApiError::Superseded => Notice::info("Analysis discarded", self.to_string()),
            ApiError::Classification(message) => Notice::error("Analysis Failed", message.clone()),
            ApiError::BadRequest(_) => Notice::error("Invalid request", self.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        } else {
            tracing::debug!("Request rejected: {}", self);
        }
        (status, Json(self.notice())).into_response()
    }
}
