use super::ApiError;
use crate::{
    model::Notice,
    page::PageError,
    results::{overlays as layout_overlays, Overlay, RenderedSize},
    server::SharedState,
    session::{PageSession, PendingSubmission, SessionId, SessionView},
    speech::{SpeechCommand, SpeechEnvironment},
    upload::ImageUpload,
};
use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::instrument;

const ROUTE_SUBMIT: &str = "submit";

fn parse_id(raw: &str) -> Result<SessionId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::SessionNotFound(raw.to_string()))
}

/// Runs `f` against the session named in the path.
fn with_session<R>(
    state: &SharedState,
    raw_id: &str,
    f: impl FnOnce(SessionId, &mut PageSession) -> R,
) -> Result<R, ApiError> {
    let id = parse_id(raw_id)?;
    state
        .sessions
        .with_session(id, |session| f(id, session))
        .ok_or_else(|| ApiError::SessionNotFound(raw_id.to_string()))
}

#[instrument(skip(state))]
pub async fn create_session(
    State(state): State<SharedState>,
) -> Result<impl IntoResponse, ApiError> {
    state.metrics.record_request("create_session");

    let id = state.sessions.create();
    let view = with_session(&state, &id.to_string(), |id, session| {
        session.view(id, &state.display_config)
    })?;
    tracing::debug!("Created session {}", id);

    Ok((StatusCode::CREATED, Json(view)))
}

#[instrument(skip(state))]
pub async fn get_session(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<SessionView>, ApiError> {
    let view = with_session(&state, &id, |id, session| {
        session.view(id, &state.display_config)
    })?;
    Ok(Json(view))
}

#[instrument(skip(state))]
pub async fn delete_session(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state
        .sessions
        .remove(parse_id(&id)?)
        .ok_or(ApiError::SessionNotFound(id))?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, multipart))]
pub async fn stage_selection(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<Json<SessionView>, ApiError> {
    state.metrics.record_request("stage_selection");
    // Unknown sessions are rejected before the body is read.
    with_session(&state, &id, |_, _| ())?;

    let upload = ImageUpload::from_multipart(multipart, &state.upload_config)
        .await
        .inspect_err(|e| state.metrics.record_upload_rejection(e.reason()))?;

    let view = with_session(&state, &id, |id, session| {
        session.page.select(upload, &state.upload_config)?;
        Ok::<_, PageError>(session.view(id, &state.display_config))
    })??;
    Ok(Json(view))
}

#[instrument(skip(state))]
pub async fn clear_selection(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<SessionView>, ApiError> {
    let view = with_session(&state, &id, |id, session| {
        session.page.clear_selection()?;
        Ok::<_, PageError>(session.view(id, &state.display_config))
    })??;
    Ok(Json(view))
}

/// Idle → Loading → Result | Error. The session lock is released while the
/// classifier runs. A cancelled request still moves the page out of Loading.
#[instrument(skip(state))]
pub async fn submit(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<SessionView>, ApiError> {
    state.metrics.record_request(ROUTE_SUBMIT);

    let (session_id, submission, speech) = with_session(&state, &id, |session_id, session| {
        session
            .begin_submission()
            .map(|(submission, speech)| (session_id, submission, speech))
    })??;
    let pending = PendingSubmission::new(state.sessions.clone(), session_id, submission.generation);

    let start = Instant::now();
    let outcome = state.classifier.classify(submission.photo_data_uri).await;
    pending.disarm();
    state
        .metrics
        .record_classification_duration(start.elapsed().as_millis() as u64, ROUTE_SUBMIT);

    let (outcome, notice) = match outcome {
        Ok(result) => (
            Ok(result),
            Notice::info("Analysis Complete", "Image processed successfully."),
        ),
        Err(e) => {
            tracing::warn!("Classification failed: {}", e);
            state.metrics.record_classification_failure(ROUTE_SUBMIT);
            let message = e.user_message();
            (Err(message.clone()), Notice::error("Analysis Failed", message))
        }
    };

    let (applied, view) = with_session(&state, &id, |id, session| {
        let applied = session.finish_submission(submission.generation, outcome);
        (applied, session.view(id, &state.display_config))
    })?;
    if !applied {
        tracing::info!("Discarding result for session {}", id);
        return Err(ApiError::Superseded);
    }

    Ok(Json(view.with_notice(notice).with_speech(speech)))
}

/// "Scan again".
#[instrument(skip(state))]
pub async fn reset(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<SessionView>, ApiError> {
    let view = with_session(&state, &id, |id, session| {
        let speech = session.scan_again();
        session.view(id, &state.display_config).with_speech(speech)
    })?;
    Ok(Json(view))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlaysView {
    pub overlays: Vec<Overlay>,
    pub caption_height: f64,
}

/// Overlay layout for the size the result image was rendered at. Empty when
/// there is no result to draw.
#[instrument(skip(state))]
pub async fn overlays(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Query(size): Query<RenderedSize>,
) -> Result<Json<OverlaysView>, ApiError> {
    if !size.is_valid() {
        return Err(ApiError::BadRequest(format!(
            "rendered size {}x{} must be positive",
            size.width, size.height
        )));
    }

    let overlays = with_session(&state, &id, |_, session| {
        session
            .page
            .result()
            .map(|result| layout_overlays(result, size, &state.display_config))
            .unwrap_or_default()
    })?;
    Ok(Json(OverlaysView {
        overlays,
        caption_height: state.display_config.caption_height,
    }))
}

#[instrument(skip(state, env))]
pub async fn toggle_speech(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(env): Json<SpeechEnvironment>,
) -> Result<Json<SpeechCommand>, ApiError> {
    let command = with_session(&state, &id, |_, session| {
        let description = session.description().to_string();
        session.narrator.toggle(&description, &env)
    })?;
    Ok(Json(command))
}

#[instrument(skip(state))]
pub async fn speech_ended(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    with_session(&state, &id, |_, session| session.narrator.finished())?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct SpeechFailure {
    #[serde(default)]
    pub error: String,
}

#[instrument(skip(state))]
pub async fn speech_failed(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(failure): Json<SpeechFailure>,
) -> Result<Json<Notice>, ApiError> {
    tracing::warn!("Speech synthesis failed: {}", failure.error);
    let notice = with_session(&state, &id, |_, session| session.narrator.failed(&failure.error))?;
    Ok(Json(notice))
}
