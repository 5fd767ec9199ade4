//! HTTP API consumed by the chat widget.
//!
//! Every session is addressed by its UUID. Turn handlers lock the session
//! for the whole turn, so a second request for the same session waits for
//! the first to finish.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::sync::OwnedMutexGuard;
use tracing::{info, warn};
use uuid::Uuid;

use crate::companion::{Companion, SummaryOutcome, TurnError};
use crate::message::{Message, Role};
use crate::session::{Session, SessionRegistry, SharedSession};
use crate::tts::voices::{Voice, VOICES};

#[derive(Clone)]
pub struct ApiState {
    pub companion: Arc<Companion>,
    pub sessions: Arc<SessionRegistry>,
}

// --- Request/Response types ---

#[derive(Deserialize, Default)]
struct SettingsRequest {
    #[serde(default)]
    voice: Option<String>,
    #[serde(default)]
    api_key: Option<String>,
}

#[derive(Deserialize)]
struct SubmitRequest {
    text: String,
}

#[derive(Serialize)]
struct StatusResponse {
    name: String,
    avatar: String,
    model: String,
    speech_enabled: bool,
    api_key_configured: bool,
    sessions: usize,
}

/// A transcript entry as the widget renders it.
#[derive(Serialize)]
struct MessageView {
    role: Role,
    content: String,
    timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    audio_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    latency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_seconds: Option<f64>,
    is_emergency: bool,
    autoplay: bool,
}

impl MessageView {
    fn new(session: Uuid, message: &Message) -> Self {
        let audio_url = message
            .audio_path
            .as_deref()
            .and_then(|p| p.file_name())
            .and_then(|n| n.to_str())
            .map(|name| format!("/audio/{session}/{name}"));
        Self {
            role: message.role,
            content: message.content.clone(),
            timestamp: message.timestamp.clone(),
            autoplay: message.is_emergency && audio_url.is_some(),
            audio_url,
            latency: message.latency_caption(),
            duration_seconds: message.duration_seconds,
            is_emergency: message.is_emergency,
        }
    }
}

#[derive(Serialize)]
struct SessionResponse {
    id: Uuid,
    voice: String,
    api_key_set: bool,
    messages: Vec<MessageView>,
}

#[derive(Serialize)]
struct TurnResponse {
    messages: Vec<MessageView>,
}

#[derive(Serialize)]
struct SummaryResponse {
    status: &'static str,
    text: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn not_found(what: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: what.into(),
        }
    }
}

impl From<TurnError> for ApiError {
    fn from(e: TurnError) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorResponse { error: self.message })).into_response()
    }
}

/// Build the axum router.
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/status", get(handle_status))
        .route("/voices", get(handle_voices))
        .route("/sessions", post(handle_create_session))
        .route(
            "/sessions/{id}",
            get(handle_get_session).delete(handle_delete_session),
        )
        .route("/sessions/{id}/settings", put(handle_update_settings))
        .route("/sessions/{id}/messages", post(handle_submit))
        .route("/sessions/{id}/panic", post(handle_panic))
        .route("/sessions/{id}/summary", post(handle_summary))
        .route("/audio/{id}/{file}", get(handle_audio))
        .with_state(state)
}

/// Bind and serve until the process exits.
pub async fn serve(state: ApiState, addr: &str) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Companion API listening on {}", listener.local_addr()?);
    axum::serve(listener, router(state)).await
}

async fn lookup(state: &ApiState, id: Uuid) -> Result<SharedSession, ApiError> {
    state
        .sessions
        .get(id)
        .await
        .ok_or_else(|| ApiError::not_found(format!("unknown session {id}")))
}

/// Lock a session that is still registered once the lock is held. A request
/// queued behind a delete must not touch the removed session.
async fn lock_live(state: &ApiState, id: Uuid) -> Result<OwnedMutexGuard<Session>, ApiError> {
    let shared = lookup(state, id).await?;
    let session = shared.clone().lock_owned().await;
    match state.sessions.get(id).await {
        Some(current) if Arc::ptr_eq(&current, &shared) => Ok(session),
        _ => Err(ApiError::not_found(format!("session {id} was deleted"))),
    }
}

// --- Handlers ---

async fn handle_status(State(state): State<ApiState>) -> Json<StatusResponse> {
    let persona = state.companion.persona();
    Json(StatusResponse {
        name: persona.name.clone(),
        avatar: persona.avatar.clone(),
        model: state.companion.model_name().to_string(),
        speech_enabled: state.companion.speech_enabled(),
        api_key_configured: state.companion.has_default_key(),
        sessions: state.sessions.len().await,
    })
}

async fn handle_voices() -> Json<&'static [Voice]> {
    Json(VOICES)
}

async fn handle_create_session(
    State(state): State<ApiState>,
    body: Bytes,
) -> Result<(StatusCode, Json<SessionResponse>), ApiError> {
    // The body is optional; an empty POST opens a session with defaults.
    let req: SettingsRequest = if body.is_empty() {
        SettingsRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| ApiError {
            status: StatusCode::BAD_REQUEST,
            message: format!("invalid settings: {e}"),
        })?
    };
    let settings = state.companion.session_settings(req.voice, req.api_key);
    let (id, session) = state.sessions.create(settings).await;
    let session = session.lock().await;
    Ok((
        StatusCode::CREATED,
        Json(SessionResponse {
            id,
            voice: session.settings.voice.clone(),
            api_key_set: session.settings.api_key.is_some(),
            messages: Vec::new(),
        }),
    ))
}

async fn handle_get_session(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionResponse>, ApiError> {
    let shared = lookup(&state, id).await?;
    let (voice, api_key_set, messages) = {
        let session = shared.lock().await;
        (
            session.settings.voice.clone(),
            session.settings.api_key.is_some(),
            session.log.snapshot(),
        )
    };
    Ok(Json(SessionResponse {
        id,
        voice,
        api_key_set,
        messages: messages.iter().map(|m| MessageView::new(id, m)).collect(),
    }))
}

async fn handle_delete_session(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let shared = state
        .sessions
        .remove(id)
        .await
        .ok_or_else(|| ApiError::not_found(format!("unknown session {id}")))?;
    // Hold the lock across cleanup so no turn writes audio into the removed
    // directory.
    let _session = shared.lock().await;
    state.companion.audio_store().remove_session(id).await;
    info!("Session {id} deleted");
    Ok(StatusCode::NO_CONTENT)
}

async fn handle_update_settings(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
    Json(req): Json<SettingsRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    let mut session = lock_live(&state, id).await?;
    if let Some(voice) = req.voice.filter(|v| !v.trim().is_empty()) {
        info!("Session {id}: voice set to {voice}");
        session.settings.voice = voice;
    }
    if let Some(key) = req.api_key {
        // An explicit empty key clears the override.
        session.settings.api_key = Some(key.trim().to_string()).filter(|k| !k.is_empty());
    }
    Ok(Json(SessionResponse {
        id,
        voice: session.settings.voice.clone(),
        api_key_set: session.settings.api_key.is_some(),
        messages: Vec::new(),
    }))
}

async fn handle_submit(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
    Json(req): Json<SubmitRequest>,
) -> Result<Json<TurnResponse>, ApiError> {
    let mut session = lock_live(&state, id).await?;
    let turn = state.companion.submit(&mut session, &req.text).await?;
    Ok(Json(TurnResponse {
        messages: vec![MessageView::new(id, &turn.prompt), MessageView::new(id, &turn.reply)],
    }))
}

async fn handle_panic(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> Result<Json<TurnResponse>, ApiError> {
    let mut session = lock_live(&state, id).await?;
    let turn = state.companion.panic(&mut session).await;
    Ok(Json(TurnResponse {
        messages: vec![MessageView::new(id, &turn.prompt), MessageView::new(id, &turn.reply)],
    }))
}

async fn handle_summary(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SummaryResponse>, ApiError> {
    let session = lock_live(&state, id).await?;
    let outcome = state.companion.summarize(&session).await;
    let status = match outcome {
        SummaryOutcome::Report(_) => "report",
        SummaryOutcome::TooShort => "too_short",
        SummaryOutcome::MissingKey => "missing_key",
        SummaryOutcome::Unavailable => "unavailable",
    };
    Ok(Json(SummaryResponse {
        status,
        text: outcome.text().to_string(),
    }))
}

async fn handle_audio(
    State(state): State<ApiState>,
    Path((id, file)): Path<(Uuid, String)>,
) -> Result<Response, ApiError> {
    let path = state
        .companion
        .audio_store()
        .resolve(id, &file)
        .ok_or_else(|| ApiError::not_found("no such audio"))?;

    match tokio::fs::read(&path).await {
        Ok(bytes) => {
            let content_type = match path.extension().and_then(|e| e.to_str()) {
                Some("wav") => "audio/wav",
                Some("opus") | Some("ogg") => "audio/ogg",
                Some("aac") => "audio/aac",
                Some("flac") => "audio/flac",
                _ => "audio/mpeg",
            };
            Ok(([(header::CONTENT_TYPE, content_type)], bytes).into_response())
        }
        Err(e) => {
            warn!("Audio {} unavailable: {e}", path.display());
            Err(ApiError::not_found("no such audio"))
        }
    }
}
