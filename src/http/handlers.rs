use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::app::error::{MutationOutcome, SyncError};
use crate::app::panel::PanelView;
use crate::http::{AppError, SessionHook};
use crate::AppState;

#[derive(Serialize)]
pub(crate) struct HealthResponse {
    status: &'static str,
    session_active: bool,
    push_connected: bool,
}

pub(crate) async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let db = match &state.db {
        Some(db) => db.ping().await.is_ok(),
        None => true,
    };
    let engine = state.panel.engine();
    let session_active = engine.current_user().is_some();
    let push_connected = engine.is_subscribed();
    let status = if db && (!session_active || push_connected) {
        "ok"
    } else {
        "degraded"
    };

    Json(HealthResponse {
        status,
        session_active,
        push_connected,
    })
}

fn load_error(err: SyncError) -> AppError {
    match err {
        SyncError::NoSession => AppError::unauthorized("no active session"),
        _ => AppError::bad_gateway("failed to refresh notifications"),
    }
}

fn require_session(state: &AppState) -> Result<Uuid, AppError> {
    state
        .panel
        .engine()
        .current_user()
        .ok_or_else(|| AppError::unauthorized("no active session"))
}

#[derive(Deserialize)]
pub struct SessionRequest {
    pub user_id: Option<Uuid>,
}

pub async fn switch_session(
    _hook: SessionHook,
    State(state): State<AppState>,
    Json(payload): Json<SessionRequest>,
) -> Result<Json<PanelView>, AppError> {
    let result = match payload.user_id {
        Some(user_id) => state.panel.sign_in(user_id).await,
        None => state.panel.sign_out().await,
    };
    result.map_err(|err| {
        tracing::warn!(error = %err, user_id = ?payload.user_id, "session switch load failed");
        load_error(err)
    })?;

    Ok(Json(state.panel.view()))
}

pub async fn get_panel(State(state): State<AppState>) -> Json<PanelView> {
    Json(state.panel.view())
}

#[derive(Serialize)]
pub struct VisibilityResponse {
    pub open: bool,
}

pub async fn open_panel(State(state): State<AppState>) -> Json<VisibilityResponse> {
    state.panel.set_open(true);
    Json(VisibilityResponse { open: true })
}

pub async fn close_panel(State(state): State<AppState>) -> Json<VisibilityResponse> {
    state.panel.set_open(false);
    Json(VisibilityResponse { open: false })
}

pub async fn toggle_panel(State(state): State<AppState>) -> Json<VisibilityResponse> {
    let open = state.panel.toggle();
    Json(VisibilityResponse { open })
}

pub async fn refresh_notifications(
    State(state): State<AppState>,
) -> Result<Json<PanelView>, AppError> {
    require_session(&state)?;
    state.panel.load().await.map_err(load_error)?;
    Ok(Json(state.panel.view()))
}

#[derive(Serialize)]
pub struct MutationResponse {
    pub outcome: MutationOutcome,
    pub unread_count: usize,
}

fn mutation_response(
    state: &AppState,
    outcome: MutationOutcome,
) -> Result<Json<MutationResponse>, AppError> {
    if outcome == MutationOutcome::NoSession {
        return Err(AppError::unauthorized("no active session"));
    }
    Ok(Json(MutationResponse {
        outcome,
        unread_count: state.panel.engine().unread_count(),
    }))
}

pub async fn mark_notification_read(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<MutationResponse>, AppError> {
    require_session(&state)?;
    let outcome = state.panel.mark_read(id).await;
    mutation_response(&state, outcome)
}

#[derive(Serialize)]
pub struct OpenResponse {
    pub outcome: MutationOutcome,
    pub link: Option<String>,
    pub unread_count: usize,
}

pub async fn open_notification(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<OpenResponse>, AppError> {
    require_session(&state)?;
    let opened = state.panel.open_notification(id).await;
    if opened.outcome == MutationOutcome::NoSession {
        return Err(AppError::unauthorized("no active session"));
    }

    Ok(Json(OpenResponse {
        outcome: opened.outcome,
        link: opened.link,
        unread_count: state.panel.engine().unread_count(),
    }))
}

pub async fn mark_all_notifications_read(
    State(state): State<AppState>,
) -> Result<Json<MutationResponse>, AppError> {
    require_session(&state)?;
    let outcome = state.panel.mark_all_read().await;
    mutation_response(&state, outcome)
}

pub async fn delete_notification(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<MutationResponse>, AppError> {
    require_session(&state)?;
    let outcome = state.panel.remove(id).await;
    mutation_response(&state, outcome)
}

pub async fn clear_notifications(
    State(state): State<AppState>,
) -> Result<Json<MutationResponse>, AppError> {
    require_session(&state)?;
    let outcome = state.panel.remove_all().await;
    mutation_response(&state, outcome)
}
