use axum::{routing::delete, routing::get, routing::post, routing::put, Router};

use crate::http::handlers;
use crate::AppState;

pub fn health() -> Router<AppState> {
    Router::new().route("/health", get(handlers::health))
}

pub fn session() -> Router<AppState> {
    Router::new().route("/v1/session", put(handlers::switch_session))
}

pub fn panel() -> Router<AppState> {
    Router::new()
        .route("/v1/panel", get(handlers::get_panel))
        .route("/v1/panel/open", post(handlers::open_panel))
        .route("/v1/panel/close", post(handlers::close_panel))
        .route("/v1/panel/toggle", post(handlers::toggle_panel))
}

pub fn notifications() -> Router<AppState> {
    Router::new()
        .route("/v1/notifications", delete(handlers::clear_notifications))
        .route("/v1/notifications/refresh", post(handlers::refresh_notifications))
        .route("/v1/notifications/read-all", post(handlers::mark_all_notifications_read))
        .route("/v1/notifications/:id", delete(handlers::delete_notification))
        .route("/v1/notifications/:id/read", post(handlers::mark_notification_read))
        .route("/v1/notifications/:id/open", post(handlers::open_notification))
}
