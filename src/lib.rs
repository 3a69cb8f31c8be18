pub mod app;
pub mod config;
pub mod domain;
pub mod http;
pub mod infra;
pub mod jobs;

use crate::app::panel::PanelController;
use crate::infra::db::Db;

#[derive(Clone)]
pub struct AppState {
    pub panel: PanelController,
    /// Present only when notifications live in Postgres.
    pub db: Option<Db>,
    pub session_hook_token: Option<String>,
}
