use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use shopbell::app::panel::PanelController;
use shopbell::app::sync::SyncEngine;
use shopbell::config::{AppConfig, GatewayMode};
use shopbell::infra::db::Db;
use shopbell::infra::gateway::RemoteGateway;
use shopbell::infra::memory::InMemoryGateway;
use shopbell::infra::postgres::PgGateway;
use shopbell::{http, jobs, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;

    let (gateway, db): (Arc<dyn RemoteGateway>, Option<Db>) = match config.gateway {
        GatewayMode::Postgres => {
            let db = Db::connect(&config).await?;
            db.ping().await?;
            let gateway = PgGateway::new(db.clone(), config.load_limit);
            (Arc::new(gateway), Some(db))
        }
        GatewayMode::Memory => {
            tracing::warn!("using in-memory notification gateway; data is not persisted");
            (Arc::new(InMemoryGateway::new()), None)
        }
    };

    let engine = SyncEngine::new(gateway, config.sync_config());
    let panel = PanelController::new(engine.clone());

    let state = AppState {
        panel,
        db,
        session_hook_token: config.session_hook_token.clone(),
    };

    let refresh = config
        .refresh_interval()
        .map(|interval| tokio::spawn(jobs::refresh::run(engine.clone(), interval)));

    let app: Router = http::router(state).layer(TraceLayer::new_for_http());
    let listener = tokio::net::TcpListener::bind(&config.http_addr).await?;
    tracing::info!("listening on {}", config.http_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(refresh) = refresh {
        refresh.abort();
    }
    engine.shutdown();

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
