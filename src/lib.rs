pub(crate) mod api;
pub(crate) mod core;
pub(crate) mod db;
pub(crate) mod proctoring;
pub(crate) mod repositories;
pub(crate) mod schemas;
pub(crate) mod services;

#[cfg(test)]
mod test_support;

use std::sync::Arc;

use crate::core::telemetry::{self, LogSink};
use crate::core::time::SystemClock;
use crate::core::{config::Settings, redis::RedisHandle, state::AppState};
use crate::proctoring::persisted::PersistedState;
use crate::proctoring::runtime::{Cadence, Collaborators};
use crate::proctoring::session::{ProctorPolicy, ProctoringSession};
use crate::proctoring::store::{FallbackStore, FileStore};
use crate::services::backend_client::BackendClient;
use crate::services::code_runner::PistonRunner;

/// Results backend: HTTP API over Postgres with an optional Redis cache.
pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::load()?;
    telemetry::init_tracing(&settings, LogSink::Stdout)?;
    core::metrics::init(&settings)?;

    let db_pool = db::init_pool(&settings).await?;
    db::run_migrations(&db_pool).await?;

    let redis = RedisHandle::new(settings.redis().redis_url());
    if let Err(err) = redis.connect().await {
        tracing::error!(error = %err, "Failed to connect to Redis; continuing without cache");
    } else {
        tracing::info!("Redis connected successfully");
    }

    let state = AppState::new(settings, db_pool, redis.clone());
    core::bootstrap::run(&state).await;

    let app = api::router::router(state.clone());
    let listener = tokio::net::TcpListener::bind(state.settings().server_addr()).await?;

    tracing::info!(
        host = %state.settings().server_host(),
        port = state.settings().server_port(),
        environment = %state.settings().runtime().environment.as_str(),
        "Proctor Rust API listening"
    );

    let result =
        axum::serve(listener, app).with_graceful_shutdown(core::shutdown::shutdown_signal()).await;

    redis.disconnect().await;
    tracing::info!("Redis disconnected");

    result?;

    Ok(())
}

/// Candidate runtime: shell events on stdin, directives on stdout.
pub async fn run_bridge() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::load()?;
    telemetry::init_tracing(&settings, LogSink::Stderr)?;
    core::metrics::init(&settings)?;

    let proctoring = settings.proctoring();
    let store = match FileStore::open(&proctoring.profile_dir) {
        Ok(durable) => {
            tracing::info!(path = %durable.path().display(), "Using durable profile store");
            FallbackStore::new(Arc::new(durable))
        }
        Err(err) => {
            tracing::warn!(error = %err, "Profile store unavailable; state will not survive restarts");
            FallbackStore::memory_only()
        }
    };

    let backend = Arc::new(BackendClient::from_settings(&settings)?);
    let ports = Collaborators {
        submissions: backend.clone(),
        exams: backend.clone(),
        runner: Arc::new(PistonRunner::from_settings(&settings)?),
        auth: backend,
    };

    let session = ProctoringSession::new(
        PersistedState::new(Arc::new(store)),
        Arc::new(SystemClock),
        ProctorPolicy::from_settings(proctoring),
    );
    let cadence = Cadence::from_millis(proctoring.tick_ms, proctoring.gate_poll_ms);

    tracing::info!(
        api_base_url = %proctoring.api_base_url,
        max_warnings = proctoring.max_warnings,
        "Proctoring bridge started"
    );

    services::stdio_bridge::serve(
        tokio::io::stdin(),
        tokio::io::stdout(),
        session,
        ports,
        cadence,
        core::shutdown::shutdown_channel(),
    )
    .await?;

    tracing::info!("Proctoring bridge stopped");
    Ok(())
}
