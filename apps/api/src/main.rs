mod admin;
mod auth;
mod backend;
mod config;
mod errors;
mod logs;
mod models;
mod policy;
mod routes;
mod session;
mod state;
mod view;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::backend::rest::RestBackend;
use crate::backend::Backend;
use crate::config::Config;
use crate::policy::AccessPolicy;
use crate::routes::{build_router, build_unconfigured_router};
use crate::session::{spawn_session_watcher, SessionStore};
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting daylog API v{}", env!("CARGO_PKG_VERSION"));

    let app = if config.is_configured() {
        let backend: Arc<dyn Backend> = Arc::new(RestBackend::new(
            &config.supabase_url,
            &config.supabase_anon_key,
        ));

        // Retrieve the current session once; absence means unauthenticated.
        let sessions = SessionStore::init(backend.as_ref()).await;
        let policy = AccessPolicy::from_config(&config);

        let state = AppState::new(backend, sessions, policy);

        // Auth change listener: drives the history refresher, the view
        // reset on sign-in, and local clearing on sign-out.
        spawn_session_watcher(state.clone());

        build_router(state)
    } else {
        warn!(
            "Service credentials still hold placeholder values; \
             serving the configuration-error state only"
        );
        build_unconfigured_router()
    };

    let app = app
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // local single-user UI; nothing to lock down

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
