//! HTTP router, shared state and server lifecycle.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

use axum::{extract::State, response::Json, routing::get, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::backend::{BadgeBackend, InMemoryBadgeBackend, SupabaseBadgeBackend};
use crate::config::{BackendConfig, Config};

use super::sessions::{self, SessionSlot};
use super::types::HealthResponse;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    /// Collaborator shared by every session
    pub backend: Arc<dyn BadgeBackend>,
    /// Live sessions by ID
    pub sessions: RwLock<HashMap<Uuid, Arc<SessionSlot>>>,
}

impl AppState {
    pub fn new(config: Config, backend: Arc<dyn BadgeBackend>) -> Self {
        Self {
            config,
            backend,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Drop sessions idle for at least the configured TTL as of `now`.
    ///
    /// Sessions with an operation in flight are kept. Returns how many were
    /// removed.
    pub async fn evict_idle_sessions(&self, now: Instant) -> usize {
        let ttl = self.config.session_ttl;
        let candidates: Vec<Arc<SessionSlot>> =
            self.sessions.read().await.values().cloned().collect();

        let mut expired = Vec::new();
        for slot in candidates {
            if !slot.is_busy() && slot.idle_for(now).await >= ttl {
                expired.push(slot.id());
            }
        }
        if expired.is_empty() {
            return 0;
        }

        let mut sessions = self.sessions.write().await;
        for id in &expired {
            sessions.remove(id);
            tracing::debug!(session = %id, "Session expired");
        }
        tracing::info!(
            expired = expired.len(),
            remaining = sessions.len(),
            "Evicted idle sessions"
        );
        expired.len()
    }
}

/// Background task that periodically evicts idle sessions.
pub async fn start_cleanup_task(state: Arc<AppState>) {
    let period = state.config.session_ttl.min(Duration::from_secs(60));
    tracing::info!(
        "Starting session cleanup task (ttl {}s, every {}s)",
        state.config.session_ttl.as_secs(),
        period.as_secs()
    );

    let mut interval = tokio::time::interval(period);
    // The first tick completes immediately.
    interval.tick().await;
    loop {
        interval.tick().await;
        state.evict_idle_sessions(Instant::now()).await;
    }
}

/// Build the collaborator binding selected by `config`.
pub fn build_backend(config: &Config) -> Arc<dyn BadgeBackend> {
    match &config.backend {
        BackendConfig::Memory => {
            tracing::warn!("Using in-memory badge backend; participants are lost on restart");
            Arc::new(InMemoryBadgeBackend::new(config.badge_name.clone()))
        }
        BackendConfig::Supabase {
            url,
            api_key,
            table,
        } => {
            tracing::info!("Using Supabase badge backend at {} (table {})", url, table);
            Arc::new(SupabaseBadgeBackend::new(
                url,
                api_key,
                table,
                &config.badge_name,
            ))
        }
    }
}

/// Assemble the API router over `state`.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .nest("/api/sessions", sessions::routes())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let backend = build_backend(&config);
    let state = Arc::new(AppState::new(config.clone(), backend));
    let app = router(Arc::clone(&state));

    tokio::spawn(start_cleanup_task(Arc::clone(&state)));

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(state))
        .await?;

    Ok(())
}

/// Wait for SIGINT/SIGTERM.
async fn shutdown_signal(state: Arc<AppState>) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    let sessions = state.sessions.read().await;
    let busy = sessions.values().filter(|s| s.is_busy()).count();
    tracing::info!(
        "Shutdown signal received ({} sessions, {} with an operation in flight)",
        sessions.len(),
        busy
    );
}

/// Health check endpoint.
async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        backend: state.backend.id().to_string(),
        sessions: state.sessions.read().await.len(),
    })
}
