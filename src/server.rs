//! ==============================================================================
//! server.rs - http surface of the hub
//! ==============================================================================
//!
//! routes:
//!     GET  /                  liveness text
//!     POST /api/sensor/data   ingest one reading (201 / 400 / 500)
//!     GET  /api/window        latest window as json (?limit=N)
//!     GET  /api/export        raw rows as a json download (?limit=N)
//!     GET  /dashboard         html dashboard, re-polls itself
//!
//! shared state:
//!     the gateway and query service are cheap clones around a file path.
//!     the dashboard state sits behind arc<rwlock<>> and every dashboard hit
//!     is one poll cycle: query, merge into the state, render.
//!
//! ==============================================================================

use crate::config::{HostConfig, MAX_HISTORY_LIMIT};
use crate::dashboard::{self, DashboardState};
use crate::error::IngestError;
use crate::generator::{self, Generator, Sink};
use crate::ingest::{self, IngestGateway};
use crate::query::{QueryService, WindowRow};
use crate::shutdown;
use crate::store::LogStore;

use anyhow::{anyhow, Result};
use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use chrono::FixedOffset;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{watch, RwLock};
use tower_http::cors::CorsLayer;

pub const LIVENESS_MESSAGE: &str = "Sensor hub online. Waiting for data at /api/sensor/data";

#[derive(Clone)]
pub struct AppState {
    pub gateway: IngestGateway,
    pub query: QueryService,
    pub config: Arc<HostConfig>,
    pub offset: FixedOffset,
    pub dashboard: Arc<RwLock<DashboardState>>,
}

impl AppState {
    pub fn new(gateway: IngestGateway, query: QueryService, config: HostConfig, offset: FixedOffset) -> Self {
        Self {
            gateway,
            query,
            config: Arc::new(config),
            offset,
            dashboard: Arc::new(RwLock::new(DashboardState::default())),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(home_handler))
        .route("/api/sensor/data", post(ingest_handler))
        .route("/api/window", get(window_handler))
        .route("/api/export", get(export_handler))
        .route("/dashboard", get(dashboard_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// the `serve` command: schema, listener, optional in-process generator, http
///
/// the port is bound before the generator starts, so a bad bind address
/// fails fast with nothing written. if serving ends in an error the
/// generator is stopped before the error is returned.
pub async fn run_hub(
    config: HostConfig,
    store: LogStore,
    gateway: IngestGateway,
    query: QueryService,
    offset: FixedOffset,
    shutdown: watch::Receiver<bool>,
) -> Result<()> {
    store.ensure_schema()?;
    tracing::info!("[STARTUP] ✓ Database '{}' ready", store.path().display());

    let listener = bind(&config.server.bind).await?;

    let producer = if config.generator.enabled {
        let sink = Sink::from_config(&config.generator, gateway.clone());
        Some(tokio::spawn(generator::run(
            Generator::from_config(&config),
            sink,
            Duration::from_secs(config.generator.interval_seconds.max(1)),
            config.logging.show_sensor_data,
            shutdown.clone(),
        )))
    } else {
        None
    };

    let state = AppState::new(gateway, query, config, offset);
    let served = serve_on(listener, state, shutdown).await;

    if let Some(task) = producer {
        if served.is_err() {
            task.abort();
        }
        let _ = task.await;
    }
    served
}

pub async fn bind(addr: &str) -> Result<TcpListener> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| anyhow!("failed to bind {}: {}", addr, e))?;
    tracing::info!("[SERVER] ✓ Listening on http://{}", listener.local_addr()?);
    Ok(listener)
}

/// serve until the shutdown signal fires
async fn serve_on(listener: TcpListener, state: AppState, mut shutdown: watch::Receiver<bool>) -> Result<()> {
    tracing::info!("[SERVER] ✓ Endpoint: POST /api/sensor/data");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown::wait(&mut shutdown).await })
        .await?;
    tracing::info!("[SERVER] Stopped");
    Ok(())
}

async fn home_handler() -> &'static str {
    LIVENESS_MESSAGE
}

async fn ingest_handler(State(state): State<AppState>, body: Bytes) -> Response {
    let result = match ingest::parse_body(&body) {
        Ok(payload) => state.gateway.receive(payload).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(ack) => (StatusCode::CREATED, Json(ack)).into_response(),
        Err(e) => {
            tracing::warn!("[INGEST] ⚠ rejected: {}", e);
            error_response(&e)
        }
    }
}

fn error_response(e: &IngestError) -> Response {
    let status =
        StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(serde_json::json!({ "error": e.to_string() }))).into_response()
}

#[derive(Debug, Deserialize)]
struct WindowParams {
    limit: Option<usize>,
}

impl WindowParams {
    fn limit(&self, config: &HostConfig) -> usize {
        self.limit
            .unwrap_or_else(|| config.history_limit())
            .clamp(1, MAX_HISTORY_LIMIT)
    }
}

/// json window for programmatic access
async fn window_handler(
    State(state): State<AppState>,
    Query(params): Query<WindowParams>,
) -> impl IntoResponse {
    let limit = params.limit(&state.config);
    Json(state.query.window_async(limit).await)
}

/// raw rows as a downloadable json file
async fn export_handler(
    State(state): State<AppState>,
    Query(params): Query<WindowParams>,
) -> impl IntoResponse {
    let limit = params.limit(&state.config);
    let rows: Vec<WindowRow> = state.query.window_async(limit).await.rows;
    (
        [(header::CONTENT_DISPOSITION, r#"attachment; filename="sensor_data.json""#)],
        Json(rows),
    )
}

async fn dashboard_handler(State(state): State<AppState>) -> Html<String> {
    let window = state.query.window_async(state.config.history_limit()).await;
    let mut dash = state.dashboard.write().await;
    dash.refresh(window);
    Html(dashboard::render_html(&dash, &state.config, &state.offset))
}
