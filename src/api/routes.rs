//! HTTP route handlers.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        Json,
    },
    routing::get,
    Router,
};
use futures::stream::Stream;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::agents::{RunContext, RunStatus};
use crate::config::Config;
use crate::pipeline::ResearchPipeline;

use super::types::*;

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

/// One hosted run: its context is the only place its status lives.
#[derive(Debug, Clone)]
pub struct RunHandle {
    pub context: RunContext,
}

/// Runs kept in memory before finished ones are evicted.
pub const DEFAULT_MAX_RETAINED_RUNS: usize = 200;

/// Shared application state.
pub struct AppState {
    pub pipeline: Arc<ResearchPipeline>,
    pub runs: RwLock<HashMap<Uuid, RunHandle>>,
    max_retained_runs: usize,
}

impl AppState {
    pub fn new(pipeline: ResearchPipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            runs: RwLock::new(HashMap::new()),
            max_retained_runs: DEFAULT_MAX_RETAINED_RUNS,
        }
    }

    /// Keep at most `max` runs; only finished runs are ever evicted.
    pub fn with_max_retained_runs(mut self, max: usize) -> Self {
        self.max_retained_runs = max.max(1);
        self
    }

    /// Register a new run, evicting the oldest finished runs to make room.
    async fn insert_run(&self, handle: RunHandle) {
        let mut runs = self.runs.write().await;

        if runs.len() >= self.max_retained_runs {
            let mut finished = Vec::new();
            for (id, existing) in runs.iter() {
                let status = existing.context.status().await;
                if status.stage.is_terminal() {
                    finished.push((status.updated_at, *id));
                }
            }
            finished.sort();

            let excess = runs.len() + 1 - self.max_retained_runs;
            for (_, id) in finished.into_iter().take(excess) {
                tracing::debug!(run_id = %id, "Evicting finished run");
                runs.remove(&id);
            }
        }

        runs.insert(handle.context.run_id, handle);
    }

    async fn handle(&self, id: Uuid) -> Result<RunHandle, ApiError> {
        self.runs
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| api_error(StatusCode::NOT_FOUND, format!("Run {} not found", id)))
    }
}

/// Build the application router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/research", get(list_research).post(create_research))
        .route("/api/research/:id", get(get_research))
        .route("/api/research/:id/stream", get(stream_research))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let state = Arc::new(AppState::new(ResearchPipeline::from_config(&config)));
    let addr = format!("{}:{}", config.host, config.port);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    tracing::info!("Shutdown signal received, stopping server");
}

/// Health check endpoint.
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Validate the request and start a run in the background.
async fn create_research(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateResearchRequest>,
) -> Result<Json<CreateResearchResponse>, ApiError> {
    let (topic, email) = req
        .validate()
        .map_err(|msg| api_error(StatusCode::BAD_REQUEST, msg))?;

    let context = RunContext::new(topic.clone(), email);
    let id = context.run_id;
    let status = context.status().await.stage;

    state
        .insert_run(RunHandle {
            context: context.clone(),
        })
        .await;

    tracing::info!(run_id = %id, "Starting research run for '{}'", topic);

    let pipeline = Arc::clone(&state.pipeline);
    let run_context = context.clone();
    let task = tokio::spawn(async move {
        // The outcome is recorded on the context.
        let _ = pipeline.run(&topic, &run_context, true).await;
    });

    // A panicking run must still reach a terminal stage.
    tokio::spawn(async move {
        if let Err(e) = task.await {
            context
                .fail(format!("Run task ended abnormally: {}", e))
                .await;
        }
    });

    Ok(Json(CreateResearchResponse { id, status }))
}

/// Get one run's status.
async fn get_research(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<RunStatus>, ApiError> {
    let handle = state.handle(id).await?;
    Ok(Json(handle.context.status().await))
}

/// List all runs, most recent first.
async fn list_research(State(state): State<Arc<AppState>>) -> Json<Vec<RunStatus>> {
    let handles: Vec<RunHandle> = state.runs.read().await.values().cloned().collect();
    let mut statuses = Vec::with_capacity(handles.len());
    for handle in handles {
        statuses.push(handle.context.status().await);
    }
    statuses.sort_by(|a, b| b.started_at.cmp(&a.started_at));
    Json(statuses)
}

/// Stream a run's status via SSE until it is terminal.
async fn stream_research(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, ApiError> {
    let handle = state.handle(id).await?;

    let stream = async_stream::stream! {
        let mut last: Option<RunStatus> = None;

        loop {
            let status = handle.context.status().await;

            if last.as_ref() != Some(&status) {
                let terminal = status.stage.is_terminal();
                let event = Event::default()
                    .event(if terminal { "done" } else { "status" })
                    .json_data(&status);
                yield event;
                if terminal {
                    break;
                }
                last = Some(status);
            }

            tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
        }
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
