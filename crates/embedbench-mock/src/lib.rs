//! Mock embedding service speaking the `/v1/embed` contract

use std::collections::hash_map::DefaultHasher;
use std::future::Future;
use std::hash::{Hash, Hasher};
use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounter, Registry, TextEncoder};
use rand::{rngs::StdRng, Rng, SeedableRng};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

pub mod batch;

use batch::{BatchSettings, EmbedJob};

pub const DEFAULT_DIM: usize = 384;
pub const DEFAULT_MAX_BATCH_SIZE: usize = 16;
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_millis(5);

/// How the server answers `/v1/embed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MockMode {
    #[default]
    Ok,
    /// `200` with `{}`.
    MissingEmbedding,
    /// `200` with a plain-text body.
    NotJson,
    Status(u16),
}

#[derive(Debug, Clone)]
pub struct MockConfig {
    pub dim: usize,
    /// Fixed processing delay, paid once per batch.
    pub latency: Duration,
    pub max_batch_size: usize,
    pub max_wait: Duration,
    pub mode: MockMode,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            dim: DEFAULT_DIM,
            latency: Duration::ZERO,
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            max_wait: DEFAULT_MAX_WAIT,
            mode: MockMode::Ok,
        }
    }
}

#[derive(Clone)]
struct AppState {
    mode: MockMode,
    jobs: mpsc::Sender<EmbedJob>,
    registry: Registry,
    requests_total: IntCounter,
}

static ENCODER: Lazy<TextEncoder> = Lazy::new(TextEncoder::new);

/// Each router gets its own registry, so several servers can live in one process.
/// Starts the batch collector, so it must be called inside a tokio runtime.
pub fn app(config: MockConfig) -> prometheus::Result<Router> {
    let registry = Registry::new();
    let requests_total = IntCounter::new("embed_requests_total", "Total number of /v1/embed requests")?;
    let batches_total = IntCounter::new("embed_batches_total", "Total number of batches processed")?;
    registry.register(Box::new(requests_total.clone()))?;
    registry.register(Box::new(batches_total.clone()))?;
    let jobs = batch::start(
        BatchSettings {
            max_batch_size: config.max_batch_size,
            max_wait: config.max_wait,
            latency: config.latency,
            dim: config.dim,
        },
        batches_total,
    );
    let state = AppState { mode: config.mode, jobs, registry, requests_total };

    Ok(Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/metrics", get(metrics))
        .route("/v1/embed", post(embed))
        .with_state(state))
}

/// Serves until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, config: MockConfig, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = app(config).map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(target: "mock", "listening on http://{}", addr);
    }
    axum::serve(listener, app).with_graceful_shutdown(shutdown).await
}

/// Binds an ephemeral port on localhost and serves in the background.
pub async fn spawn(config: MockConfig) -> std::io::Result<(SocketAddr, JoinHandle<std::io::Result<()>>)> {
    let listener = TcpListener::bind(("127.0.0.1", 0)).await?;
    let addr = listener.local_addr()?;
    let handle = tokio::spawn(serve(listener, config, std::future::pending()));
    Ok((addr, handle))
}

/// Deterministic unit-length vector for `text`.
pub fn embed_text(text: &str, dim: usize) -> Vec<f32> {
    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    let mut rng = StdRng::seed_from_u64(hasher.finish());
    let mut v: Vec<f32> = (0..dim).map(|_| rng.gen_range(-1.0_f32..1.0)).collect();
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter_mut().for_each(|x| *x /= norm);
    }
    v
}

#[derive(serde::Deserialize)]
struct EmbedRequest {
    text: String,
}

#[derive(serde::Serialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

async fn embed(State(state): State<AppState>, Json(req): Json<EmbedRequest>) -> Response {
    state.requests_total.inc();
    tracing::debug!(target: "mock", chars = req.text.len(), "embed request");
    let (respond, reply) = oneshot::channel();
    if state.jobs.send(EmbedJob { text: req.text, respond }).await.is_err() {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    let Ok(embedding) = reply.await else {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    };
    match state.mode {
        MockMode::Ok => Json(EmbedResponse { embedding }).into_response(),
        MockMode::MissingEmbedding => Json(serde_json::json!({})).into_response(),
        MockMode::NotJson => (StatusCode::OK, "embedding unavailable").into_response(),
        MockMode::Status(code) => StatusCode::from_u16(code)
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            .into_response(),
    }
}

async fn metrics(State(state): State<AppState>) -> Response {
    let mut buffer = Vec::new();
    if let Err(e) = ENCODER.encode(&state.registry.gather(), &mut buffer) {
        return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
    }
    ([("content-type", ENCODER.format_type().to_string())], buffer).into_response()
}
