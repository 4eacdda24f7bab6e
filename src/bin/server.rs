use std::collections::VecDeque;
use std::env;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use anyhow::{Context, Result};
use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use imgpress_rs::callback::{callback_custom, callback_id};
use imgpress_rs::{
    Client, ClientConfig, ImageSource, Options, Transport, compression_types, decode_callback,
};

/// Default number of received callbacks kept in memory
const DEFAULT_MAX_CALLBACKS: usize = 1000;

/// Server configuration
struct ServerConfig {
    port: u16,
    /// Oldest callbacks are dropped once this many are stored
    max_callbacks: usize,
}

impl ServerConfig {
    fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            max_callbacks: env::var("MAX_STORED_CALLBACKS")
                .ok()
                .and_then(|n| n.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(DEFAULT_MAX_CALLBACKS),
        }
    }
}

/// Received callbacks, oldest first, capped at `capacity`
struct CallbackStore {
    entries: VecDeque<Value>,
    capacity: usize,
}

impl CallbackStore {
    fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// Store `payload`, returning how many old entries were evicted
    fn push(&mut self, payload: Value) -> usize {
        let mut evicted = 0;
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
            evicted += 1;
        }
        self.entries.push_back(payload);
        evicted
    }

    fn snapshot(&self) -> Vec<Value> {
        self.entries.iter().cloned().collect()
    }
}

/// Application state shared across all requests
struct AppState<T: Transport> {
    client: Arc<Client<T>>,
    callbacks: Arc<RwLock<CallbackStore>>,
    metrics: Arc<Metrics>,
}

impl<T: Transport> Clone for AppState<T> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            callbacks: self.callbacks.clone(),
            metrics: self.metrics.clone(),
        }
    }
}

/// Server metrics
struct Metrics {
    jobs_submitted: AtomicU64,
    jobs_failed: AtomicU64,
    callbacks_received: AtomicU64,
    callbacks_evicted: AtomicU64,
    start_time: Instant,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "server=info,imgpress_rs=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env();

    // IMGPRESS_CALLBACK_URL should point at this server's /callback route
    let client_config = ClientConfig::from_env().context("Failed to read client configuration")?;
    if client_config.defaults.get("callback").is_none() {
        tracing::warn!("IMGPRESS_CALLBACK_URL is not set, /api/compress will reject jobs");
    }

    tracing::info!("Initializing ImgPress client...");
    let client = Arc::new(
        Client::with_config(client_config)
            .await
            .context("Failed to initialize ImgPress client")?,
    );
    tracing::info!("ImgPress client initialized successfully");

    let app = build_app(client, config.max_callbacks);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server shut down gracefully");
    Ok(())
}

/// Build the Axum application with routes and middleware
fn build_app<T: Transport + 'static>(client: Arc<Client<T>>, max_callbacks: usize) -> Router {
    let metrics = Arc::new(Metrics {
        jobs_submitted: AtomicU64::new(0),
        jobs_failed: AtomicU64::new(0),
        callbacks_received: AtomicU64::new(0),
        callbacks_evicted: AtomicU64::new(0),
        start_time: Instant::now(),
    });

    let state = AppState {
        client,
        callbacks: Arc::new(RwLock::new(CallbackStore::new(max_callbacks))),
        metrics,
    };

    Router::new()
        .route("/health", get(health_check))
        // Webhook target for wait=false jobs
        .route("/callback", post(receive_callback::<T>))
        .route("/api/callbacks", get(list_callbacks::<T>))
        .route("/api/compress", post(submit_job::<T>))
        .route("/api/metrics", get(get_metrics::<T>))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

/// Receive a job result delivered by the service
async fn receive_callback<T: Transport + 'static>(
    State(state): State<AppState<T>>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let payload = decode_callback(&body).map_err(|e| {
        tracing::warn!("Rejected callback body: {}", e);
        ApiError::BadRequest(e.to_string())
    })?;

    tracing::info!(
        id = callback_id(&payload).unwrap_or("-"),
        has_custom = callback_custom(&payload).is_some(),
        "Callback received"
    );

    state
        .metrics
        .callbacks_received
        .fetch_add(1, Ordering::Relaxed);
    let evicted = state.callbacks.write().await.push(payload);
    if evicted > 0 {
        tracing::debug!(evicted, "Callback store full, dropped oldest entries");
        state
            .metrics
            .callbacks_evicted
            .fetch_add(evicted as u64, Ordering::Relaxed);
    }

    Ok(Json(serde_json::json!({ "success": true })))
}

/// Most recently received callbacks, oldest first
async fn list_callbacks<T: Transport + 'static>(
    State(state): State<AppState<T>>,
) -> Json<Vec<Value>> {
    Json(state.callbacks.read().await.snapshot())
}

#[derive(Deserialize)]
struct SubmitRequest {
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    images: Vec<String>,
    #[serde(rename = "type", default = "default_compression_type")]
    compression_type: String,
    #[serde(default)]
    options: Options,
}

fn default_compression_type() -> String {
    compression_types::LOSSY.to_string()
}

/// Submit a deferred job whose result comes back through /callback
async fn submit_job<T: Transport + 'static>(
    State(state): State<AppState<T>>,
    Json(request): Json<SubmitRequest>,
) -> Result<Json<Value>, ApiError> {
    let source = match (request.image, request.images) {
        (Some(image), _) => ImageSource::Single(image),
        (None, images) if !images.is_empty() => ImageSource::Multiple(images),
        _ => {
            return Err(ApiError::BadRequest(
                "image or images is required".to_string(),
            ));
        }
    };

    tracing::info!(
        "Submitting {} job for {:?}",
        request.compression_type,
        source
    );

    let options = request.options.wait(false);
    let response = state
        .client
        .compress(source, &request.compression_type, options)
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    match response {
        Some(response) => {
            state.metrics.jobs_submitted.fetch_add(1, Ordering::Relaxed);
            Ok(Json(response))
        }
        None => {
            state.metrics.jobs_failed.fetch_add(1, Ordering::Relaxed);
            let error = state
                .client
                .last_error()
                .map(|e| e.to_string())
                .unwrap_or_else(|| "unknown error".to_string());
            tracing::error!("Job submission failed: {}", error);
            Err(ApiError::Upstream(error))
        }
    }
}

async fn get_metrics<T: Transport + 'static>(
    State(state): State<AppState<T>>,
) -> Json<MetricsResponse> {
    Json(MetricsResponse {
        jobs_submitted: state.metrics.jobs_submitted.load(Ordering::Relaxed),
        jobs_failed: state.metrics.jobs_failed.load(Ordering::Relaxed),
        callbacks_received: state.metrics.callbacks_received.load(Ordering::Relaxed),
        callbacks_evicted: state.metrics.callbacks_evicted.load(Ordering::Relaxed),
        uptime_seconds: state.metrics.start_time.elapsed().as_secs(),
    })
}

#[derive(Serialize)]
struct MetricsResponse {
    jobs_submitted: u64,
    jobs_failed: u64,
    callbacks_received: u64,
    callbacks_evicted: u64,
    uptime_seconds: u64,
}

/// API error types
enum ApiError {
    BadRequest(String),
    Upstream(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Upstream(msg) => (StatusCode::BAD_GATEWAY, msg),
        };

        let body = Json(serde_json::json!({
            "success": false,
            "error": message
        }));

        (status, body).into_response()
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, shutting down gracefully...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down gracefully...");
        }
    }
}
