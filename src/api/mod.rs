// HTTP surface: the two trigger adapters plus monitoring endpoints

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use image::RgbImage;
use std::fmt::Display;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::core::config::Config;
use crate::core::types::{AnnotateRequest, BlobTriggerRequest, InvokeResponse, StatusResponse};
use crate::orchestration::AnnotationPipeline;
use crate::utils::{decode_base64_image, decode_rgb_async, Metrics};

pub const ANNOTATE_ROUTE: &str = "/api/annotatewalls";
pub const BLOB_TRIGGER_ROUTE: &str = "/blobtrigger";

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub pipeline: AnnotationPipeline,
}

impl AppState {
    pub fn new(config: Arc<Config>, pipeline: AnnotationPipeline) -> Self {
        Self { config, pipeline }
    }

    fn metrics(&self) -> &Metrics {
        self.pipeline.metrics()
    }
}

/// Build the router with every route and layer.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let body_limit = state.config.server.max_body_bytes;

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/metrics", get(metrics_endpoint))
        .route("/stats", get(stats_endpoint))
        .route(ANNOTATE_ROUTE, post(annotate_walls))
        .route(BLOB_TRIGGER_ROUTE, post(blob_trigger))
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

async fn root() -> &'static str {
    "Wall line annotator"
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Prometheus metrics endpoint
async fn metrics_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [("Content-Type", "text/plain; version=0.0.4")],
        state.metrics().to_prometheus(),
    )
}

/// Detailed statistics endpoint (JSON)
async fn stats_endpoint(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    let snapshot = state.metrics().snapshot();
    serde_json::to_value(snapshot)
        .map(Json)
        .map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to serialize metrics: {}", e),
            )
        })
}

fn internal_error(e: impl Display) -> (StatusCode, String) {
    (StatusCode::INTERNAL_SERVER_ERROR, format!("Error: {}", e))
}

/// Decode to a raster; failures are logged and become `None`.
async fn decode_or_skip(bytes: Vec<u8>, name: &str) -> Option<RgbImage> {
    match decode_rgb_async(bytes).await {
        Ok(image) => Some(image),
        Err(e) => {
            warn!("Failed to decode image {}: {}", name, e);
            None
        }
    }
}

/// HTTP adapter
///
/// # Request Format:
/// - JSON `{"base64": "...", "lines": [[x1, y1, x2, y2], ...]?, "name": "..."?}`
/// - `base64` may carry a data-URL header
///
/// # Response:
/// - 200 `{"status": "done"}`, or 500 `Error: <message>` as plain text
async fn annotate_walls(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<StatusResponse>, (StatusCode, String)> {
    state.metrics().record_endpoint_request(ANNOTATE_ROUTE);
    info!("Received annotate request ({} bytes)", body.len());

    let request: AnnotateRequest = serde_json::from_slice(&body).map_err(|e| {
        error!("Invalid annotate request: {}", e);
        state.metrics().record_failure();
        internal_error(e)
    })?;

    let bytes = decode_base64_image(&request.base64).map_err(|e| {
        error!("Invalid base64 payload: {}", e);
        state.metrics().record_failure();
        internal_error(e)
    })?;

    let name = request
        .name
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| state.config.trigger.default_blob_name.clone());
    let image = decode_or_skip(bytes, &name).await;

    state
        .pipeline
        .annotate_and_save(image, &name, request.lines)
        .await
        .map_err(|e| {
            error!("Annotation of {} failed: {}", name, e);
            internal_error(e)
        })?;

    Ok(Json(StatusResponse::done()))
}

/// Storage-event adapter (Functions custom-handler invocation)
async fn blob_trigger(State(state): State<AppState>, body: Bytes) -> Response {
    state.metrics().record_endpoint_request(BLOB_TRIGGER_ROUTE);

    match handle_blob_trigger(&state, &body).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(message) => {
            error!("Blob trigger failed: {}", message);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(InvokeResponse::with_log(format!("Error: {}", message))),
            )
                .into_response()
        }
    }
}

/// Pipeline failures are counted by the pipeline; everything before it is counted here.
async fn handle_blob_trigger(state: &AppState, body: &[u8]) -> Result<InvokeResponse, String> {
    let rejected = |message: String| {
        state.metrics().record_failure();
        message
    };

    let request: BlobTriggerRequest = serde_json::from_slice(body)
        .map_err(|e| rejected(format!("invalid invocation payload: {}", e)))?;
    let name = request
        .blob_name()
        .filter(|n| !n.is_empty())
        .ok_or_else(|| rejected("invocation metadata has no blob name".to_string()))?
        .to_string();

    if state.config.trigger.skip_annotated_blobs && state.pipeline.is_annotated_name(&name) {
        info!("Skipping {}: already annotated", name);
        state.metrics().record_skip();
        return Ok(InvokeResponse::with_log(format!("Skipped {}: already annotated", name)));
    }

    info!("Processing blob {}", name);
    let bytes = decode_base64_image(&request.data.blob)
        .map_err(|e| rejected(format!("blob content of {} is not base64: {}", name, e)))?;
    let image = decode_or_skip(bytes, &name).await;

    let saved = state
        .pipeline
        .annotate_and_save(image, &name, None)
        .await
        .map_err(|e| e.to_string())?;

    Ok(match saved {
        Some(saved) => InvokeResponse::with_log(format!(
            "Saved {}/{} ({} segments)",
            saved.container, saved.key, saved.segment_count
        )),
        None => InvokeResponse::with_log(format!("Skipped {}: not a decodable image", name)),
    })
}
