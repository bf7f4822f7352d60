//! platescan REST API server
//!
//! Thin HTTP wrapper over the OCR engine: callers post base64 images and
//! get back plain text plus a confidence score. All pipeline failures are
//! absorbed into degraded-confidence responses; only malformed requests
//! produce HTTP errors.

use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use base64::{engine::general_purpose, Engine as _};
use ocr_core::QualityReport;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use vision_bridge::{CancelFlag, Engine, EngineConfig, RecognitionOrigin, VisionClient, VisionConfig};

struct AppState {
    engine: Engine<VisionClient>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    // API key is environment-provided configuration; without it the server
    // still runs, serving the local heuristic pipeline only.
    let remote = match std::env::var("VISION_API_KEY") {
        Ok(key) if !key.is_empty() => match VisionClient::new(VisionConfig::with_api_key(key)) {
            Ok(client) => Some(client),
            Err(err) => {
                tracing::warn!("failed to build vision client: {err}");
                None
            }
        },
        _ => {
            tracing::warn!("VISION_API_KEY not set, serving local pipeline only");
            None
        }
    };

    let state = Arc::new(AppState {
        engine: Engine::new(remote, EngineConfig::default()),
    });

    let app = Router::new()
        .route("/health", get(health_check))
        .route("/api/quality", post(assess_quality))
        .route("/api/ocr", post(run_ocr))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = "127.0.0.1:3000";
    tracing::info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}

async fn health_check() -> &'static str {
    "OK"
}

async fn assess_quality(
    State(_state): State<Arc<AppState>>,
    Json(request): Json<QualityRequest>,
) -> Result<Json<QualityReport>, StatusCode> {
    let bytes = general_purpose::STANDARD
        .decode(&request.image_b64)
        .map_err(|_| StatusCode::BAD_REQUEST)?;
    Ok(Json(ocr_core::quality::assess_bytes(&bytes)))
}

async fn run_ocr(
    State(state): State<Arc<AppState>>,
    Json(request): Json<OcrRequest>,
) -> Result<Json<OcrResponse>, StatusCode> {
    let request_id = uuid::Uuid::new_v4();
    let bytes = general_purpose::STANDARD
        .decode(&request.image_b64)
        .map_err(|_| StatusCode::BAD_REQUEST)?;

    let run = state
        .engine
        .run_with_hints(&bytes, request.language_hints.as_deref(), &CancelFlag::new())
        .await;

    tracing::info!(
        %request_id,
        confidence = run.outcome.confidence,
        attempts = run.attempts,
        "ocr request complete"
    );

    Ok(Json(OcrResponse {
        request_id: request_id.to_string(),
        text: run.outcome.text,
        confidence: run.outcome.confidence,
        origin: run.origin,
        attempts: run.attempts,
        quality: run.quality,
    }))
}

#[derive(Deserialize)]
struct QualityRequest {
    image_b64: String,
}

#[derive(Deserialize)]
struct OcrRequest {
    image_b64: String,
    language_hints: Option<Vec<String>>,
}

#[derive(Serialize)]
struct OcrResponse {
    request_id: String,
    text: String,
    confidence: f32,
    origin: RecognitionOrigin,
    attempts: u32,
    quality: QualityReport,
}
