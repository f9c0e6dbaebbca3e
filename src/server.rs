use crate::config::ColumnOverrides;
use crate::error::CleanerError;
use crate::pipeline::{ProspectCleaner, RunSummary};
use axum::{
    http::{Method, StatusCode},
    response::{IntoResponse, Json},
    routing::{get, post},
    Extension, Router,
};
use hyper::Server;
use metrics_exporter_prometheus::PrometheusHandle;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

/// Shared by every handler
pub struct AppState {
    pub cleaner: ProspectCleaner,
    pub metrics: Option<PrometheusHandle>,
}

#[derive(Debug, Deserialize)]
pub struct CleanRequest {
    pub input_path: String,
    pub output_path: String,
    #[serde(default)]
    pub columns: Option<ColumnOverrides>,
}

#[derive(Debug, Serialize)]
pub struct CleanResponse {
    pub message: String,
    pub summary: RunSummary,
}

async fn root() -> impl IntoResponse {
    Json(serde_json::json!({ "message": "Prospect Cleaner API is running." }))
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "prospect-cleaner",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn metrics_handler(Extension(state): Extension<Arc<AppState>>) -> impl IntoResponse {
    match &state.metrics {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            "metrics recorder not installed".to_string(),
        ),
    }
}

fn error_body(status: StatusCode, message: String) -> axum::response::Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}

async fn clean_prospects(
    Extension(state): Extension<Arc<AppState>>,
    Json(request): Json<CleanRequest>,
) -> axum::response::Response {
    let input = Path::new(&request.input_path);
    let output = Path::new(&request.output_path);

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        if let Err(e) = tokio::fs::create_dir_all(parent).await {
            error!("Cannot create output directory {}: {}", parent.display(), e);
            return error_body(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Cannot create output directory: {e}"),
            );
        }
    }

    match state
        .cleaner
        .run(input, output, request.columns.as_ref())
        .await
    {
        Ok(summary) => Json(CleanResponse {
            message: format!(
                "Prospect cleaning finished. Input: {}, Output: {}",
                request.input_path, request.output_path
            ),
            summary,
        })
        .into_response(),
        Err(e @ CleanerError::Load { .. }) => {
            error!("Input file could not be loaded: {}", e);
            error_body(StatusCode::BAD_REQUEST, e.to_string())
        }
        Err(e @ CleanerError::UnknownColumn(_)) => {
            error!("Input file is missing a column: {}", e);
            error_body(StatusCode::BAD_REQUEST, e.to_string())
        }
        Err(e) => {
            error!("Cleaning failed: {}", e);
            error_body(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("An error occurred: {e}"),
            )
        }
    }
}

/// Router with every route, CORS open for GET/POST
pub fn create_server(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/metrics", get(metrics_handler))
        .route("/clean_prospects", post(clean_prospects))
        .route("/clean_prospects/", post(clean_prospects))
        .layer(Extension(state))
        .layer(ServiceBuilder::new().layer(cors))
}

/// Serve on 0.0.0.0:`port` until the process stops
pub async fn start_server(state: Arc<AppState>, port: u16) -> Result<(), hyper::Error> {
    let app = create_server(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    info!("HTTP server listening on {}", addr);
    println!("🚀 HTTP server running on http://localhost:{port}");
    println!("💚 Health check: http://localhost:{port}/health");
    println!("🧹 Clean:        POST http://localhost:{port}/clean_prospects");

    Server::bind(&addr).serve(app.into_make_service()).await
}
