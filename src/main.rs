//! # trajview-rs
//!
//! HTTP front for the trajectory normalizer.
//!
//! The frontend posts a dropped file here and gets back display-ready
//! timeline entries (single trajectory) or a sorted, summarized record list
//! (JSONL evaluation output).
//!
//! ## API Endpoints
//!
//! - `GET /health` - Server health check
//! - `POST /api/trajectory` - Normalize one JSON trajectory
//! - `POST /api/jsonl` - Parse, sort and summarize a JSONL file
//! - `GET /api/jsonl/settings` - Default sidebar settings and common sort fields
//! - `POST /api/upload` - Raw file upload, routed by the `x-filename` extension

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Query, State},
    http::HeaderMap,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{net::SocketAddr, sync::Arc, time::Instant};
use tower_http::services::ServeDir;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use trajview_rs::config::ServerConfig;
use trajview_rs::jsonl::{
    self, FieldSummary, SortDirection, SortFieldOption, ViewerSettings, COMMON_SORT_FIELDS,
};
use trajview_rs::{classify, normalize, StepInfo, TimelineEntry};

// ============================================================================
// App State
// ============================================================================

struct AppState {
    start_time: Instant, // Server start time for uptime tracking
}

// ============================================================================
// Health Endpoint
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    version: &'static str,
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: state.start_time.elapsed().as_secs(),
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ============================================================================
// Trajectory Endpoint
// ============================================================================

#[derive(Serialize)]
struct TrajectoryResponse {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    entries: Option<Vec<TimelineEntry>>,
    /// Display category per entry, same order as `entries`
    #[serde(skip_serializing_if = "Option::is_none")]
    steps: Option<Vec<StepInfo>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl TrajectoryResponse {
    fn ok(entries: Vec<TimelineEntry>) -> Self {
        let steps = entries.iter().map(classify).collect();
        Self {
            status: "ok",
            entries: Some(entries),
            steps: Some(steps),
            error: None,
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error",
            entries: None,
            steps: None,
            error: Some(message.into()),
        }
    }
}

fn trajectory_response(body: &[u8]) -> TrajectoryResponse {
    let input: Value = match serde_json::from_slice(body) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!("Rejected trajectory upload: {}", e);
            return TrajectoryResponse::error(format!("Invalid JSON: {}", e));
        }
    };

    match normalize(&input) {
        Ok(entries) => {
            tracing::info!("Normalized trajectory into {} entries", entries.len());
            TrajectoryResponse::ok(entries)
        }
        Err(e) => {
            tracing::warn!("Unrecognized trajectory: {}", e);
            TrajectoryResponse::error(e.to_string())
        }
    }
}

async fn post_trajectory(body: Bytes) -> Json<TrajectoryResponse> {
    Json(trajectory_response(&body))
}

// ============================================================================
// JSONL Endpoint
// ============================================================================

/// Query overrides for the sidebar settings; anything unset keeps its default.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JsonlQuery {
    sort_field: Option<String>,
    sort_direction: Option<SortDirection>,
    /// Comma separated field paths; empty means "no fields"
    display_fields: Option<String>,
    /// Include each record's converted timeline
    #[serde(default)]
    timeline: bool,
}

impl JsonlQuery {
    fn settings(&self) -> ViewerSettings {
        let mut settings = ViewerSettings::default();
        if let Some(field) = self.sort_field.as_deref().filter(|f| !f.trim().is_empty()) {
            settings.sort_field = field.trim().to_string();
        }
        if let Some(direction) = self.sort_direction {
            settings.sort_direction = direction;
        }
        if let Some(fields) = &self.display_fields {
            settings.display_fields = fields
                .split(',')
                .map(str::trim)
                .filter(|f| !f.is_empty())
                .map(str::to_string)
                .collect();
        }
        settings
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RecordView {
    line: usize,
    name: String,
    summary: Vec<FieldSummary>,
    fallback_summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    warning: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    /// The record minus its history, for the details pane
    details: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    timeline: Option<Vec<TimelineEntry>>,
}

#[derive(Serialize)]
struct JsonlResponse {
    status: &'static str,
    records: Vec<RecordView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn jsonl_response(body: &[u8], query: &JsonlQuery) -> JsonlResponse {
    let text = match std::str::from_utf8(body) {
        Ok(t) => t,
        Err(e) => {
            tracing::warn!("Rejected JSONL upload: {}", e);
            return JsonlResponse {
                status: "error",
                records: Vec::new(),
                error: Some(format!("File is not valid UTF-8: {}", e)),
            };
        }
    };

    let settings = query.settings();
    let records = jsonl::load_records(text, &settings);
    tracing::info!(
        "Loaded {} JSONL records sorted by {} ({:?})",
        records.len(),
        settings.sort_field,
        settings.sort_direction
    );

    let views: Vec<RecordView> = records
        .iter()
        .enumerate()
        .map(|(index, record)| RecordView {
            line: record.line(),
            name: jsonl::display_name(record, index),
            summary: jsonl::summarize(record, &settings.display_fields),
            fallback_summary: jsonl::fallback_summary(record),
            warning: record.warning(),
            error: record.error(),
            details: record.without_history(),
            timeline: query.timeline.then(|| jsonl::timeline_for_record(record)),
        })
        .collect();

    JsonlResponse {
        status: "ok",
        records: views,
        error: None,
    }
}

async fn post_jsonl(Query(query): Query<JsonlQuery>, body: Bytes) -> Json<JsonlResponse> {
    Json(jsonl_response(&body, &query))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonlSettingsResponse {
    status: &'static str,
    defaults: ViewerSettings,
    sort_fields: &'static [SortFieldOption],
}

async fn jsonl_settings() -> Json<JsonlSettingsResponse> {
    Json(JsonlSettingsResponse {
        status: "ok",
        defaults: ViewerSettings::default(),
        sort_fields: COMMON_SORT_FIELDS,
    })
}

// ============================================================================
// Upload Endpoint
// ============================================================================

#[derive(Serialize)]
#[serde(untagged)]
enum UploadResult {
    Trajectory(TrajectoryResponse),
    Jsonl(JsonlResponse),
}

#[derive(Serialize)]
struct UploadResponse {
    kind: &'static str,
    filename: String,
    #[serde(flatten)]
    result: UploadResult,
}

fn is_jsonl_filename(filename: &str) -> bool {
    filename.to_lowercase().ends_with(".jsonl")
}

async fn upload(
    headers: HeaderMap,
    Query(query): Query<JsonlQuery>,
    body: Bytes,
) -> Json<UploadResponse> {
    // Original filename from header, URL-encoded by the client
    let filename = headers
        .get("x-filename")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| urlencoding::decode(s).ok())
        .map(|s| s.into_owned())
        .unwrap_or_else(|| "trajectory.json".to_string());

    tracing::debug!("Upload {} ({} bytes)", filename, body.len());

    let (kind, result) = if is_jsonl_filename(&filename) {
        ("jsonl", UploadResult::Jsonl(jsonl_response(&body, &query)))
    } else {
        ("trajectory", UploadResult::Trajectory(trajectory_response(&body)))
    };

    Json(UploadResponse { kind, filename, result })
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("trajview_rs=info".parse().expect("valid log directive"))
            .add_directive("tower_http=info".parse().expect("valid log directive")))
        .init();

    let config = ServerConfig::default();
    let state = Arc::new(AppState {
        start_time: Instant::now(),
    });

    // Build router
    let app = Router::new()
        // Health
        .route("/health", get(health))
        // Normalization
        .route("/api/trajectory", post(post_trajectory))
        .route("/api/jsonl", post(post_jsonl))
        .route("/api/jsonl/settings", get(jsonl_settings))
        .route("/api/upload", post(upload))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        // Static files
        .fallback_service(ServeDir::new(&config.static_dir).append_index_html_on_directories(true))
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("trajview-rs v{} listening on {}", env!("CARGO_PKG_VERSION"), addr);
    tracing::info!("Serving static files from {}", config.static_dir.display());

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };
    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
