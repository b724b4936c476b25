//! Event log API endpoints
//!
//! Retrieval, export, clearing and error reports over the backend event log.

use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, StatusCode},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;

use harness_log::{parse_limit, CurrentError, ErrorReport, ExportFormat, LogEntry, LogFilter};

use crate::error::Result;
use crate::logging::details;
use crate::state::AppState;

/// Prefix of exported attachment filenames
pub const EXPORT_PREFIX: &str = "backend";

const DEFAULT_LIMIT: i64 = 100;

/// Create the logs router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_logs).delete(clear_logs))
        .route("/export", get(export_logs))
        .route("/report", post(generate_report))
}

/// Raw query parameters. Everything is taken as text so that a malformed
/// value narrows or clamps the result instead of rejecting the request.
#[derive(Debug, Default, Deserialize)]
pub struct LogsQuery {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub limit: Option<String>,
}

impl From<LogsQuery> for LogFilter {
    fn from(query: LogsQuery) -> Self {
        LogFilter {
            session_id: query.session_id.filter(|s| !s.is_empty()),
            level: query.level.filter(|l| !l.is_empty()),
            limit: Some(
                query
                    .limit
                    .as_deref()
                    .and_then(parse_limit)
                    .unwrap_or(DEFAULT_LIMIT),
            ),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LogsResponse {
    pub logs: Vec<LogEntry>,
    pub total: usize,
    pub session_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    #[serde(default)]
    pub format: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ClearResponse {
    pub message: &'static str,
}

/// Optional body of a report request
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRequest {
    #[serde(default)]
    pub current_error: Option<CurrentError>,
}

/// Retrieve logs with optional filtering
async fn get_logs(
    State(state): State<AppState>,
    Query(query): Query<LogsQuery>,
) -> Json<LogsResponse> {
    let logger = state.logger();
    let logs = logger.query(&query.into());

    Json(LogsResponse {
        total: logs.len(),
        logs,
        session_id: logger.session_id(),
    })
}

/// Export the whole buffer as a downloadable attachment
async fn export_logs(
    State(state): State<AppState>,
    Query(query): Query<ExportQuery>,
) -> Result<Response> {
    let format = match query.format.as_deref() {
        Some(format) => format.parse::<ExportFormat>()?,
        None => ExportFormat::default(),
    };

    let payload = state.logger().export(format);
    let filename = format.attachment_filename(EXPORT_PREFIX, Utc::now());

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, format.content_type())
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename={}", filename),
        )
        .body(Body::from(payload))?)
}

/// Clear all logs from memory
async fn clear_logs(State(state): State<AppState>) -> Json<ClearResponse> {
    let logger = state.logger();
    logger.clear();
    logger.info("Logs cleared by user request", None);

    Json(ClearResponse {
        message: "Logs cleared successfully",
    })
}

/// Generate a diagnostic error report
async fn generate_report(
    State(state): State<AppState>,
    request: Option<Json<ReportRequest>>,
) -> Json<ErrorReport> {
    let current_error = request.and_then(|Json(request)| request.current_error);

    let logger = state.logger();
    let report = logger.error_report(current_error);
    logger.info(
        "Error report generated",
        details(json!({ "report_id": report.report_id })),
    );

    Json(report)
}
