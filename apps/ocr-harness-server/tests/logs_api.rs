//! HTTP tests for the event log API

use axum::http::{header, StatusCode};
use axum_test::TestServer;
use serde_json::{json, Value};

use harness_log::{Details, LogConfig, LogEntry, LogFilter, LogLevel};
use ocr_harness_server::config::Config;
use ocr_harness_server::logging::{details, EventLogger};
use ocr_harness_server::state::AppState;

fn setup() -> (TestServer, EventLogger) {
    let logger = EventLogger::with_environment(LogConfig::default(), Details::new());
    let state = AppState::new(Config::default(), logger.clone());
    let server = TestServer::new(ocr_harness_server::app(state)).unwrap();
    (server, logger)
}

/// Entries recorded by the test itself, without the request middleware's
fn recorded(logger: &EventLogger) -> Vec<LogEntry> {
    logger
        .query(&LogFilter::default())
        .into_iter()
        .filter(|e| e.component != "middleware")
        .collect()
}

#[tokio::test]
async fn test_root_and_health() {
    let (server, logger) = setup();

    let root: Value = server.get("/").await.json();
    assert_eq!(root["name"], json!("OCR-harness API"));
    assert_eq!(root["status"], json!("running"));

    let health = server.get("/health").await;
    health.assert_status_ok();
    let body: Value = health.json();
    assert_eq!(body["status"], json!("healthy"));
    assert!(body["timestamp"].is_string());
    assert!(logger.count() > 0);
}

#[tokio::test]
async fn test_get_logs_filters_by_level() {
    let (server, logger) = setup();
    logger.info("a", None);
    logger.error("b", details(json!({ "password": "x", "filename": "scan.pdf" })));
    logger.error("c", None);

    let response = server
        .get("/api/logs")
        .add_query_param("level", "ERROR")
        .await;
    response.assert_status_ok();

    let body: Value = response.json();
    let messages: Vec<&str> = body["logs"]
        .as_array()
        .unwrap()
        .iter()
        .map(|entry| entry["message"].as_str().unwrap())
        .collect();
    assert_eq!(messages, vec!["b", "c"]);
    assert_eq!(body["total"], json!(2));
    assert_eq!(body["session_id"], json!(logger.session_id()));
    assert_eq!(body["logs"][0]["details"], json!({ "filename": "scan.pdf" }));
    assert_eq!(body["logs"][0]["source"], json!("BACKEND"));
}

#[tokio::test]
async fn test_get_logs_tolerates_bad_filters() {
    let (server, logger) = setup();
    logger.info("a", None);

    let unknown_level: Value = server
        .get("/api/logs")
        .add_query_param("level", "VERBOSE")
        .await
        .json();
    assert_eq!(unknown_level["total"], json!(0));

    let negative_limit: Value = server
        .get("/api/logs")
        .add_query_param("limit", "-5")
        .await
        .json();
    assert_eq!(negative_limit["total"], json!(1));
}

#[tokio::test]
async fn test_get_logs_tolerates_malformed_limit() {
    let (server, logger) = setup();
    logger.info("a", None);

    for raw in ["abc", ""] {
        let response = server.get("/api/logs").add_query_param("limit", raw).await;
        response.assert_status_ok();

        let body: Value = response.json();
        let messages: Vec<&str> = body["logs"]
            .as_array()
            .unwrap()
            .iter()
            .map(|entry| entry["message"].as_str().unwrap())
            .collect();
        assert!(messages.contains(&"a"), "limit={raw:?} dropped entries: {messages:?}");
    }

    let fractional = server.get("/api/logs").add_query_param("limit", "2.5").await;
    fractional.assert_status_ok();
    let body: Value = fractional.json();
    assert_eq!(body["total"], json!(2));
}

#[tokio::test]
async fn test_get_logs_by_session() {
    let (server, logger) = setup();
    logger.info("a", None);

    let other: Value = server
        .get("/api/logs")
        .add_query_param("session_id", "another-session")
        .await
        .json();
    assert_eq!(other["total"], json!(0));

    let own: Value = server
        .get("/api/logs")
        .add_query_param("session_id", logger.session_id())
        .await
        .json();
    assert!(own["total"].as_u64().unwrap() >= 1);
}

#[tokio::test]
async fn test_export_json() {
    let (server, logger) = setup();
    logger.warning("slow page render", details(json!({ "page": 4 })));

    let response = server
        .get("/api/logs/export")
        .add_query_param("format", "json")
        .await;
    response.assert_status_ok();

    let disposition = response.header(header::CONTENT_DISPOSITION);
    let disposition = disposition.to_str().unwrap();
    assert!(disposition.starts_with("attachment; filename=backend-logs-"));
    assert!(disposition.ends_with(".json"));

    let exported: Vec<LogEntry> = serde_json::from_str(&response.text()).unwrap();
    assert!(exported.iter().any(|e| e.message == "slow page render"));
}

#[tokio::test]
async fn test_export_txt() {
    let (server, logger) = setup();
    logger.record_from("process", LogLevel::Error, "Processing failed", None);

    let response = server
        .get("/api/logs/export")
        .add_query_param("format", "txt")
        .await;
    response.assert_status_ok();
    assert!(response
        .header(header::CONTENT_DISPOSITION)
        .to_str()
        .unwrap()
        .ends_with(".txt"));
    assert!(response.text().contains("] ERROR - process: Processing failed"));
}

#[tokio::test]
async fn test_export_rejects_unknown_format() {
    let (server, _logger) = setup();

    let response = server
        .get("/api/logs/export")
        .add_query_param("format", "xlsx")
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_clear_logs() {
    let (server, logger) = setup();
    logger.info("a", None);
    logger.info("b", None);

    let response = server.delete("/api/logs").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["message"], json!("Logs cleared successfully"));

    let remaining = recorded(&logger);
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].message, "Logs cleared by user request");
}

#[tokio::test]
async fn test_error_report() {
    let (server, logger) = setup();
    for i in 0..12 {
        logger.error(format!("e{i}"), None);
    }

    let response = server.post("/api/logs/report").await;
    response.assert_status_ok();
    let report: Value = response.json();

    let recent = report["recentErrors"].as_array().unwrap();
    assert_eq!(recent.len(), 10);
    assert_eq!(recent[0]["message"], json!("e2"));
    assert_eq!(recent[9]["message"], json!("e11"));
    assert_eq!(report["sessionId"], json!(logger.session_id()));
    assert_eq!(report["currentError"], json!(null));

    let generated = recorded(&logger)
        .into_iter()
        .find(|e| e.message == "Error report generated")
        .unwrap();
    assert_eq!(generated.details.unwrap()["report_id"], report["reportId"]);
}

#[tokio::test]
async fn test_error_report_with_current_error() {
    let (server, _logger) = setup();

    let report: Value = server
        .post("/api/logs/report")
        .json(&json!({
            "currentError": {
                "type": "TypeError",
                "message": "page is undefined",
                "stackTrace": "at UploadPanel"
            }
        }))
        .await
        .json();

    assert_eq!(report["currentError"]["type"], json!("TypeError"));
    assert_eq!(report["currentError"]["message"], json!("page is undefined"));
}

#[tokio::test]
async fn test_requests_are_logged() {
    let (server, logger) = setup();

    server.get("/health").await.assert_status_ok();

    let entries = logger.query(&LogFilter::default());
    assert!(entries.iter().any(|e| e.message == "Request: GET /health"));
    assert!(entries.iter().any(|e| e.message == "Response: 200"));
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let (server, logger) = setup();

    server.get("/api/models").await.assert_status(StatusCode::NOT_FOUND);
    assert!(logger
        .query(&LogFilter::default())
        .iter()
        .any(|e| e.message == "Response: 404"));
}
