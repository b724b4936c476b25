//! OCR Harness Server Library
//!
//! Backend of the OCR demo: an HTTP API around an in-memory, bounded event
//! log that captures what the server does and what goes wrong.
//!
//! # Modules
//!
//! - `config`: environment-driven configuration
//! - `logging`: the backend [`EventLogger`](logging::EventLogger), panic and
//!   request interception, and the tracing bridge
//! - `routes`: log retrieval/export/report and health endpoints
//! - `state`: shared application state

pub mod config;
pub mod error;
pub mod logging;
pub mod routes;
pub mod state;

use axum::{http::HeaderValue, middleware, Router};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::error::AppError;
use crate::state::AppState;

/// Build the application router.
///
/// Every route runs inside the request boundary, so requests, responses and
/// handler panics all land in the event log.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(routes::health::router())
        .nest("/api/logs", routes::logs::router())
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(
            state.logger().clone(),
            logging::interceptor::request_boundary,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&state.config().server.cors_origins))
        .with_state(state)
}

async fn not_found(uri: axum::http::Uri) -> AppError {
    AppError::NotFound(format!("No route for {}", uri.path()))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Method, Request};
    use harness_log::{Details, LogConfig};
    use tower::ServiceExt;

    use crate::config::Config;
    use crate::logging::EventLogger;

    fn state() -> AppState {
        let logger = EventLogger::with_environment(LogConfig::default(), Details::new());
        AppState::new(Config::default(), logger)
    }

    #[tokio::test]
    async fn test_cors_preflight_allows_configured_origin() {
        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri("/api/logs")
            .header(header::ORIGIN, "http://localhost:3000")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "DELETE")
            .body(Body::empty())
            .unwrap();

        let response = app(state()).oneshot(request).await.unwrap();
        let headers = response.headers();

        assert_eq!(
            headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap().to_str().unwrap(),
            "http://localhost:3000"
        );
        assert_eq!(
            headers.get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS).unwrap().to_str().unwrap(),
            "true"
        );
    }

    #[tokio::test]
    async fn test_cors_ignores_unlisted_origin() {
        let request = Request::builder()
            .uri("/health")
            .header(header::ORIGIN, "http://evil.example")
            .body(Body::empty())
            .unwrap();

        let response = app(state()).oneshot(request).await.unwrap();
        assert!(response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
    }
}
