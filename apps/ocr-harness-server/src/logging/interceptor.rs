//! Global failure interception
//!
//! Two capture points feed failures into the event log without any call site
//! opting in:
//!
//! - a process panic hook, chained in front of the previous hook, for panics
//!   outside request handling;
//! - the request boundary middleware, which logs every request/response pair
//!   and turns a panicking handler into a logged ERROR plus a JSON 500.
//!
//! A panic inside a request is stashed by the hook in a task-local slot and
//! recorded once by the middleware, which knows the method and path.

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, PanicHookInfo};
use std::sync::Once;

use axum::{
    extract::{Query, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use futures::FutureExt;
use parking_lot::Mutex;
use serde_json::json;
use uuid::Uuid;

use harness_log::LogLevel;

use super::{details, is_notifying, EventLogger};

tokio::task_local! {
    static REQUEST_PANIC: RefCell<Option<PanicCapture>>;
}

static HOOK: Once = Once::new();
static PANIC_TARGET: Mutex<Option<EventLogger>> = parking_lot::const_mutex(None);

/// What the panic hook saw
#[derive(Debug, Clone)]
pub struct PanicCapture {
    pub message: String,
    pub location: Option<String>,
    pub thread: Option<String>,
    pub backtrace: String,
}

impl PanicCapture {
    fn from_hook(info: &PanicHookInfo<'_>) -> Self {
        Self {
            message: panic_message(info.payload()),
            location: info
                .location()
                .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column())),
            thread: std::thread::current().name().map(String::from),
            backtrace: Backtrace::force_capture().to_string(),
        }
    }
}

/// Route process panics into `logger`.
///
/// The hook is installed once per process; later calls only retarget it.
pub fn install_panic_hook(logger: &EventLogger) {
    *PANIC_TARGET.lock() = Some(logger.clone());

    HOOK.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            capture_panic(info);
            previous(info);
        }));
    });
}

fn capture_panic(info: &PanicHookInfo<'_>) {
    // Observer panics are caught and reported by the logger itself
    if is_notifying() {
        return;
    }

    let capture = PanicCapture::from_hook(info);

    let stashed = REQUEST_PANIC
        .try_with(|slot| match slot.try_borrow_mut() {
            Ok(mut slot) => {
                *slot = Some(capture.clone());
                true
            }
            Err(_) => false,
        })
        .unwrap_or(false);
    if stashed {
        return;
    }

    let logger = PANIC_TARGET.lock().clone();
    if let Some(logger) = logger {
        record_panic(&logger, &capture);
    }
}

/// Record a panic that escaped outside any request
pub fn record_panic(logger: &EventLogger, capture: &PanicCapture) {
    logger.record_from(
        "panic",
        LogLevel::Error,
        format!("Uncaught panic: {}", capture.message),
        details(json!({
            "errorType": "panic",
            "location": capture.location,
            "thread": capture.thread,
            "stackTrace": capture.backtrace,
        })),
    );
}

/// Extract the message carried by a panic payload
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Box<dyn Any>".to_string()
    }
}

/// Request logging and panic capture for every route
pub async fn request_boundary(
    State(logger): State<EventLogger>,
    request: Request,
    next: Next,
) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let query_params = Query::<HashMap<String, String>>::try_from_uri(request.uri())
        .map(|Query(params)| params)
        .unwrap_or_default();

    logger.record_from(
        "middleware",
        LogLevel::Info,
        format!("Request: {} {}", method, path),
        details(json!({
            "requestId": request_id,
            "method": method,
            "path": path,
            "queryParams": query_params,
        })),
    );

    let (outcome, capture) = REQUEST_PANIC
        .scope(RefCell::new(None), async move {
            let outcome = AssertUnwindSafe(next.run(request)).catch_unwind().await;
            let capture = REQUEST_PANIC.with(|slot| slot.borrow_mut().take());
            (outcome, capture)
        })
        .await;

    match outcome {
        Ok(response) => {
            logger.record_from(
                "middleware",
                LogLevel::Debug,
                format!("Response: {}", response.status().as_u16()),
                details(json!({
                    "requestId": request_id,
                    "path": path,
                    "statusCode": response.status().as_u16(),
                })),
            );
            response
        }
        Err(payload) => {
            let message = capture
                .as_ref()
                .map(|c| c.message.clone())
                .unwrap_or_else(|| panic_message(payload.as_ref()));

            logger.record_from(
                "middleware",
                LogLevel::Error,
                format!("Unhandled exception: {}", message),
                details(json!({
                    "requestId": request_id,
                    "path": path,
                    "method": method,
                    "errorType": "panic",
                    "location": capture.as_ref().and_then(|c| c.location.clone()),
                    "stackTrace": capture.map(|c| c.backtrace),
                })),
            );

            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "Internal server error",
                    "message": message,
                    "path": path,
                })),
            )
                .into_response()
        }
    }
}
