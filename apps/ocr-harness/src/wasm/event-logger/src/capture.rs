//! Global failure capture in the browser
//!
//! Window `error` and `unhandledrejection` events, and Rust panics inside the
//! module, are recorded as ERROR entries and offered to the page's report
//! handler. Listeners hold a weak reference, so a dropped logger goes quiet
//! instead of being kept alive by the window.

use std::cell::RefCell;
use std::panic::PanicHookInfo;
use std::rc::{Rc, Weak};
use std::sync::Once;

use serde_json::json;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{ErrorEvent, PromiseRejectionEvent};

use harness_log::{CurrentError, Details, LogLevel};

use crate::log::ClientLog;

const COMPONENT: &str = "GlobalErrorHandler";

static HOOK: Once = Once::new();

thread_local! {
    static PANIC_TARGET: RefCell<Weak<ClientLog>> = RefCell::new(Weak::new());
}

/// Attach window listeners for `log` and make it the panic hook's target
pub fn install(log: &Rc<ClientLog>) {
    install_panic_hook(log);

    if let Err(e) = install_listeners(log) {
        web_sys::console::warn_2(&"Failed to install global error listeners:".into(), &e);
    }
}

fn install_listeners(log: &Rc<ClientLog>) -> Result<(), JsValue> {
    let Some(window) = web_sys::window() else {
        return Ok(());
    };

    let target = Rc::downgrade(log);
    let on_error = Closure::<dyn FnMut(ErrorEvent)>::new(move |event: ErrorEvent| {
        if let Some(log) = target.upgrade() {
            record_error_event(&log, &event);
        }
    });
    window.add_event_listener_with_callback("error", on_error.as_ref().unchecked_ref())?;
    on_error.forget();

    let target = Rc::downgrade(log);
    let on_rejection =
        Closure::<dyn FnMut(PromiseRejectionEvent)>::new(move |event: PromiseRejectionEvent| {
            if let Some(log) = target.upgrade() {
                record_rejection(&log, &event.reason());
            }
        });
    window.add_event_listener_with_callback(
        "unhandledrejection",
        on_rejection.as_ref().unchecked_ref(),
    )?;
    on_rejection.forget();

    Ok(())
}

fn record_error_event(log: &ClientLog, event: &ErrorEvent) {
    let message = event.message();
    let stack = stack_of(&event.error());

    let mut details = Details::new();
    details.insert("errorType".to_string(), json!("error"));
    details.insert("filename".to_string(), json!(event.filename()));
    details.insert("lineno".to_string(), json!(event.lineno()));
    details.insert("colno".to_string(), json!(event.colno()));
    details.insert("stack".to_string(), json!(stack));

    log.record(
        COMPONENT,
        LogLevel::Error,
        &format!("Uncaught error: {}", message),
        Some(&details),
    );
    log.offer_report(Some(CurrentError::new("Error", message, stack)));
}

/// Record a rejected promise nobody handled
pub fn record_rejection(log: &ClientLog, reason: &JsValue) {
    let message = describe(reason);
    let stack = stack_of(reason);

    let mut details = Details::new();
    details.insert("errorType".to_string(), json!("unhandledrejection"));
    details.insert("stack".to_string(), json!(stack));

    log.record(
        COMPONENT,
        LogLevel::Error,
        &format!("Unhandled promise rejection: {}", message),
        Some(&details),
    );
    log.offer_report(Some(CurrentError::new("UnhandledRejection", message, stack)));
}

/// Human-readable text for an arbitrary thrown value
pub fn describe(value: &JsValue) -> String {
    if let Some(error) = value.dyn_ref::<js_sys::Error>() {
        return String::from(error.message());
    }
    if let Some(s) = value.as_string() {
        return s;
    }
    if value.is_undefined() || value.is_null() {
        return "Unknown error".to_string();
    }
    js_sys::JSON::stringify(value)
        .ok()
        .and_then(|s| s.as_string())
        .unwrap_or_else(|| "Unknown error".to_string())
}

/// The `stack` property of a thrown value, if it has one
pub fn stack_of(value: &JsValue) -> Option<String> {
    if !value.is_object() {
        return None;
    }
    js_sys::Reflect::get(value, &JsValue::from_str("stack"))
        .ok()
        .and_then(|stack| stack.as_string())
}

fn install_panic_hook(log: &Rc<ClientLog>) {
    PANIC_TARGET.with(|target| *target.borrow_mut() = Rc::downgrade(log));

    HOOK.call_once(|| {
        std::panic::set_hook(Box::new(|info| {
            capture_panic(info);
            #[cfg(feature = "console_error_panic_hook")]
            console_error_panic_hook::hook(info);
        }));
    });
}

fn capture_panic(info: &PanicHookInfo<'_>) {
    let Some(log) = PANIC_TARGET
        .try_with(|target| target.try_borrow().ok().and_then(|t| t.upgrade()))
        .ok()
        .flatten()
    else {
        return;
    };

    let payload = info.payload();
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "Box<dyn Any>".to_string());
    let location = info
        .location()
        .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()));

    let mut details = Details::new();
    details.insert("errorType".to_string(), json!("panic"));
    details.insert("location".to_string(), json!(location));

    // The panic may have fired inside a buffer borrow
    if log
        .try_record("panic", LogLevel::Error, &format!("Uncaught panic: {}", message), Some(&details))
        .is_some()
    {
        log.offer_report(Some(CurrentError::new("panic", message, location)));
    }
}
