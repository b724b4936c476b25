//! Browser metadata captured once per page load

use harness_log::Details;
use serde_json::json;

/// Descriptors of the page and user agent, attached to every error report
pub fn browser_environment() -> Details {
    let mut env = Details::new();
    env.insert("runtime".to_string(), json!("wasm"));
    env.insert("appVersion".to_string(), json!(env!("CARGO_PKG_VERSION")));

    let Some(window) = web_sys::window() else {
        return env;
    };

    let navigator = window.navigator();
    if let Ok(user_agent) = navigator.user_agent() {
        env.insert("userAgent".to_string(), json!(user_agent));
    }
    if let Ok(platform) = navigator.platform() {
        env.insert("platform".to_string(), json!(platform));
    }
    if let Some(language) = navigator.language() {
        env.insert("language".to_string(), json!(language));
    }
    if let Ok(href) = window.location().href() {
        env.insert("url".to_string(), json!(href));
    }

    env
}
