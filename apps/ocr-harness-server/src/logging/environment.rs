//! Host metadata captured once per logger

use harness_log::Details;
use serde_json::json;

/// Descriptors of the running process, attached to every error report
pub fn server_environment() -> Details {
    let mut env = Details::new();
    env.insert("runtime".to_string(), json!("rust"));
    env.insert("appVersion".to_string(), json!(env!("CARGO_PKG_VERSION")));
    env.insert("os".to_string(), json!(std::env::consts::OS));
    env.insert("family".to_string(), json!(std::env::consts::FAMILY));
    env.insert("arch".to_string(), json!(std::env::consts::ARCH));
    env.insert("pid".to_string(), json!(std::process::id()));

    if let Ok(cpus) = std::thread::available_parallelism() {
        env.insert("cpus".to_string(), json!(cpus.get()));
    }
    if let Ok(host) = std::env::var("HOSTNAME") {
        env.insert("hostname".to_string(), json!(host));
    }

    env
}
