//! Application state management

use std::sync::Arc;

use crate::config::Config;
use crate::logging::{interceptor, EventLogger};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    logger: EventLogger,
}

impl AppState {
    /// Create the application state around `logger`.
    ///
    /// The logger becomes the target of the process panic hook.
    pub fn new(config: Config, logger: EventLogger) -> Self {
        interceptor::install_panic_hook(&logger);

        Self {
            inner: Arc::new(AppStateInner { config, logger }),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Get the event logger
    pub fn logger(&self) -> &EventLogger {
        &self.inner.logger
    }
}
