//! Hub configuration: endpoints, backlog, accept timeout.

use rhub_core::endpoint::{BackendPath, FrontendAddr};
use std::time::Duration;

/// Default listen backlog for the frontend TCP listener.
pub const DEFAULT_BACKLOG: u32 = 10;

/// Default accept timeout, in milliseconds, used as the cancellation
/// checkpoint for both accept loops.
pub const DEFAULT_ACCEPT_TIMEOUT_MS: u64 = 100;

/// Everything a [`crate::hub::Hub`] needs to bind its two listeners.
#[derive(Debug, Clone)]
pub struct HubConfig {
    pub frontend: FrontendAddr,
    pub backend: BackendPath,
    pub backlog: u32,
    pub accept_timeout: Duration,
}

impl HubConfig {
    #[must_use]
    pub fn new(frontend: FrontendAddr, backend: BackendPath) -> Self {
        Self {
            frontend,
            backend,
            backlog: DEFAULT_BACKLOG,
            accept_timeout: Duration::from_millis(DEFAULT_ACCEPT_TIMEOUT_MS),
        }
    }

    #[must_use]
    pub fn with_backlog(mut self, backlog: u32) -> Self {
        self.backlog = backlog;
        self
    }

    #[must_use]
    pub fn with_accept_timeout(mut self, timeout: Duration) -> Self {
        self.accept_timeout = timeout;
        self
    }
}
