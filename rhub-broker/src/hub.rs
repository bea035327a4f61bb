//! Hub supervisor: binds both listeners, runs them concurrently, and owns
//! graceful shutdown.

use crate::backend;
use crate::config::HubConfig;
use crate::frontend;
use crate::registry::ServiceRegistry;
use futures::FutureExt;
use rhub_core::error::{HubError, Result};
use rhub_core::{ipc, tcp};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info};

/// The connection broker. Binds nothing until [`Hub::run`] is called.
pub struct Hub {
    config: HubConfig,
    registry: ServiceRegistry,
    stop_flag: Arc<AtomicBool>,
}

impl Hub {
    #[must_use]
    pub fn new(config: HubConfig) -> Self {
        Self {
            config,
            registry: ServiceRegistry::new(),
            stop_flag: Arc::new(AtomicBool::new(false)),
        }
    }

    /// A cloneable, thread-safe handle that can request shutdown from
    /// outside `run()` — a signal handler, for instance.
    #[must_use]
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            flag: Arc::clone(&self.stop_flag),
        }
    }

    /// Bind both listeners and run them until one fails or `stop()` is
    /// observed. Returns the first fatal listener error, if any.
    pub async fn run(&self) -> Result<()> {
        let backend_path = self.config.backend.as_path();
        let backend_listener = ipc::bind(backend_path).await.map_err(|e| {
            error!(error = %e, path = %self.config.backend, "failed to bind backend listener");
            HubError::Io(e)
        })?;

        let frontend_listener =
            tcp::bind_reuseaddr(self.config.frontend.0, self.config.backlog as i32).map_err(|e| {
                error!(error = %e, addr = %self.config.frontend, "failed to bind frontend listener");
                HubError::Io(e)
            })?;

        info!(
            frontend = %self.config.frontend,
            backend = %self.config.backend,
            "hub listening"
        );

        let backend_fut = backend::run(
            backend_listener,
            self.registry.clone(),
            self.config.accept_timeout,
            Arc::clone(&self.stop_flag),
        )
        .fuse();

        let frontend_fut = frontend::run(
            frontend_listener,
            self.registry.clone(),
            self.config.accept_timeout,
            Arc::clone(&self.stop_flag),
        )
        .fuse();

        futures::pin_mut!(backend_fut, frontend_fut);

        let result = futures::select! {
            r = backend_fut => r,
            r = frontend_fut => r,
        };

        self.shutdown();

        if let Err(ref e) = result {
            error!(error = %e, "hub listener task failed");
        }

        result
    }

    /// Idempotent, non-blocking shutdown request.
    pub fn stop(&self) {
        self.stop_flag.store(true, Ordering::SeqCst);
    }

    fn shutdown(&self) {
        self.registry.clear();
        ipc::unlink(self.config.backend.as_path());
        info!("hub stopped");
    }
}

/// A cloneable, thread-safe shutdown trigger, independent of the `!Send`
/// [`Hub`] it was created from.
#[derive(Clone)]
pub struct StopHandle {
    flag: Arc<AtomicBool>,
}

impl StopHandle {
    /// Request shutdown. Safe to call more than once, and safe to call
    /// from a different thread than the one running [`Hub::run`] (e.g. a
    /// signal handler).
    pub fn stop(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rhub_core::endpoint::{BackendPath, FrontendAddr};
    use std::time::Duration;

    #[compio::test]
    async fn stop_before_run_returns_promptly() {
        let backend_path =
            std::env::temp_dir().join(format!("rhub-hub-test-{}.sock", std::process::id()));
        let config = HubConfig::new(
            FrontendAddr::parse("127.0.0.1:0").unwrap(),
            BackendPath::new(&backend_path).unwrap(),
        )
        .with_accept_timeout(Duration::from_millis(20));

        let hub = Hub::new(config);
        hub.stop();

        let result = hub.run().await;
        assert!(result.is_ok());
        assert!(!backend_path.exists());
    }

    #[compio::test]
    async fn stop_handle_is_idempotent() {
        let backend_path = std::env::temp_dir().join(format!(
            "rhub-hub-idempotent-test-{}.sock",
            std::process::id()
        ));
        let config = HubConfig::new(
            FrontendAddr::parse("127.0.0.1:0").unwrap(),
            BackendPath::new(&backend_path).unwrap(),
        )
        .with_accept_timeout(Duration::from_millis(20));

        let hub = Hub::new(config);
        let handle = hub.stop_handle();
        handle.stop();
        handle.stop();

        let result = hub.run().await;
        assert!(result.is_ok());
    }
}
