//! Backend listener: accepts server registrations and enforces name
//! uniqueness against the service registry.

use crate::registry::{RegisterOutcome, ServiceRegistry};
use compio::io::AsyncWriteExt;
use compio::net::UnixListener;
use rhub_core::error::{HubError, Result};
use rhub_core::ipc;
use rhub_core::timeout::{is_timeout, with_timeout};
use rhub_core::wire::{self, ERR_SERVICE_ALREADY_EXISTS};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Run the backend accept loop until `stop` is observed or the listener
/// itself fails.
pub async fn run(
    listener: UnixListener,
    registry: ServiceRegistry,
    accept_timeout: Duration,
    stop: Arc<AtomicBool>,
) -> Result<()> {
    loop {
        if stop.load(Ordering::Relaxed) {
            return Ok(());
        }

        let accepted = with_timeout(accept_timeout, ipc::accept(&listener)).await;
        let mut conn = match accepted {
            Ok(conn) => conn,
            Err(e) if is_timeout(&e) => continue,
            Err(e) => return Err(HubError::Io(e)),
        };

        let name = match wire::read_frame(&mut conn).await {
            Ok(Some(name)) if !name.is_empty() => name,
            Ok(_) => {
                debug!("backend: empty registration frame, closing");
                continue;
            }
            Err(e) => {
                debug!(error = %e, "backend: failed to read registration frame");
                continue;
            }
        };

        match registry.register(name.clone(), conn) {
            (RegisterOutcome::Ok, _) => {
                info!(service = %String::from_utf8_lossy(&name), "service registered");
            }
            (RegisterOutcome::Exists, Some(mut rejected)) => {
                warn!(
                    service = %String::from_utf8_lossy(&name),
                    "registration rejected: name already has a live control connection"
                );
                let _ = rejected
                    .write_all(ERR_SERVICE_ALREADY_EXISTS.to_vec())
                    .await;
            }
            (RegisterOutcome::Exists, None) => unreachable!("Exists always returns the connection"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rhub_core::ipc as ipc_client;

    #[compio::test]
    async fn duplicate_registration_is_rejected_while_incumbent_lives() {
        use compio::buf::BufResult;
        use compio::io::{AsyncReadExt, AsyncWriteExt as _};

        let path =
            std::env::temp_dir().join(format!("rhub-backend-test-{}.sock", std::process::id()));
        let _ = std::fs::remove_file(&path);

        let listener = ipc::bind(&path).await.unwrap();
        let registry = ServiceRegistry::new();
        let stop = Arc::new(AtomicBool::new(false));

        let run_handle = compio::runtime::spawn(run(
            listener,
            registry.clone(),
            Duration::from_millis(50),
            Arc::clone(&stop),
        ));

        let mut server_a = ipc_client::connect(&path).await.unwrap();
        server_a.write_all(b"svc".to_vec()).await.0.unwrap();
        let buf = vec![0u8; 1];
        let BufResult(res, buf) = server_a.read(buf).await;
        assert_eq!(res.unwrap(), 1);
        assert_eq!(buf[0], rhub_core::wire::ACK_REGISTERED);

        let mut server_b = ipc_client::connect(&path).await.unwrap();
        server_b.write_all(b"svc".to_vec()).await.0.unwrap();
        let mut received = Vec::new();
        loop {
            let buf = vec![0u8; 64];
            let BufResult(res, buf) = server_b.read(buf).await;
            let n = res.unwrap();
            if n == 0 {
                break;
            }
            received.extend_from_slice(&buf[..n]);
        }
        assert_eq!(received, ERR_SERVICE_ALREADY_EXISTS);

        stop.store(true, Ordering::Relaxed);
        drop(server_a);
        let _ = run_handle.await;
        let _ = std::fs::remove_file(&path);
    }
}
