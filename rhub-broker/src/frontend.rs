//! Frontend listener: accepts clients and hands their descriptor to the
//! service registered under the name they ask for.
//!
//! # Safety
//!
//! The only unsafe use in this module is re-wrapping a just-detached,
//! not-yet-handed-off raw descriptor as a `TcpStream` on the failed-handoff
//! path so it can carry an error line before closing; see the call site.

#![allow(unsafe_code)]

use crate::registry::ServiceRegistry;
use compio::io::AsyncWriteExt;
use compio::net::TcpListener;
use rhub_core::error::{HubError, Result};
use rhub_core::timeout::{is_timeout, with_timeout};
use rhub_core::wire::{self, ERR_SERVICE_NOT_FOUND, FD_PAYLOAD_BYTE};
use rhub_core::{fd as fdpass, tcp};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Run the frontend accept loop until `stop` is observed or the listener
/// itself fails.
pub async fn run(
    listener: TcpListener,
    registry: ServiceRegistry,
    accept_timeout: Duration,
    stop: Arc<AtomicBool>,
) -> Result<()> {
    loop {
        if stop.load(Ordering::Relaxed) {
            return Ok(());
        }

        let accepted = with_timeout(accept_timeout, async {
            listener.accept().await.map(|(stream, _addr)| stream)
        })
        .await;

        let mut stream = match accepted {
            Ok(stream) => stream,
            Err(e) if is_timeout(&e) => continue,
            Err(e) => return Err(HubError::Io(e)),
        };

        let _ = tcp::enable_tcp_nodelay(&stream);

        let name = match wire::read_frame(&mut stream).await {
            Ok(Some(name)) if !name.is_empty() => name,
            Ok(_) => {
                debug!("frontend: empty request frame, closing");
                continue;
            }
            Err(e) => {
                debug!(error = %e, "frontend: failed to read request frame");
                continue;
            }
        };

        let Some(ctrl_fd) = registry.control_fd(&name) else {
            debug!(service = %String::from_utf8_lossy(&name), "lookup miss");
            let _ = stream.write_all(ERR_SERVICE_NOT_FOUND.to_vec()).await;
            continue;
        };

        let client_fd = tcp::detach(stream);
        match fdpass::send_fd(ctrl_fd, client_fd, FD_PAYLOAD_BYTE) {
            Ok(()) => {
                info!(service = %String::from_utf8_lossy(&name), "client connection handed off");
            }
            Err(e) if HubError::is_broken_pipe(&e) => {
                warn!(
                    service = %String::from_utf8_lossy(&name),
                    error = %e,
                    "handoff failed with broken pipe, evicting registration"
                );
                registry.evict(&name);
                // SAFETY: `client_fd` was just detached above and has not
                // been closed or handed to anyone else.
                let mut stream = unsafe { tcp::rewrap(client_fd) };
                let _ = stream.write_all(ERR_SERVICE_NOT_FOUND.to_vec()).await;
            }
            Err(e) => {
                debug!(
                    service = %String::from_utf8_lossy(&name),
                    error = %e,
                    "handoff failed for this client, registration left intact"
                );
                // SAFETY: `client_fd` was just detached above and has not
                // been closed or handed to anyone else.
                let mut stream = unsafe { tcp::rewrap(client_fd) };
                let _ = stream.write_all(ERR_SERVICE_NOT_FOUND.to_vec()).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rhub_broker_test_support::*;

    #[compio::test]
    async fn unknown_service_gets_error_line() {
        let registry = ServiceRegistry::new();
        let addr = "127.0.0.1:0".parse().unwrap();
        let listener = tcp::bind_reuseaddr(addr, 10).unwrap();
        let bound_addr = listener.local_addr().unwrap();
        let stop = Arc::new(AtomicBool::new(false));

        let run_handle = compio::runtime::spawn(run(
            listener,
            registry,
            Duration::from_millis(50),
            Arc::clone(&stop),
        ));

        let response = request_and_drain(bound_addr, b"missing").await;
        assert_eq!(response, ERR_SERVICE_NOT_FOUND);

        stop.store(true, Ordering::Relaxed);
        let _ = run_handle.await;
    }
}

#[cfg(test)]
mod rhub_broker_test_support {
    use compio::buf::BufResult;
    use compio::io::{AsyncReadExt, AsyncWriteExt};
    use compio::net::TcpStream;
    use std::net::SocketAddr;

    pub async fn request_and_drain(addr: SocketAddr, name: &[u8]) -> Vec<u8> {
        let mut client = TcpStream::connect(addr).await.unwrap();
        client.write_all(name.to_vec()).await.0.unwrap();
        let mut received = Vec::new();
        loop {
            let buf = vec![0u8; 64];
            let BufResult(res, buf) = client.read(buf).await;
            let n = res.unwrap();
            if n == 0 {
                break;
            }
            received.extend_from_slice(&buf[..n]);
        }
        received
    }
}
