//! Client-side protocol helpers.
//!
//! These are the minimal "SDKs" a real service or client process links
//! against to speak the Hub's handshake; they carry no business logic of
//! their own. Internal scheduling here is intentionally thin — see the
//! crate-level docs.

use compio::buf::BufResult;
use compio::io::{AsyncReadExt, AsyncWriteExt};
use compio::net::{TcpStream, UnixStream};
use rhub_core::wire::{ACK_REGISTERED, FD_PAYLOAD_BYTE, FRAME_BUF_SIZE, PROBE_BYTE};
use std::io;
use std::net::SocketAddr;
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::Path;
use std::time::Duration;

/// One message observed on a registered control connection.
#[derive(Debug)]
pub enum ControlEvent {
    /// A client connection handed off by the Hub.
    ClientFd(RawFd),
    /// The Hub's liveness probe. No reply is required; staying connected
    /// is the only acknowledgement.
    Probe,
}

/// The backend side of the registration handshake.
///
/// A service process registers one name, then calls [`BackendConn::recv_event`]
/// in a loop for as long as it wants to keep serving that name. Dropping
/// the connection deregisters it (observed by the Hub as EOF).
pub struct BackendConn {
    stream: UnixStream,
}

impl BackendConn {
    /// Connect to the backend path and register `name`.
    ///
    /// # Errors
    ///
    /// Returns `io::ErrorKind::AlreadyExists` if the name already has a
    /// live registration, or the underlying connect/IO error otherwise.
    pub async fn register<P: AsRef<Path>>(path: P, name: &[u8]) -> io::Result<Self> {
        let mut stream = rhub_core::ipc::connect(path).await?;
        stream.write_all(name.to_vec()).await.0?;

        let buf = vec![0u8; 1];
        let BufResult(res, buf) = stream.read(buf).await;
        let n = res?;

        if n == 1 && buf[0] == ACK_REGISTERED {
            rhub_core::fd::set_nonblocking(stream.as_raw_fd())?;
            Ok(Self { stream })
        } else {
            Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                "service name already has a live registration",
            ))
        }
    }

    /// Wait for the next event: a handed-off client descriptor, a
    /// liveness probe, or deregistration (`Ok(None)`, the Hub saw EOF on
    /// this connection already has no further meaning once observed).
    pub async fn recv_event(&self) -> io::Result<Option<ControlEvent>> {
        let ctrl_fd = self.stream.as_raw_fd();
        loop {
            match rhub_core::fd::recv_fd(ctrl_fd) {
                Ok(None) => return Ok(None),
                Ok(Some((payload, Some(fd)))) => {
                    debug_assert_eq!(payload, FD_PAYLOAD_BYTE);
                    return Ok(Some(ControlEvent::ClientFd(fd)));
                }
                Ok(Some((payload, None))) => {
                    debug_assert_eq!(payload, PROBE_BYTE);
                    return Ok(Some(ControlEvent::Probe));
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    compio::time::sleep(Duration::from_millis(5)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// The frontend side of the client handshake.
pub struct FrontendConn;

impl FrontendConn {
    /// Connect, send the name frame, and either surface the Hub's textual
    /// rejection or hand back the still-open socket for ordinary
    /// `Read`/`Write` use.
    ///
    /// Because a successful handoff is *silent* (the Hub sends nothing),
    /// this waits up to `probe_window` for a rejection before assuming
    /// success. Set `probe_window` to the caller's tolerance for that
    /// extra latency; the handoff itself is typically sub-millisecond.
    ///
    /// # Errors
    ///
    /// Returns `io::ErrorKind::NotFound` carrying the Hub's error line if
    /// the service name is unregistered.
    pub async fn connect(
        addr: SocketAddr,
        name: &[u8],
        probe_window: Duration,
    ) -> io::Result<TcpStream> {
        let mut stream = TcpStream::connect(addr).await?;
        let _ = rhub_core::tcp::enable_tcp_nodelay(&stream);
        stream.write_all(name.to_vec()).await.0?;

        let buf = vec![0u8; FRAME_BUF_SIZE];
        let probed = rhub_core::timeout::with_timeout(probe_window, async {
            let BufResult(res, buf) = stream.read(buf).await;
            res.map(|n| (n, buf))
        })
        .await;

        match probed {
            Ok((0, _)) => Err(io::Error::new(
                io::ErrorKind::NotFound,
                "connection closed before handoff",
            )),
            Ok((n, buf)) => Err(io::Error::new(
                io::ErrorKind::NotFound,
                String::from_utf8_lossy(&buf[..n]).trim_end().to_string(),
            )),
            Err(e) if rhub_core::timeout::is_timeout(&e) => Ok(stream),
            Err(e) => Err(e),
        }
    }
}
