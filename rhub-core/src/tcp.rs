//! TCP utilities for the frontend listener.
//!
//! This module provides generic TCP setup and the raw-descriptor detach /
//! rewrap dance the frontend handoff path needs.
//!
//! # Safety
//!
//! This module uses unsafe code to access raw file descriptors/sockets for
//! TCP socket configuration and ownership transfer. The unsafe operations
//! are encapsulated and safe to use from the public API.

#![allow(unsafe_code)]

use std::io;
#[cfg(unix)]
use std::os::unix::io::RawFd;

/// Enable TCP_NODELAY on a compio TcpStream for minimal latency.
///
/// This disables Nagle's algorithm, trading bandwidth efficiency for lower
/// latency. Essential for the tiny handshake frames this broker exchanges.
///
/// # Platform Support
///
/// Supported on Unix (Linux, macOS) and Windows platforms.
///
/// # Errors
///
/// Returns an error if the socket option cannot be set.
#[inline]
pub fn enable_tcp_nodelay(stream: &compio::net::TcpStream) -> io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::io::{AsRawFd, FromRawFd};
        let fd = stream.as_raw_fd();
        let sock = unsafe { socket2::Socket::from_raw_fd(fd) };
        sock.set_nodelay(true)?;
        std::mem::forget(sock); // Don't close the fd
        Ok(())
    }

    #[cfg(windows)]
    {
        use std::os::windows::io::{AsRawSocket, FromRawSocket};
        let raw = stream.as_raw_socket();
        let sock = unsafe { socket2::Socket::from_raw_socket(raw) };
        sock.set_nodelay(true)?;
        std::mem::forget(sock); // Don't close the socket
        Ok(())
    }

    #[cfg(not(any(unix, windows)))]
    {
        // Unsupported platform - just continue without TCP_NODELAY
        Ok(())
    }
}

/// Bind the frontend TCP listener with `SO_REUSEADDR` set before `listen`,
/// so a restarted Hub can rebind immediately after a crash.
#[cfg(unix)]
pub fn bind_reuseaddr(
    addr: std::net::SocketAddr,
    backlog: i32,
) -> io::Result<compio::net::TcpListener> {
    use socket2::{Domain, Socket, Type};

    let domain = if addr.is_ipv6() { Domain::IPV6 } else { Domain::IPV4 };
    let socket = Socket::new(domain, Type::STREAM, None)?;
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(backlog)?;

    let std_listener: std::net::TcpListener = socket.into();
    compio::net::TcpListener::from_std(std_listener)
}

/// Detach the raw descriptor from an accepted TCP stream without closing
/// it. The caller now owns the descriptor and is responsible either for
/// handing it off (fd passing) or for re-wrapping it with [`rewrap`] to
/// close it through a `TcpStream` again.
#[cfg(unix)]
#[must_use]
pub fn detach(stream: compio::net::TcpStream) -> RawFd {
    use std::os::unix::io::IntoRawFd;
    stream.into_raw_fd()
}

/// Re-wrap a previously [`detach`]ed descriptor as a `TcpStream` so it can
/// be written to (an error line) and then closed through normal `Drop`.
///
/// # Safety
///
/// `fd` must be an open, valid TCP socket descriptor not owned elsewhere.
#[cfg(unix)]
#[must_use]
pub unsafe fn rewrap(fd: RawFd) -> compio::net::TcpStream {
    use std::os::unix::io::FromRawFd;
    unsafe { compio::net::TcpStream::from_raw_fd(fd) }
}
