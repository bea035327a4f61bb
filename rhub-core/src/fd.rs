//! Descriptor passing over a Unix domain control channel.
//!
//! A backend registers a control connection and, later, receives client
//! connections on it as ancillary `SCM_RIGHTS` messages rather than as
//! bytes: the descriptor itself crosses the process boundary, no data is
//! copied. This module is the single place that speaks that wire format.
//!
//! # Safety
//!
//! `sendmsg`/`recvmsg` and their ancillary-data layout are FFI calls with no
//! safe wrapper in this stack. Every unsafe block here is confined to
//! building/reading the `msghdr`/`cmsghdr` structures libc expects.

#![allow(unsafe_code)]

use std::io;
use std::mem::{size_of, MaybeUninit};
use std::os::unix::io::RawFd;

/// Put `fd` into non-blocking mode so a raw `sendmsg`/`recvmsg` on it
/// reports `EAGAIN` instead of parking the whole single-threaded runtime.
pub fn set_nonblocking(fd: RawFd) -> io::Result<()> {
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags < 0 {
        return Err(io::Error::last_os_error());
    }
    let res = unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) };
    if res < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Send `payload` as the regular byte and `fd` as an `SCM_RIGHTS` ancillary
/// message over `ctrl_fd`.
///
/// Returns `io::ErrorKind::WouldBlock` if the control socket's send buffer
/// is currently full; the caller retries after a short suspend.
pub fn send_fd(ctrl_fd: RawFd, fd: RawFd, payload: u8) -> io::Result<()> {
    let iov_base = [payload];
    let mut iov = libc::iovec {
        iov_base: iov_base.as_ptr() as *mut libc::c_void,
        iov_len: 1,
    };

    let cmsg_space = unsafe { libc::CMSG_SPACE(size_of::<RawFd>() as u32) } as usize;
    let mut cmsg_buf = vec![0u8; cmsg_space];

    let mut msg: libc::msghdr = unsafe { MaybeUninit::zeroed().assume_init() };
    msg.msg_iov = &mut iov;
    msg.msg_iovlen = 1;
    msg.msg_control = cmsg_buf.as_mut_ptr() as *mut libc::c_void;
    msg.msg_controllen = cmsg_space as _;

    unsafe {
        let cmsg = libc::CMSG_FIRSTHDR(&msg);
        debug_assert!(!cmsg.is_null());
        (*cmsg).cmsg_level = libc::SOL_SOCKET;
        (*cmsg).cmsg_type = libc::SCM_RIGHTS;
        (*cmsg).cmsg_len = libc::CMSG_LEN(size_of::<RawFd>() as u32) as _;
        std::ptr::write(libc::CMSG_DATA(cmsg) as *mut RawFd, fd);
    }

    let sent = unsafe { libc::sendmsg(ctrl_fd, &msg, libc::MSG_NOSIGNAL) };
    if sent < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Send a single byte on `fd` with `MSG_NOSIGNAL`, so a peer that has
/// already closed its end reports `EPIPE` through the return value instead
/// of raising `SIGPIPE`.
pub fn send_byte(fd: RawFd, byte: u8) -> io::Result<()> {
    let buf = [byte];
    let sent = unsafe {
        libc::send(
            fd,
            buf.as_ptr() as *const libc::c_void,
            1,
            libc::MSG_NOSIGNAL,
        )
    };
    if sent < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Receive one byte plus, if present, one passed descriptor from `ctrl_fd`.
///
/// Returns `Ok(None)` on an orderly `recvmsg` EOF (peer closed). Returns
/// `io::ErrorKind::WouldBlock` if nothing is ready yet.
pub fn recv_fd(ctrl_fd: RawFd) -> io::Result<Option<(u8, Option<RawFd>)>> {
    let mut iov_base = [0u8; 1];
    let mut iov = libc::iovec {
        iov_base: iov_base.as_mut_ptr() as *mut libc::c_void,
        iov_len: 1,
    };

    let cmsg_space = unsafe { libc::CMSG_SPACE(size_of::<RawFd>() as u32) } as usize;
    let mut cmsg_buf = vec![0u8; cmsg_space];

    let mut msg: libc::msghdr = unsafe { MaybeUninit::zeroed().assume_init() };
    msg.msg_iov = &mut iov;
    msg.msg_iovlen = 1;
    msg.msg_control = cmsg_buf.as_mut_ptr() as *mut libc::c_void;
    msg.msg_controllen = cmsg_space as _;

    let n = unsafe { libc::recvmsg(ctrl_fd, &mut msg, 0) };
    if n < 0 {
        return Err(io::Error::last_os_error());
    }
    if n == 0 {
        return Ok(None);
    }

    let mut fd = None;
    unsafe {
        let mut cmsg = libc::CMSG_FIRSTHDR(&msg);
        while !cmsg.is_null() {
            if (*cmsg).cmsg_level == libc::SOL_SOCKET && (*cmsg).cmsg_type == libc::SCM_RIGHTS {
                fd = Some(std::ptr::read(libc::CMSG_DATA(cmsg) as *const RawFd));
                break;
            }
            cmsg = libc::CMSG_NXTHDR(&msg, cmsg);
        }
    }

    Ok(Some((iov_base[0], fd)))
}
