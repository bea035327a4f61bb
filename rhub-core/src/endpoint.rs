//! Endpoint abstraction for the two addresses a Hub binds.
//!
//! The frontend is a bare `host:port` TCP address; the backend is a
//! filesystem path for a Unix domain socket. Both are validated up front so
//! a malformed CLI argument fails before any socket is touched.

use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// The public, TCP-facing address clients connect to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrontendAddr(pub SocketAddr);

impl FrontendAddr {
    /// Parse a bare `host:port` string (no scheme prefix).
    ///
    /// ```
    /// use rhub_core::endpoint::FrontendAddr;
    ///
    /// let addr = FrontendAddr::parse("127.0.0.1:5555").unwrap();
    /// assert_eq!(addr.0.port(), 5555);
    /// ```
    pub fn parse(s: &str) -> Result<Self, EndpointError> {
        s.parse()
    }
}

impl FromStr for FrontendAddr {
    type Err = EndpointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<SocketAddr>()
            .map(FrontendAddr)
            .map_err(|_| EndpointError::InvalidTcpAddress(s.to_string()))
    }
}

impl fmt::Display for FrontendAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The local, Unix-domain-socket-facing address services register on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BackendPath(pub PathBuf);

impl BackendPath {
    /// Wrap a filesystem path. Never fails: any non-empty path is valid
    /// input to `bind`; `bind` itself reports the OS-level failure.
    pub fn new(path: impl AsRef<Path>) -> Result<Self, EndpointError> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(EndpointError::InvalidPath("path is empty".to_string()));
        }
        Ok(Self(path.to_path_buf()))
    }

    #[must_use]
    pub fn as_path(&self) -> &Path {
        &self.0
    }
}

impl FromStr for BackendPath {
    type Err = EndpointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Display for BackendPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// Errors that can occur when parsing or using endpoints.
#[derive(Debug, thiserror::Error)]
pub enum EndpointError {
    #[error("invalid TCP address: {0}")]
    InvalidTcpAddress(String),

    #[error("invalid backend path: {0}")]
    InvalidPath(String),
}
