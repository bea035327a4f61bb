/// Rhub Error Types
///
/// Comprehensive error handling for all rhub broker operations.
use std::io;
use thiserror::Error;

/// Main error type for rhub operations.
#[derive(Error, Debug)]
pub enum HubError {
    /// IO error during socket operations.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// A write or ancillary send on a peer socket failed with pipe/reset
    /// semantics; the peer is gone.
    #[error("transport broken: {0}")]
    TransportBroken(String),

    /// Client requested a service name with no live registration.
    #[error("service not found")]
    NameUnknown,

    /// A server tried to register a name that already has a live control
    /// connection.
    #[error("service already exists")]
    NameTaken,

    /// An endpoint string (`host:port` or filesystem path) failed to parse.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// Descriptor passing failed for a reason other than a broken pipe.
    #[error("descriptor transfer failed: {0}")]
    FdTransfer(String),
}

/// Result type alias for rhub operations.
pub type Result<T> = std::result::Result<T, HubError>;

impl HubError {
    /// Create a transport-broken error from a peer description.
    pub fn transport_broken(peer: impl Into<String>) -> Self {
        Self::TransportBroken(peer.into())
    }

    /// True if `err` is the io error kind produced by a peer closing a
    /// socket we were writing or sending ancillary data to.
    #[must_use]
    pub fn is_broken_pipe(err: &io::Error) -> bool {
        matches!(
            err.kind(),
            io::ErrorKind::BrokenPipe | io::ErrorKind::ConnectionReset
        )
    }

    /// True if the error represents a transient "try again" condition
    /// rather than a terminal failure of the connection.
    #[must_use]
    pub fn is_would_block(err: &io::Error) -> bool {
        matches!(err.kind(), io::ErrorKind::WouldBlock)
    }

    /// Check if this is a recoverable, per-connection error (as opposed to
    /// a fatal listener-setup error that must surface from `run()`).
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Io(e) => Self::is_broken_pipe(e) || Self::is_would_block(e),
            Self::TransportBroken(_) | Self::NameUnknown | Self::NameTaken => true,
            Self::InvalidEndpoint(_) | Self::FdTransfer(_) => false,
        }
    }
}
