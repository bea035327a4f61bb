//! Timeout wrapper for the accept loop's suspend-and-retry rhythm.
//!
//! Each listener accept is bounded so the Hub can periodically check its
//! shutdown flag rather than blocking forever in a single `accept().await`.

use compio::time::timeout;
use std::future::Future;
use std::io;
use std::time::Duration;

/// Run `fut` with a bounding `duration`. A timeout is surfaced as
/// `io::ErrorKind::TimedOut` so callers can fold it into their existing
/// `io::Result` match arms instead of threading an `Elapsed` type through.
pub async fn with_timeout<F, T>(duration: Duration, fut: F) -> io::Result<T>
where
    F: Future<Output = io::Result<T>>,
{
    match timeout(duration, fut).await {
        Ok(result) => result,
        Err(_elapsed) => Err(io::Error::new(
            io::ErrorKind::TimedOut,
            "operation timed out",
        )),
    }
}

/// True if `err` is the sentinel this module's timeout produces, as opposed
/// to a genuine I/O failure from the underlying accept call.
#[must_use]
pub fn is_timeout(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::TimedOut
}
