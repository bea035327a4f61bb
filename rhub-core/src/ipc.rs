//! Backend transport: Unix domain stream sockets.
//!
//! The backend listener binds a local, filesystem-addressed stream socket.
//! Descriptor passing (see `fd`) only works across processes that share a
//! kernel, so this transport is Unix-only by construction.

#[cfg(unix)]
use compio::net::{UnixListener, UnixStream};
#[cfg(unix)]
use std::path::Path;

#[cfg(unix)]
/// Connect to the backend Unix domain socket.
///
/// # Examples
///
/// ```no_run
/// use rhub_core::ipc;
///
/// #[compio::main]
/// async fn main() -> std::io::Result<()> {
///     let stream = ipc::connect("/tmp/rhub.sock").await?;
///     Ok(())
/// }
/// ```
pub async fn connect<P: AsRef<Path>>(path: P) -> std::io::Result<UnixStream> {
    UnixStream::connect(path).await
}

#[cfg(unix)]
/// Bind the backend Unix domain socket listener.
///
/// Removes any stale file left behind at `path` by a previous run before
/// binding (ignoring "not found"; other removal errors propagate).
///
/// # Examples
///
/// ```no_run
/// use rhub_core::ipc;
///
/// #[compio::main]
/// async fn main() -> std::io::Result<()> {
///     let listener = ipc::bind("/tmp/rhub.sock").await?;
///     Ok(())
/// }
/// ```
pub async fn bind<P: AsRef<Path>>(path: P) -> std::io::Result<UnixListener> {
    let path_ref = path.as_ref();
    if path_ref.exists() {
        std::fs::remove_file(path_ref)?;
    }

    UnixListener::bind(path).await
}

#[cfg(unix)]
/// Accept one connection on the backend listener.
pub async fn accept(listener: &UnixListener) -> std::io::Result<UnixStream> {
    let (stream, _addr) = listener.accept().await?;
    Ok(stream)
}

/// Best-effort unlink of the backend socket path on shutdown. Missing file
/// is not an error.
#[cfg(unix)]
pub fn unlink<P: AsRef<Path>>(path: P) {
    let _ = std::fs::remove_file(path);
}
