//! In-memory service directory: name -> live control connection.
//!
//! Held as `Rc<RefCell<..>>`: both accept loops run on the same
//! single-threaded executor, so a lock would only add overhead nothing ever
//! contends for.

use compio::net::UnixStream;
use hashbrown::HashMap;
use rhub_core::error::HubError;
use rhub_core::wire::{ACK_REGISTERED, PROBE_BYTE};
use std::cell::RefCell;
use std::os::unix::io::{AsRawFd, RawFd};
use std::rc::Rc;
use tracing::{debug, info};

/// Outcome of a [`ServiceRegistry::register`] call.
#[derive(Debug, PartialEq, Eq)]
pub enum RegisterOutcome {
    Ok,
    Exists,
}

/// Service name -> control connection directory.
///
/// Cloning a `ServiceRegistry` clones the `Rc`, not the map: every clone
/// refers to the same underlying directory.
#[derive(Clone, Default)]
pub struct ServiceRegistry {
    entries: Rc<RefCell<HashMap<Vec<u8>, UnixStream>>>,
}

impl ServiceRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `conn` under `name`. If `name` already has a live entry, probe
    /// it first: only a probe that fails with broken-pipe semantics counts
    /// as a dead incumbent, which is evicted so the insertion proceeds as
    /// `Ok`. Any other outcome — the probe succeeds, or fails with
    /// something other than a broken pipe — is treated as a live incumbent:
    /// `Exists` is returned and `conn` is handed back to the caller
    /// untouched so it can write an error line and close it.
    ///
    /// The probe and the insert-plus-acknowledge both happen without an
    /// `.await` in between, so no other task can observe the registry in an
    /// inconsistent state (entry present but unacknowledged, or entry
    /// removed but not yet replaced).
    pub fn register(&self, name: Vec<u8>, conn: UnixStream) -> (RegisterOutcome, Option<UnixStream>) {
        let mut entries = self.entries.borrow_mut();

        if let Some(incumbent) = entries.get(&name) {
            let probe_fd = incumbent.as_raw_fd();
            match rhub_core::fd::send_byte(probe_fd, PROBE_BYTE) {
                Ok(()) => return (RegisterOutcome::Exists, Some(conn)),
                Err(e) if !HubError::is_broken_pipe(&e) => return (RegisterOutcome::Exists, Some(conn)),
                Err(_) => {
                    info!(
                        service = %String::from_utf8_lossy(&name),
                        "probe failed with broken pipe, evicting stale registration"
                    );
                    entries.remove(&name);
                }
            }
        }

        let service = String::from_utf8_lossy(&name).into_owned();
        let conn_fd = conn.as_raw_fd();
        entries.insert(name, conn);
        if let Err(e) = rhub_core::fd::send_byte(conn_fd, ACK_REGISTERED) {
            debug!(
                service = %service,
                error = %e,
                "failed to send registration ack; relying on lazy EOF detection to evict"
            );
        }
        (RegisterOutcome::Ok, None)
    }

    /// The raw descriptor of the control connection registered for `name`,
    /// if any. The descriptor is valid only as long as the entry remains in
    /// the registry; callers must not retain it across an `.await`.
    #[must_use]
    pub fn control_fd(&self, name: &[u8]) -> Option<RawFd> {
        self.entries.borrow().get(name).map(AsRawFd::as_raw_fd)
    }

    #[must_use]
    pub fn contains(&self, name: &[u8]) -> bool {
        self.entries.borrow().contains_key(name)
    }

    /// Remove and drop (closing) the entry for `name`, if present.
    pub fn evict(&self, name: &[u8]) {
        self.entries.borrow_mut().remove(name);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Drop every live control connection, closing each underlying socket.
    /// Used by the supervisor during shutdown.
    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }
}
