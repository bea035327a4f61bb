//! Rhub
//!
//! A connection broker that rendezvous clients with named services by
//! passing an accepted file descriptor across a process boundary, plus a
//! thin actor layer (`node`) that multiplexes several addressable actors
//! over one such registration.
//!
//! Re-exports the pieces most callers need without reaching into
//! `rhub-core`/`rhub-broker` directly: [`Hub`] and [`HubConfig`] to run a
//! broker, [`proto::BackendConn`]/[`proto::FrontendConn`] to speak to one.

pub mod dev_tracing;
pub mod node;
pub mod proto;

pub use rhub_broker::prelude::{Hub, HubConfig, StopHandle};
pub use rhub_core::endpoint::{BackendPath, EndpointError, FrontendAddr};
pub use rhub_core::error::{HubError, Result};
