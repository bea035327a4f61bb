//! Rhub Core
//!
//! Runtime-agnostic building blocks shared by the broker and the client
//! helpers:
//! - Endpoint parsing for the two address kinds the Hub binds (`endpoint`)
//! - Error types (`error`)
//! - Backend transport: Unix domain sockets (`ipc`)
//! - Frontend transport: TCP plus the descriptor detach/rewrap dance (`tcp`)
//! - Accept-loop timeout wrapper (`timeout`)
//! - Wire protocol constants and the frame codec (`wire`)
//! - `SCM_RIGHTS` descriptor passing (`fd`)

#![deny(unsafe_code)]
// Allow some pedantic lints that are intentional in this crate
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::needless_pass_by_ref_mut)]
#![allow(clippy::match_same_arms)]

pub mod endpoint;
pub mod error;
pub mod fd;
pub mod ipc;
pub mod tcp;
pub mod timeout;
pub mod wire;

/// A small prelude to make downstream crates ergonomic. Kept minimal to
/// avoid API lock-in.
pub mod prelude {
    pub use crate::endpoint::{BackendPath, EndpointError, FrontendAddr};
    pub use crate::error::{HubError, Result};
    pub use crate::wire::{
        ACK_REGISTERED, ERR_SERVICE_ALREADY_EXISTS, ERR_SERVICE_NOT_FOUND, FD_PAYLOAD_BYTE,
        FRAME_BUF_SIZE, PROBE_BYTE,
    };
}
