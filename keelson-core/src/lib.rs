//! Keelson Core
//!
//! This crate contains the protocol-agnostic building blocks:
//! - Message parts and peer identities (`message`)
//! - Body allocation strategies (`alloc`)
//! - In-process pipes (`pipe`) and fair queueing over them (`fq`)
//! - ROUTER identity table + synthetic identities (`router`)
//! - Readiness registration (`poller`)
//! - TCP stream preparation (`tcp`)
//! - Options, socket types, monitor events and error types

#![cfg_attr(not(test), deny(unsafe_code))]
// Allow some pedantic lints that are intentional in this crate
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::new_without_default)]
pub mod alloc;
pub mod error;
pub mod fq;
pub mod message;
pub mod monitor;
pub mod options;
pub mod pipe;
pub mod poller;
pub mod router;
pub mod socket_type;
pub mod tcp;

// Optional: a small prelude to make downstream crates ergonomic.
// Keep it minimal to avoid API lock-in.
pub mod prelude {
    pub use crate::alloc::{AllocStrategy, MsgAllocator};
    pub use crate::error::{KeelsonError, Result};
    pub use crate::message::{Identity, Msg, MsgFlags};
    pub use crate::monitor::{SocketEvent, SocketMonitor};
    pub use crate::options::SocketOptions;
    pub use crate::pipe::{InprocPipe, Pipe, PipeId};
    pub use crate::poller::{Interest, Registrar};
    pub use crate::socket_type::SocketType;
}
