//! Purpose: Client link to a cluster coordination service.
//! Exports: `core` (link state machine, cache, status classification), `transport`
//!          (bundled TCP transport), `link_config`, `notice`.
//! Role: Library backing the `coordlink` CLI and embedding applications.
//! Invariants: The link never acts on a configuration older than one it has cached.
//! Invariants: Every transport failure surfaces as exactly one protocol `ErrorKind`.
pub mod core;
pub mod link_config;
pub mod notice;
pub mod transport;

pub use crate::core::config::Configuration;
pub use crate::core::error::{Error, ErrorKind, to_exit_code};
pub use crate::core::link::{CoordinatorLink, PollOutcome};
pub use crate::core::transport::{RequestId, Timeout, Transport};
pub use crate::link_config::{LinkConfig, LinkOverrides};
pub use crate::transport::TcpTransport;
