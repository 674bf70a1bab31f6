// Core link modules: outcome taxonomy, status classification, config cache, and the link itself.
pub mod cache;
pub mod codec;
pub mod config;
pub mod error;
pub mod link;
pub mod readiness;
pub mod status;
pub mod transport;
