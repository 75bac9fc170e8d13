//! Proxy core: capability endpoints and the forward-and-relay network call.
//!
//! The gateway and the worker pool both route downstream traffic through
//! this crate. A [`client::Forwarder`] performs one downstream call per
//! invocation over a single pooled HTTP client; downstream status codes are
//! relayed as successes, and only transport failures surface as
//! [`errors::ProxyError`].

pub mod client;
pub mod config;
pub mod endpoint;
pub mod errors;
pub mod policy;
pub mod registry;
pub mod types;
pub mod prelude;
