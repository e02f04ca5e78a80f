//! Routing Module
//!
//! Backend selection for ALLOW traffic and best-effort forwarding.

pub mod selector;
pub mod forwarder;

pub use selector::{Backend, BackendSelector, SelectionStrategy};
pub use forwarder::{ForwardPayload, Forwarder};
