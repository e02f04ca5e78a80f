//! Telemetry Module
//!
//! In-memory, bounded view of recent edge decisions.
//!
//! ## Structure
//! - `event.rs` - DecisionEvent (immutable, timestamped)
//! - `store.rs` - TelemetryStore: totals, recent ring, per-second buckets
//!
//! History beyond the ring capacity or the trailing window is dropped.

pub mod event;
pub mod store;

pub use event::{DecisionEvent, ForwardOutcome, RequestMeta};
pub use store::{SourceRow, StoreConfig, TelemetryStore, TrafficSummary};
