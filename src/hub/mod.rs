// Live connection set, broadcast fan-out and presence ownership

mod connection_hub;
pub mod metrics;

pub use connection_hub::{Claim, ConnectionHub, ConnectionId, DEFAULT_OUTBOUND_QUEUE_CAPACITY};
pub use metrics::{HubMetrics, MetricsSnapshot};
