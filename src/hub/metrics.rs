use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for hub activity.
///
/// Dropped frames are counted rather than surfaced to the sender, so
/// protocol drift shows up here instead of vanishing.
#[derive(Default)]
pub struct HubMetrics {
    connections_opened: AtomicU64,
    connections_closed: AtomicU64,
    connections_pruned: AtomicU64,
    broadcasts: AtomicU64,
    messages_delivered: AtomicU64,
    frames_malformed: AtomicU64,
    frames_unrecognized: AtomicU64,
    frames_rejected: AtomicU64,
    dispatches_matched: AtomicU64,
    dispatches_unmatched: AtomicU64,
}

impl HubMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_connect(&self) {
        self.connections_opened.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_disconnect(&self) {
        self.connections_closed.fetch_add(1, Ordering::Relaxed);
    }

    /// Connection removed because a send to it failed
    pub fn record_pruned(&self) {
        self.connections_pruned.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_broadcast(&self, delivered: usize) {
        self.broadcasts.fetch_add(1, Ordering::Relaxed);
        self.messages_delivered
            .fetch_add(delivered as u64, Ordering::Relaxed);
    }

    pub fn record_unicast(&self) {
        self.messages_delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_malformed_frame(&self) {
        self.frames_malformed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_unrecognized_frame(&self) {
        self.frames_unrecognized.fetch_add(1, Ordering::Relaxed);
    }

    /// Frame contradicted the connection's verified identity
    pub fn record_rejected_frame(&self) {
        self.frames_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dispatch(&self, matched: bool) {
        if matched {
            self.dispatches_matched.fetch_add(1, Ordering::Relaxed);
        } else {
            self.dispatches_unmatched.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            connections_opened: self.connections_opened.load(Ordering::Relaxed),
            connections_closed: self.connections_closed.load(Ordering::Relaxed),
            connections_pruned: self.connections_pruned.load(Ordering::Relaxed),
            broadcasts: self.broadcasts.load(Ordering::Relaxed),
            messages_delivered: self.messages_delivered.load(Ordering::Relaxed),
            frames_malformed: self.frames_malformed.load(Ordering::Relaxed),
            frames_unrecognized: self.frames_unrecognized.load(Ordering::Relaxed),
            frames_rejected: self.frames_rejected.load(Ordering::Relaxed),
            dispatches_matched: self.dispatches_matched.load(Ordering::Relaxed),
            dispatches_unmatched: self.dispatches_unmatched.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of the hub counters
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub connections_opened: u64,
    pub connections_closed: u64,
    pub connections_pruned: u64,
    pub broadcasts: u64,
    pub messages_delivered: u64,
    pub frames_malformed: u64,
    pub frames_unrecognized: u64,
    pub frames_rejected: u64,
    pub dispatches_matched: u64,
    pub dispatches_unmatched: u64,
}
