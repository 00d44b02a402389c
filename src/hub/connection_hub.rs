use crate::geo::Location;
use crate::hub::metrics::HubMetrics;
use crate::presence::{ActorId, PresenceEntry, PresenceRegistry, Role};
use crate::protocol::OutboundEvent;
use dashmap::DashMap;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Opaque handle for one live connection
pub type ConnectionId = Uuid;

/// Default depth of each connection's outbound queue
pub const DEFAULT_OUTBOUND_QUEUE_CAPACITY: usize = 256;

/// Identity a connection last claimed through a location update
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Claim {
    pub role: Role,
    pub actor_id: ActorId,
}

struct ConnectionSlot {
    sender: mpsc::Sender<String>,
    claim: Option<Claim>,
}

/// Owner of the live connection set and both presence registries.
///
/// Each connection is represented by the sending half of a bounded queue;
/// a writer task on the other end owns the socket. Map locks are held only
/// for the map operation itself, never across a send, so one stalled peer
/// cannot hold up anyone else.
pub struct ConnectionHub {
    connections: DashMap<ConnectionId, ConnectionSlot>,
    presence: PresenceRegistry,
    outbound_queue_capacity: usize,
    pub metrics: HubMetrics,
}

impl ConnectionHub {
    pub fn new(outbound_queue_capacity: usize) -> Self {
        Self {
            connections: DashMap::new(),
            presence: PresenceRegistry::new(),
            outbound_queue_capacity: outbound_queue_capacity.max(1),
            metrics: HubMetrics::new(),
        }
    }

    /// Register an accepted connection by the sending half of its queue
    pub fn register(&self, sender: mpsc::Sender<String>) -> ConnectionId {
        let id = Uuid::new_v4();
        self.connections.insert(
            id,
            ConnectionSlot {
                sender,
                claim: None,
            },
        );
        self.metrics.record_connect();

        info!(
            connection_id = %id,
            connections = self.connections.len(),
            "Connection registered"
        );
        id
    }

    /// Create an outbound queue sized from config and register its sender
    pub fn connect(&self) -> (ConnectionId, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(self.outbound_queue_capacity);
        (self.register(tx), rx)
    }

    /// Remove a connection and the presence entry it last claimed.
    ///
    /// Returns false if the connection was already gone. The presence entry
    /// is only removed if this connection was its last writer.
    pub fn unregister(&self, id: ConnectionId) -> bool {
        let Some((_, slot)) = self.connections.remove(&id) else {
            return false;
        };

        if let Some(claim) = slot.claim {
            if self
                .presence
                .remove_if_owned(claim.role, claim.actor_id, id)
                .is_some()
            {
                info!(
                    connection_id = %id,
                    role = %claim.role,
                    actor_id = claim.actor_id,
                    "Presence removed on disconnect"
                );
            }
        }

        self.metrics.record_disconnect();
        info!(
            connection_id = %id,
            connections = self.connections.len(),
            "Connection unregistered"
        );
        true
    }

    /// Record a location update on behalf of a connection.
    ///
    /// Upserts the presence entry and moves the connection's claim to
    /// `(role, actor_id)`, releasing any different identity it held before.
    /// Returns None, and writes nothing, if the connection is no longer live.
    pub fn claim_location(
        &self,
        id: ConnectionId,
        role: Role,
        actor_id: ActorId,
        location: Location,
        display_name: &str,
    ) -> Option<PresenceEntry> {
        let claim = Claim { role, actor_id };

        let (entry, previous) = {
            // Holding the slot keeps unregister from interleaving between
            // the upsert and the claim update.
            let mut slot = self.connections.get_mut(&id)?;
            let entry = self
                .presence
                .upsert_owned(role, actor_id, location, display_name, Some(id));
            (entry, slot.claim.replace(claim))
        };

        if let Some(previous) = previous.filter(|p| *p != claim) {
            debug!(
                connection_id = %id,
                role = %previous.role,
                actor_id = previous.actor_id,
                "Connection switched identity, releasing previous presence"
            );
            self.presence
                .remove_if_owned(previous.role, previous.actor_id, id);
        }

        Some(entry)
    }

    /// Identity the connection last claimed, if any
    pub fn claim_of(&self, id: ConnectionId) -> Option<Claim> {
        self.connections.get(&id).and_then(|slot| slot.claim)
    }

    /// Send an event to every live connection.
    ///
    /// Returns how many connections accepted it. Connections whose queue is
    /// closed or full are unregistered; their failure is not reported.
    pub fn broadcast(&self, event: &OutboundEvent) -> usize {
        let payload = match serde_json::to_string(event) {
            Ok(p) => p,
            Err(e) => {
                error!(error = %e, kind = event.kind(), "Failed to serialize outbound event");
                return 0;
            }
        };

        // Snapshot targets so no shard lock is held while sending
        let targets: Vec<(ConnectionId, mpsc::Sender<String>)> = self
            .connections
            .iter()
            .map(|entry| (*entry.key(), entry.value().sender.clone()))
            .collect();

        let mut delivered = 0;
        let mut dead = Vec::new();

        for (id, sender) in targets {
            if self.try_deliver(id, &sender, payload.clone()) {
                delivered += 1;
            } else {
                dead.push(id);
            }
        }

        for id in dead {
            if self.unregister(id) {
                self.metrics.record_pruned();
            }
        }

        self.metrics.record_broadcast(delivered);
        debug!(kind = event.kind(), delivered = delivered, "Broadcast sent");
        delivered
    }

    /// Send an event to one connection. Unregisters it on failure.
    pub fn send_to(&self, id: ConnectionId, event: &OutboundEvent) -> bool {
        let Some(sender) = self.connections.get(&id).map(|slot| slot.sender.clone()) else {
            return false;
        };

        let payload = match serde_json::to_string(event) {
            Ok(p) => p,
            Err(e) => {
                error!(error = %e, kind = event.kind(), "Failed to serialize outbound event");
                return false;
            }
        };

        if self.try_deliver(id, &sender, payload) {
            self.metrics.record_unicast();
            true
        } else {
            if self.unregister(id) {
                self.metrics.record_pruned();
            }
            false
        }
    }

    fn try_deliver(&self, id: ConnectionId, sender: &mpsc::Sender<String>, payload: String) -> bool {
        match sender.try_send(payload) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!(connection_id = %id, "Outbound queue full, dropping slow connection");
                false
            }
            Err(TrySendError::Closed(_)) => {
                debug!(connection_id = %id, "Outbound queue closed");
                false
            }
        }
    }

    /// Nearest active agent to `location` with its distance in km
    pub fn nearest_agent(&self, location: Location) -> Option<(PresenceEntry, f64)> {
        self.presence.nearest_agent(location)
    }

    /// Snapshot of active actors for a role, ordered by actor id
    pub fn active(&self, role: Role) -> Vec<PresenceEntry> {
        self.presence.entries(role)
    }

    pub fn active_count(&self, role: Role) -> usize {
        self.presence.len(role)
    }

    pub fn presence_of(&self, role: Role, actor_id: ActorId) -> Option<PresenceEntry> {
        self.presence.get(role, actor_id)
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn is_connected(&self, id: ConnectionId) -> bool {
        self.connections.contains_key(&id)
    }
}

impl Default for ConnectionHub {
    fn default() -> Self {
        Self::new(DEFAULT_OUTBOUND_QUEUE_CAPACITY)
    }
}
