// Nearest-agent dispatch

use crate::geo::Location;
use crate::hub::ConnectionHub;
use crate::presence::PresenceEntry;
use crate::protocol::{IncidentId, OutboundEvent};
use crate::store::{spawn_record_call, IncidentStatus, RecordStore};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

#[cfg(test)]
mod tests;

/// Alert text carried by every panic alert
pub const PANIC_ALERT_MESSAGE: &str = "URGENT: panic button triggered!";

/// Outcome of one dispatch request. Not stored.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DispatchResult {
    Matched {
        agent: PresenceEntry,
        /// Great-circle distance to the victim, rounded to 2 decimals (km)
        distance_km: f64,
    },
    NoAgentsAvailable,
}

impl DispatchResult {
    pub fn agent(&self) -> Option<&PresenceEntry> {
        match self {
            DispatchResult::Matched { agent, .. } => Some(agent),
            DispatchResult::NoAgentsAvailable => None,
        }
    }
}

/// Greedy nearest-neighbour dispatcher.
///
/// Matching is advisory: nothing is reserved, so two incidents raised
/// before the matched agent moves or changes status can both be matched to
/// the same agent.
#[derive(Clone)]
pub struct DispatchEngine {
    hub: Arc<ConnectionHub>,
    store: Arc<dyn RecordStore>,
}

impl DispatchEngine {
    pub fn new(hub: Arc<ConnectionHub>, store: Arc<dyn RecordStore>) -> Self {
        Self { hub, store }
    }

    /// Match an incident to the closest active agent and notify everyone.
    ///
    /// On a match, broadcasts `new-panic-alert` followed by
    /// `dispatch-confirmed` and marks the incident dispatched in the record
    /// store without waiting on it. With no active agents, broadcasts a
    /// single `no-agents-available` and leaves the incident untouched.
    pub fn dispatch_nearest(
        &self,
        incident_id: IncidentId,
        victim_name: &str,
        victim_location: Location,
    ) -> DispatchResult {
        let Some((agent, distance)) = self.hub.nearest_agent(victim_location) else {
            warn!(incident_id = incident_id, "No agents available for dispatch");
            self.hub.metrics.record_dispatch(false);
            self.hub.broadcast(&OutboundEvent::NoAgentsAvailable);
            return DispatchResult::NoAgentsAvailable;
        };

        let distance_km = round_km(distance);

        info!(
            incident_id = incident_id,
            agent_id = agent.actor_id,
            distance_km = distance_km,
            "Dispatching nearest agent"
        );
        self.hub.metrics.record_dispatch(true);

        self.hub.broadcast(&OutboundEvent::NewPanicAlert {
            incident_id,
            victim_name: victim_name.to_string(),
            location: victim_location,
            target_agent_name: agent.display_name.clone(),
            message: PANIC_ALERT_MESSAGE.to_string(),
        });
        self.hub.broadcast(&OutboundEvent::DispatchConfirmed {
            agent_name: agent.display_name.clone(),
            distance: distance_km,
        });

        let store = Arc::clone(&self.store);
        spawn_record_call("update_incident_status", async move {
            store
                .update_incident_status(incident_id, IncidentStatus::Dispatched.as_str())
                .await
        });

        DispatchResult::Matched { agent, distance_km }
    }
}

fn round_km(distance: f64) -> f64 {
    (distance * 100.0).round() / 100.0
}
