// WebSocket wire protocol: inbound client frames and outbound hub events

use crate::geo::Location;
use crate::presence::ActorId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};


/// Incident identifier assigned by the record store
pub type IncidentId = u64;

/// Client → Server frames.
///
/// Every frame is a JSON object carrying a `type` discriminant. Frames with
/// a `type` the hub does not know decode to [`InboundEvent::Unrecognized`];
/// frames that are not JSON objects, lack `type`, or are missing required
/// fields fail to decode.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum InboundEvent {
    AgentLocationUpdate {
        user_id: ActorId,
        lat: f64,
        lng: f64,
        name: String,
    },
    VictimLocationUpdate {
        user_id: ActorId,
        lat: f64,
        lng: f64,
        name: String,
    },
    DispatchRequest {
        incident_id: IncidentId,
        victim_name: String,
        location: Location,
    },
    ChatMessage {
        incident_id: IncidentId,
        sender_name: String,
        content: String,
    },
    StatusUpdate {
        incident_id: IncidentId,
        new_status: String,
    },
    #[serde(other)]
    Unrecognized,
}

impl InboundEvent {
    /// Decode one text frame
    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// Server → Client events, fanned out to every live connection
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum OutboundEvent {
    AgentMoved {
        agent_id: ActorId,
        location: Location,
        name: String,
    },
    VictimMoved {
        victim_id: ActorId,
        location: Location,
        name: String,
    },
    NewPanicAlert {
        incident_id: IncidentId,
        victim_name: String,
        location: Location,
        target_agent_name: String,
        message: String,
    },
    DispatchConfirmed {
        agent_name: String,
        distance: f64,
    },
    NoAgentsAvailable,
    NewChatMessage {
        incident_id: IncidentId,
        sender_name: String,
        content: String,
        timestamp: DateTime<Utc>,
    },
    StatusUpdate {
        incident_id: IncidentId,
        new_status: String,
    },
}

impl OutboundEvent {
    /// Wire name of this event, as written in the `type` field
    pub fn kind(&self) -> &'static str {
        match self {
            OutboundEvent::AgentMoved { .. } => "agent-moved",
            OutboundEvent::VictimMoved { .. } => "victim-moved",
            OutboundEvent::NewPanicAlert { .. } => "new-panic-alert",
            OutboundEvent::DispatchConfirmed { .. } => "dispatch-confirmed",
            OutboundEvent::NoAgentsAvailable => "no-agents-available",
            OutboundEvent::NewChatMessage { .. } => "new-chat-message",
            OutboundEvent::StatusUpdate { .. } => "status-update",
        }
    }
}
