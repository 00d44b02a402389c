// Per-connection event routing

mod session;

pub use session::{Session, SessionState};

use crate::auth::Identity;
use crate::dispatch::DispatchEngine;
use crate::geo::Location;
use crate::hub::{Claim, ConnectionHub, ConnectionId};
use crate::presence::{ActorId, Role};
use crate::protocol::{InboundEvent, OutboundEvent};
use crate::store::{spawn_record_call, ChatRecord, RecordStore};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, warn};


/// What happened to one inbound frame
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Decoded and acted on
    Handled,
    /// Not JSON, no `type`, or missing required fields
    Malformed,
    /// Well-formed frame of a kind the hub does not handle
    Unrecognized,
    /// Location update contradicting the connection's verified identity
    Rejected,
    /// Connection was already unregistered; nothing written
    Disconnected,
}

/// Single entry point for inbound frames.
///
/// Shared by all connections; per-connection state lives in [`Session`].
/// Frames are decoded once into [`InboundEvent`] and matched exhaustively.
/// Bad frames are logged and counted, never answered.
pub struct EventRouter {
    hub: Arc<ConnectionHub>,
    dispatcher: DispatchEngine,
    store: Arc<dyn RecordStore>,
}

impl EventRouter {
    pub fn new(hub: Arc<ConnectionHub>, store: Arc<dyn RecordStore>) -> Self {
        Self {
            dispatcher: DispatchEngine::new(Arc::clone(&hub), Arc::clone(&store)),
            hub,
            store,
        }
    }

    pub fn hub(&self) -> &Arc<ConnectionHub> {
        &self.hub
    }

    /// Start tracking a registered connection
    pub fn open_session(&self, connection_id: ConnectionId, identity: Option<Identity>) -> Session {
        Session::new(connection_id, identity)
    }

    /// Tear down a session: unregister and drop its presence entry
    pub fn close_session(&self, session: &mut Session) {
        self.hub.unregister(session.connection_id());
        session.close();
    }

    /// Decode and route one text frame
    pub fn route(&self, session: &mut Session, text: &str) -> RouteOutcome {
        match InboundEvent::decode(text) {
            Ok(event) => self.handle(session, event),
            Err(e) => {
                warn!(
                    connection_id = %session.connection_id(),
                    error = %e,
                    "Dropping malformed frame"
                );
                self.hub.metrics.record_malformed_frame();
                RouteOutcome::Malformed
            }
        }
    }

    /// Route an already decoded event
    pub fn handle(&self, session: &mut Session, event: InboundEvent) -> RouteOutcome {
        match event {
            InboundEvent::AgentLocationUpdate {
                user_id,
                lat,
                lng,
                name,
            } => self.location_update(session, Role::Agent, user_id, Location::new(lat, lng), name),

            InboundEvent::VictimLocationUpdate {
                user_id,
                lat,
                lng,
                name,
            } => self.location_update(session, Role::Victim, user_id, Location::new(lat, lng), name),

            InboundEvent::DispatchRequest {
                incident_id,
                victim_name,
                location,
            } => {
                self.dispatcher
                    .dispatch_nearest(incident_id, &victim_name, location);
                RouteOutcome::Handled
            }

            InboundEvent::ChatMessage {
                incident_id,
                sender_name,
                content,
            } => {
                let timestamp = Utc::now();
                self.hub.broadcast(&OutboundEvent::NewChatMessage {
                    incident_id,
                    sender_name: sender_name.clone(),
                    content: content.clone(),
                    timestamp,
                });

                let store = Arc::clone(&self.store);
                let record = ChatRecord {
                    incident_id,
                    sender_name,
                    content,
                    timestamp,
                };
                spawn_record_call("append_chat_message", async move {
                    store.append_chat_message(record).await
                });
                RouteOutcome::Handled
            }

            InboundEvent::StatusUpdate {
                incident_id,
                new_status,
            } => {
                self.hub.broadcast(&OutboundEvent::StatusUpdate {
                    incident_id,
                    new_status: new_status.clone(),
                });

                let store = Arc::clone(&self.store);
                spawn_record_call("update_incident_status", async move {
                    store.update_incident_status(incident_id, &new_status).await
                });
                RouteOutcome::Handled
            }

            InboundEvent::Unrecognized => {
                debug!(
                    connection_id = %session.connection_id(),
                    "Dropping frame with unrecognized type"
                );
                self.hub.metrics.record_unrecognized_frame();
                RouteOutcome::Unrecognized
            }
        }
    }

    fn location_update(
        &self,
        session: &mut Session,
        role: Role,
        actor_id: ActorId,
        location: Location,
        name: String,
    ) -> RouteOutcome {
        if let Some(identity) = session.identity() {
            if !identity.may_publish(role, actor_id) {
                warn!(
                    connection_id = %session.connection_id(),
                    user_id = identity.user_id,
                    role = %role,
                    actor_id = actor_id,
                    "Rejecting location update for another identity"
                );
                self.hub.metrics.record_rejected_frame();
                return RouteOutcome::Rejected;
            }
        }

        if self
            .hub
            .claim_location(session.connection_id(), role, actor_id, location, &name)
            .is_none()
        {
            debug!(
                connection_id = %session.connection_id(),
                "Location update on unregistered connection ignored"
            );
            return RouteOutcome::Disconnected;
        }
        session.identify(Claim { role, actor_id });

        let event = match role {
            Role::Agent => OutboundEvent::AgentMoved {
                agent_id: actor_id,
                location,
                name,
            },
            Role::Victim => OutboundEvent::VictimMoved {
                victim_id: actor_id,
                location,
                name,
            },
        };
        self.hub.broadcast(&event);
        RouteOutcome::Handled
    }
}
