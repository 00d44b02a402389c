use crate::auth::Identity;
use crate::hub::{Claim, ConnectionId};

/// Lifecycle of one connection as the router sees it
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// No location update seen yet
    Unidentified,
    /// Last location update claimed this identity
    Identified(Claim),
    Closed,
}

/// Per-connection router state
#[derive(Debug)]
pub struct Session {
    connection_id: ConnectionId,
    identity: Option<Identity>,
    state: SessionState,
}

impl Session {
    pub fn new(connection_id: ConnectionId, identity: Option<Identity>) -> Self {
        Self {
            connection_id,
            identity,
            state: SessionState::Unidentified,
        }
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    /// Identity verified at accept time, if auth is enabled
    pub fn identity(&self) -> Option<Identity> {
        self.identity
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub(crate) fn identify(&mut self, claim: Claim) {
        if self.state != SessionState::Closed {
            self.state = SessionState::Identified(claim);
        }
    }

    pub(crate) fn close(&mut self) {
        self.state = SessionState::Closed;
    }
}
