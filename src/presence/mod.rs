// Live position tracking for agents and victims

mod registry;

pub use registry::{PresenceEntry, PresenceRegistry};

use serde::{Deserialize, Serialize};
use std::fmt;

#[cfg(test)]
mod tests;

/// Numeric user identifier shared with the record store
pub type ActorId = u64;

/// Which presence namespace an actor lives in
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Agent,
    Victim,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Agent => write!(f, "agent"),
            Role::Victim => write!(f, "victim"),
        }
    }
}
