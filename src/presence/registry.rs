use crate::geo::Location;
use crate::presence::{ActorId, Role};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use uuid::Uuid;

/// Latest known position of one actor
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PresenceEntry {
    pub actor_id: ActorId,
    pub role: Role,
    pub location: Location,
    pub display_name: String,

    /// When this position was received
    pub updated_at: DateTime<Utc>,

    /// Connection that wrote this entry, used to scope disconnect cleanup
    #[serde(skip)]
    pub owner: Option<Uuid>,
}

/// In-memory presence maps, one per role.
///
/// Agents and victims are disjoint namespaces: the same numeric id may
/// appear in both without conflict. Each map holds at most one entry per
/// actor, always the most recent upsert.
pub struct PresenceRegistry {
    agents: DashMap<ActorId, PresenceEntry>,
    victims: DashMap<ActorId, PresenceEntry>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self {
            agents: DashMap::new(),
            victims: DashMap::new(),
        }
    }

    fn map(&self, role: Role) -> &DashMap<ActorId, PresenceEntry> {
        match role {
            Role::Agent => &self.agents,
            Role::Victim => &self.victims,
        }
    }

    /// Insert or overwrite an actor's position
    pub fn upsert(
        &self,
        role: Role,
        actor_id: ActorId,
        location: Location,
        display_name: &str,
    ) -> PresenceEntry {
        self.upsert_owned(role, actor_id, location, display_name, None)
    }

    /// Insert or overwrite, recording which connection wrote the entry
    pub fn upsert_owned(
        &self,
        role: Role,
        actor_id: ActorId,
        location: Location,
        display_name: &str,
        owner: Option<Uuid>,
    ) -> PresenceEntry {
        let entry = PresenceEntry {
            actor_id,
            role,
            location,
            display_name: display_name.to_string(),
            updated_at: Utc::now(),
            owner,
        };
        self.map(role).insert(actor_id, entry.clone());
        entry
    }

    /// Remove an actor's entry. No-op if absent.
    pub fn remove(&self, role: Role, actor_id: ActorId) -> Option<PresenceEntry> {
        self.map(role).remove(&actor_id).map(|(_, entry)| entry)
    }

    /// Remove an actor's entry only if `owner` wrote it last.
    ///
    /// An actor that reconnected on a new connection keeps its fresh entry
    /// when the stale connection is cleaned up.
    pub fn remove_if_owned(
        &self,
        role: Role,
        actor_id: ActorId,
        owner: Uuid,
    ) -> Option<PresenceEntry> {
        self.map(role)
            .remove_if(&actor_id, |_, entry| entry.owner == Some(owner))
            .map(|(_, entry)| entry)
    }

    pub fn get(&self, role: Role, actor_id: ActorId) -> Option<PresenceEntry> {
        self.map(role).get(&actor_id).map(|e| e.clone())
    }

    /// Closest agent to `location` and its distance in km.
    ///
    /// Linear scan over all agents. Equal distances resolve to the lowest
    /// actor id so the result does not depend on map iteration order.
    pub fn nearest_agent(&self, location: Location) -> Option<(PresenceEntry, f64)> {
        let mut best: Option<(PresenceEntry, f64)> = None;

        for entry in self.agents.iter() {
            let distance = entry.location.distance_km(&location);
            let closer = match &best {
                None => true,
                Some((current, best_distance)) => {
                    distance < *best_distance
                        || (distance == *best_distance && entry.actor_id < current.actor_id)
                }
            };
            if closer {
                best = Some((entry.value().clone(), distance));
            }
        }

        best
    }

    /// Snapshot of all entries for a role, ordered by actor id
    pub fn entries(&self, role: Role) -> Vec<PresenceEntry> {
        let mut entries: Vec<PresenceEntry> =
            self.map(role).iter().map(|e| e.value().clone()).collect();
        entries.sort_by_key(|e| e.actor_id);
        entries
    }

    pub fn len(&self, role: Role) -> usize {
        self.map(role).len()
    }

    pub fn is_empty(&self, role: Role) -> bool {
        self.map(role).is_empty()
    }
}

impl Default for PresenceRegistry {
    fn default() -> Self {
        Self::new()
    }
}
