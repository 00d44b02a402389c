// Record store collaborator: incidents and chat history

mod memory;

pub use memory::InMemoryRecordStore;

use crate::geo::Location;
use crate::presence::ActorId;
use crate::protocol::IncidentId;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use tracing::warn;

/// Lifecycle of an incident as the dispatch console sees it
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentStatus {
    /// Panic button pressed, waiting on the console
    Open,
    /// Agent matched and notified
    Dispatched,
    /// Agent arrived at the victim's location
    OnSite,
    /// Closed with a report
    Resolved,
}

impl IncidentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IncidentStatus::Open => "open",
            IncidentStatus::Dispatched => "dispatched",
            IncidentStatus::OnSite => "on_site",
            IncidentStatus::Resolved => "resolved",
        }
    }

    /// Parse a wire status. Unknown values return None.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "open" => Some(IncidentStatus::Open),
            "dispatched" => Some(IncidentStatus::Dispatched),
            "on_site" => Some(IncidentStatus::OnSite),
            "resolved" => Some(IncidentStatus::Resolved),
            _ => None,
        }
    }
}

/// Incident to be created when a victim raises an alert
#[derive(Clone, Debug, PartialEq)]
pub struct NewIncident {
    pub victim_id: ActorId,
    pub victim_name: String,
    pub location: Location,
}

/// Stored incident
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct IncidentRecord {
    pub id: IncidentId,
    pub victim_id: ActorId,
    pub victim_name: String,
    pub location: Location,
    /// Free-form; clients may send values outside [`IncidentStatus`]
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

/// One chat line attached to an incident
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChatRecord {
    pub incident_id: IncidentId,
    pub sender_name: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// Record store errors
#[derive(Debug, PartialEq, Clone)]
pub enum StoreError {
    /// Backing store cannot be reached
    Unavailable(String),
    /// No incident with this id
    IncidentNotFound(IncidentId),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Unavailable(reason) => write!(f, "Record store unavailable: {}", reason),
            StoreError::IncidentNotFound(id) => write!(f, "Incident {} not found", id),
        }
    }
}

impl std::error::Error for StoreError {}

/// Persistence for incidents and chat history.
///
/// The hub calls this as a side effect of live events. Calls made from the
/// event path are fire-and-forget: a failure is logged and never rolls back
/// or delays the broadcast that triggered it.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Persist a new incident and return its id
    async fn create_incident(&self, incident: NewIncident) -> Result<IncidentId, StoreError>;

    /// Append a chat line to an incident's history
    async fn append_chat_message(&self, message: ChatRecord) -> Result<(), StoreError>;

    /// Set an incident's status
    async fn update_incident_status(
        &self,
        incident_id: IncidentId,
        status: &str,
    ) -> Result<(), StoreError>;
}

/// Run a record store call in the background.
///
/// The caller never waits on the store; a failure is logged and dropped.
pub fn spawn_record_call<F>(operation: &'static str, call: F)
where
    F: Future<Output = Result<(), StoreError>> + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(e) = call.await {
            warn!(operation = operation, error = %e, "Record store call failed");
        }
    });
}
