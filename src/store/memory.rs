use crate::protocol::IncidentId;
use crate::store::{
    ChatRecord, IncidentRecord, IncidentStatus, NewIncident, RecordStore, StoreError,
};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::debug;

/// Process-local record store.
///
/// Backs the hub when no external database is configured and doubles as
/// the collaborator in tests. `set_available(false)` makes every call fail
/// with [`StoreError::Unavailable`].
pub struct InMemoryRecordStore {
    incidents: DashMap<IncidentId, IncidentRecord>,
    chat: DashMap<IncidentId, Vec<ChatRecord>>,
    next_id: AtomicU64,
    available: AtomicBool,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self {
            incidents: DashMap::new(),
            chat: DashMap::new(),
            next_id: AtomicU64::new(1),
            available: AtomicBool::new(true),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("store marked offline".to_string()))
        }
    }

    pub fn get_incident(&self, id: IncidentId) -> Option<IncidentRecord> {
        self.incidents.get(&id).map(|r| r.clone())
    }

    /// Chat history of an incident in append order
    pub fn chat_history(&self, id: IncidentId) -> Vec<ChatRecord> {
        self.chat.get(&id).map(|h| h.clone()).unwrap_or_default()
    }

    pub fn incident_count(&self) -> usize {
        self.incidents.len()
    }
}

impl Default for InMemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn create_incident(&self, incident: NewIncident) -> Result<IncidentId, StoreError> {
        self.check_available()?;

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.incidents.insert(
            id,
            IncidentRecord {
                id,
                victim_id: incident.victim_id,
                victim_name: incident.victim_name,
                location: incident.location,
                status: IncidentStatus::Open.as_str().to_string(),
                created_at: Utc::now(),
                closed_at: None,
            },
        );

        debug!(incident_id = id, "Incident created");
        Ok(id)
    }

    async fn append_chat_message(&self, message: ChatRecord) -> Result<(), StoreError> {
        self.check_available()?;
        self.chat
            .entry(message.incident_id)
            .or_default()
            .push(message);
        Ok(())
    }

    async fn update_incident_status(
        &self,
        incident_id: IncidentId,
        status: &str,
    ) -> Result<(), StoreError> {
        self.check_available()?;

        let mut record = self
            .incidents
            .get_mut(&incident_id)
            .ok_or(StoreError::IncidentNotFound(incident_id))?;

        record.status = status.to_string();
        record.closed_at = match IncidentStatus::parse(status) {
            Some(IncidentStatus::Resolved) => Some(Utc::now()),
            _ => None,
        };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::Location;

    fn new_incident() -> NewIncident {
        NewIncident {
            victim_id: 42,
            victim_name: "Maria".to_string(),
            location: Location::new(-23.55, -46.63),
        }
    }

    #[tokio::test]
    async fn test_create_incident_assigns_sequential_ids() {
        let store = InMemoryRecordStore::new();

        let first = store.create_incident(new_incident()).await.unwrap();
        let second = store.create_incident(new_incident()).await.unwrap();

        assert_eq!(first, 1);
        assert_eq!(second, 2);

        let record = store.get_incident(first).unwrap();
        assert_eq!(record.status, "open");
        assert_eq!(record.victim_name, "Maria");
        assert!(record.closed_at.is_none());
    }

    #[tokio::test]
    async fn test_status_update_and_resolution() {
        let store = InMemoryRecordStore::new();
        let id = store.create_incident(new_incident()).await.unwrap();

        store.update_incident_status(id, "on_site").await.unwrap();
        assert_eq!(store.get_incident(id).unwrap().status, "on_site");

        store.update_incident_status(id, "resolved").await.unwrap();
        let record = store.get_incident(id).unwrap();
        assert_eq!(record.status, "resolved");
        assert!(record.closed_at.is_some());
    }

    #[tokio::test]
    async fn test_status_update_unknown_incident() {
        let store = InMemoryRecordStore::new();
        let result = store.update_incident_status(999, "resolved").await;
        assert_eq!(result, Err(StoreError::IncidentNotFound(999)));
    }

    #[tokio::test]
    async fn test_chat_history_preserves_order() {
        let store = InMemoryRecordStore::new();

        for content in ["help", "on my way", "arrived"] {
            store
                .append_chat_message(ChatRecord {
                    incident_id: 5,
                    sender_name: "x".to_string(),
                    content: content.to_string(),
                    timestamp: Utc::now(),
                })
                .await
                .unwrap();
        }

        let history: Vec<String> = store
            .chat_history(5)
            .into_iter()
            .map(|c| c.content)
            .collect();
        assert_eq!(history, vec!["help", "on my way", "arrived"]);
        assert!(store.chat_history(6).is_empty());
    }

    #[tokio::test]
    async fn test_unavailable_store_fails_every_call() {
        let store = InMemoryRecordStore::new();
        store.set_available(false);

        assert!(matches!(
            store.create_incident(new_incident()).await,
            Err(StoreError::Unavailable(_))
        ));
        assert_eq!(store.incident_count(), 0);

        store.set_available(true);
        assert!(store.create_incident(new_incident()).await.is_ok());
    }

    #[test]
    fn test_status_round_trip_names() {
        for status in [
            IncidentStatus::Open,
            IncidentStatus::Dispatched,
            IncidentStatus::OnSite,
            IncidentStatus::Resolved,
        ] {
            assert_eq!(IncidentStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(IncidentStatus::parse("teleported"), None);
    }
}
