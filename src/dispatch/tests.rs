use super::*;
use crate::presence::Role;
use crate::store::{InMemoryRecordStore, NewIncident};
use serde_json::Value;
use tokio::sync::mpsc;

fn setup() -> (Arc<ConnectionHub>, DispatchEngine, mpsc::Receiver<String>) {
    let (hub, _store, engine, rx) = setup_with_store();
    (hub, engine, rx)
}

fn setup_with_store() -> (
    Arc<ConnectionHub>,
    Arc<InMemoryRecordStore>,
    DispatchEngine,
    mpsc::Receiver<String>,
) {
    let hub = Arc::new(ConnectionHub::default());
    let store = Arc::new(InMemoryRecordStore::new());
    let (_monitor, rx) = hub.connect();
    let engine = DispatchEngine::new(Arc::clone(&hub), store.clone());
    (hub, store, engine, rx)
}

/// Let spawned record store calls run
async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

/// Registers an agent connection. Keep the receiver alive or the next
/// broadcast prunes the agent.
fn add_agent(
    hub: &ConnectionHub,
    actor_id: u64,
    location: Location,
    name: &str,
) -> mpsc::Receiver<String> {
    let (id, rx) = hub.connect();
    hub.claim_location(id, Role::Agent, actor_id, location, name)
        .unwrap();
    rx
}

fn drain(rx: &mut mpsc::Receiver<String>) -> Vec<Value> {
    let mut frames = vec![];
    while let Ok(text) = rx.try_recv() {
        frames.push(serde_json::from_str(&text).unwrap());
    }
    frames
}

#[tokio::test]
async fn test_no_agents_emits_single_event() {
    let (_hub, engine, mut rx) = setup();

    let result = engine.dispatch_nearest(101, "Maria", Location::new(0.0, 0.0));
    assert_eq!(result, DispatchResult::NoAgentsAvailable);

    let frames = drain(&mut rx);
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0]["type"], "no-agents-available");
}

#[tokio::test]
async fn test_selects_strictly_closer_agent() {
    let (hub, engine, mut rx) = setup();
    let _a = add_agent(&hub, 1, Location::new(0.0, 0.0), "Agent A");
    let _b = add_agent(&hub, 2, Location::new(0.0, 1.0), "Agent B");

    let result = engine.dispatch_nearest(101, "Maria", Location::new(0.0, 0.4));

    match &result {
        DispatchResult::Matched { agent, distance_km } => {
            assert_eq!(agent.actor_id, 1);
            assert_eq!(*distance_km, 44.48);
        }
        other => panic!("expected a match, got {:?}", other),
    }

    let frames = drain(&mut rx);
    assert_eq!(frames.len(), 2);

    assert_eq!(frames[0]["type"], "new-panic-alert");
    assert_eq!(frames[0]["incident_id"], 101);
    assert_eq!(frames[0]["victim_name"], "Maria");
    assert_eq!(frames[0]["target_agent_name"], "Agent A");
    assert_eq!(frames[0]["location"]["lng"], 0.4);
    assert_eq!(frames[0]["message"], PANIC_ALERT_MESSAGE);

    assert_eq!(frames[1]["type"], "dispatch-confirmed");
    assert_eq!(frames[1]["agent_name"], "Agent A");
    assert_eq!(frames[1]["distance"], 44.48);
}

#[tokio::test]
async fn test_selects_other_agent_when_it_is_closer() {
    let (hub, engine, _rx) = setup();
    let _a = add_agent(&hub, 1, Location::new(0.0, 0.0), "Agent A");
    let _b = add_agent(&hub, 2, Location::new(0.0, 1.0), "Agent B");

    let result = engine.dispatch_nearest(7, "Joana", Location::new(0.0, 0.6));
    assert_eq!(result.agent().unwrap().display_name, "Agent B");
}

#[tokio::test]
async fn test_back_to_back_dispatches_share_the_only_agent() {
    let (hub, engine, mut rx) = setup();
    let _a = add_agent(&hub, 1, Location::new(0.0, 0.0), "Agent A");

    let first = engine.dispatch_nearest(1, "Maria", Location::new(0.1, 0.1));
    let second = engine.dispatch_nearest(2, "Joana", Location::new(-0.1, -0.1));

    assert_eq!(first.agent().unwrap().actor_id, 1);
    assert_eq!(second.agent().unwrap().actor_id, 1);
    assert_eq!(drain(&mut rx).len(), 4);

    let snapshot = hub.metrics.snapshot();
    assert_eq!(snapshot.dispatches_matched, 2);
}

#[tokio::test]
async fn test_disconnected_agent_is_not_dispatched() {
    let (hub, engine, _rx) = setup();
    let (agent_conn, _agent_rx) = hub.connect();
    hub.claim_location(agent_conn, Role::Agent, 1, Location::new(0.0, 0.0), "Agent A")
        .unwrap();

    hub.unregister(agent_conn);

    let result = engine.dispatch_nearest(1, "Maria", Location::new(0.0, 0.0));
    assert_eq!(result, DispatchResult::NoAgentsAvailable);
    assert_eq!(hub.metrics.snapshot().dispatches_unmatched, 1);
}

#[tokio::test]
async fn test_victims_are_never_dispatched() {
    let (hub, engine, _rx) = setup();
    let (conn, _conn_rx) = hub.connect();
    hub.claim_location(conn, Role::Victim, 1, Location::new(0.0, 0.0), "Maria")
        .unwrap();

    let result = engine.dispatch_nearest(1, "Maria", Location::new(0.0, 0.0));
    assert_eq!(result, DispatchResult::NoAgentsAvailable);
}

#[test]
fn test_round_km() {
    assert_eq!(round_km(44.4779706), 44.48);
    assert_eq!(round_km(66.716955), 66.72);
    assert_eq!(round_km(0.0), 0.0);
}

#[tokio::test]
async fn test_match_marks_incident_dispatched() {
    let (hub, store, engine, _rx) = setup_with_store();
    let _a = add_agent(&hub, 1, Location::new(0.0, 0.0), "Agent A");
    let incident_id = store
        .create_incident(NewIncident {
            victim_id: 42,
            victim_name: "Maria".to_string(),
            location: Location::new(0.0, 0.4),
        })
        .await
        .unwrap();

    engine.dispatch_nearest(incident_id, "Maria", Location::new(0.0, 0.4));
    settle().await;

    assert_eq!(store.get_incident(incident_id).unwrap().status, "dispatched");
}

#[tokio::test]
async fn test_no_match_leaves_incident_open() {
    let (_hub, store, engine, _rx) = setup_with_store();
    let incident_id = store
        .create_incident(NewIncident {
            victim_id: 42,
            victim_name: "Maria".to_string(),
            location: Location::new(0.0, 0.0),
        })
        .await
        .unwrap();

    engine.dispatch_nearest(incident_id, "Maria", Location::new(0.0, 0.0));
    settle().await;

    assert_eq!(store.get_incident(incident_id).unwrap().status, "open");
}
