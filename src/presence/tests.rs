use super::*;
use crate::geo::Location;
use std::sync::Arc;
use std::thread;
use uuid::Uuid;

#[test]
fn test_upsert_creates_entry() {
    let registry = PresenceRegistry::new();

    let entry = registry.upsert(Role::Agent, 7, Location::new(-23.5, -46.6), "Agent Silva");

    assert_eq!(entry.actor_id, 7);
    assert_eq!(entry.role, Role::Agent);
    assert_eq!(entry.display_name, "Agent Silva");
    assert_eq!(registry.get(Role::Agent, 7).unwrap(), entry);
    assert_eq!(registry.len(Role::Agent), 1);
}

#[test]
fn test_upsert_keeps_latest_position_only() {
    let registry = PresenceRegistry::new();

    registry.upsert(Role::Agent, 1, Location::new(0.0, 0.0), "A");
    registry.upsert(Role::Agent, 1, Location::new(1.0, 1.0), "A");
    registry.upsert(Role::Agent, 1, Location::new(2.0, 2.0), "A renamed");

    assert_eq!(registry.len(Role::Agent), 1);
    let entry = registry.get(Role::Agent, 1).unwrap();
    assert_eq!(entry.location, Location::new(2.0, 2.0));
    assert_eq!(entry.display_name, "A renamed");
}

#[test]
fn test_roles_are_disjoint_namespaces() {
    let registry = PresenceRegistry::new();

    registry.upsert(Role::Agent, 5, Location::new(0.0, 0.0), "Agent Five");
    registry.upsert(Role::Victim, 5, Location::new(3.0, 3.0), "Maria");

    assert_eq!(registry.len(Role::Agent), 1);
    assert_eq!(registry.len(Role::Victim), 1);
    assert_eq!(registry.get(Role::Victim, 5).unwrap().display_name, "Maria");

    registry.remove(Role::Victim, 5);
    assert!(registry.get(Role::Agent, 5).is_some());
}

#[test]
fn test_remove_is_idempotent() {
    let registry = PresenceRegistry::new();
    registry.upsert(Role::Victim, 9, Location::new(0.0, 0.0), "V");

    assert!(registry.remove(Role::Victim, 9).is_some());
    assert!(registry.remove(Role::Victim, 9).is_none());
    assert!(registry.remove(Role::Victim, 404).is_none());
    assert!(registry.is_empty(Role::Victim));
}

#[test]
fn test_nearest_agent_empty_registry() {
    let registry = PresenceRegistry::new();
    registry.upsert(Role::Victim, 1, Location::new(0.0, 0.0), "Only a victim");

    assert!(registry.nearest_agent(Location::new(0.0, 0.0)).is_none());
}

#[test]
fn test_nearest_agent_picks_closest() {
    let registry = PresenceRegistry::new();
    registry.upsert(Role::Agent, 1, Location::new(0.0, 0.0), "A");
    registry.upsert(Role::Agent, 2, Location::new(0.0, 1.0), "B");

    let (agent, distance) = registry.nearest_agent(Location::new(0.0, 0.4)).unwrap();
    assert_eq!(agent.display_name, "A");
    assert!((distance - 44.48).abs() < 0.01);

    let (agent, _) = registry.nearest_agent(Location::new(0.0, 0.6)).unwrap();
    assert_eq!(agent.display_name, "B");
}

#[test]
fn test_nearest_agent_tie_breaks_on_lowest_id() {
    let registry = PresenceRegistry::new();
    registry.upsert(Role::Agent, 30, Location::new(0.0, 1.0), "East");
    registry.upsert(Role::Agent, 12, Location::new(0.0, -1.0), "West");
    registry.upsert(Role::Agent, 20, Location::new(0.0, 1.0), "East again");

    let (agent, _) = registry.nearest_agent(Location::new(0.0, 0.0)).unwrap();
    assert_eq!(agent.actor_id, 12);
}

#[test]
fn test_removed_agent_is_never_nearest() {
    let registry = PresenceRegistry::new();
    registry.upsert(Role::Agent, 1, Location::new(0.0, 0.0), "Close");
    registry.upsert(Role::Agent, 2, Location::new(10.0, 10.0), "Far");

    registry.remove(Role::Agent, 1);
    let (agent, _) = registry.nearest_agent(Location::new(0.0, 0.0)).unwrap();
    assert_eq!(agent.actor_id, 2);

    registry.upsert(Role::Agent, 1, Location::new(0.0, 0.0), "Close");
    let (agent, _) = registry.nearest_agent(Location::new(0.0, 0.0)).unwrap();
    assert_eq!(agent.actor_id, 1);
}

#[test]
fn test_remove_if_owned_respects_newer_writer() {
    let registry = PresenceRegistry::new();
    let old_conn = Uuid::new_v4();
    let new_conn = Uuid::new_v4();

    registry.upsert_owned(Role::Agent, 3, Location::new(0.0, 0.0), "A", Some(old_conn));
    registry.upsert_owned(Role::Agent, 3, Location::new(0.1, 0.1), "A", Some(new_conn));

    assert!(registry.remove_if_owned(Role::Agent, 3, old_conn).is_none());
    assert!(registry.get(Role::Agent, 3).is_some());

    assert!(registry.remove_if_owned(Role::Agent, 3, new_conn).is_some());
    assert!(registry.get(Role::Agent, 3).is_none());
}

#[test]
fn test_entries_sorted_by_actor_id() {
    let registry = PresenceRegistry::new();
    for id in [42, 3, 17] {
        registry.upsert(Role::Agent, id, Location::new(0.0, 0.0), "x");
    }

    let ids: Vec<ActorId> = registry.entries(Role::Agent).iter().map(|e| e.actor_id).collect();
    assert_eq!(ids, vec![3, 17, 42]);
}

#[test]
fn test_concurrent_upserts_one_entry_per_actor() {
    let registry = Arc::new(PresenceRegistry::new());
    let mut handles = vec![];

    // 10 threads, each moving the same 5 agents around
    for i in 0..10 {
        let registry = Arc::clone(&registry);
        handles.push(thread::spawn(move || {
            for actor in 0..5 {
                registry.upsert(Role::Agent, actor, Location::new(i as f64, 0.0), "agent");
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(registry.len(Role::Agent), 5);
}
