use crate::hub::{ConnectionHub, MetricsSnapshot};
use crate::presence::{PresenceEntry, Role};
use axum::{extract::State, response::Json, routing::get, Router};
use serde::Serialize;
use std::sync::Arc;

/// Live presence snapshot
#[derive(Serialize)]
pub struct PresenceResponse {
    pub agents: Vec<PresenceEntry>,
    pub victims: Vec<PresenceEntry>,
}

/// Hub counters plus current gauges
#[derive(Serialize)]
pub struct MetricsResponse {
    pub connections: usize,
    pub active_agents: usize,
    pub active_victims: usize,
    #[serde(flatten)]
    pub counters: MetricsSnapshot,
}

/// Create read-only router over live hub state
pub fn create_monitor_router(hub: Arc<ConnectionHub>) -> Router {
    Router::new()
        .route("/api/presence", get(get_presence))
        .route("/api/metrics", get(get_metrics))
        .with_state(hub)
}

/// GET /api/presence - Active agents and victims, ordered by id
async fn get_presence(State(hub): State<Arc<ConnectionHub>>) -> Json<PresenceResponse> {
    Json(PresenceResponse {
        agents: hub.active(Role::Agent),
        victims: hub.active(Role::Victim),
    })
}

/// GET /api/metrics
async fn get_metrics(State(hub): State<Arc<ConnectionHub>>) -> Json<MetricsResponse> {
    Json(MetricsResponse {
        connections: hub.connection_count(),
        active_agents: hub.active_count(Role::Agent),
        active_victims: hub.active_count(Role::Victim),
        counters: hub.metrics.snapshot(),
    })
}
