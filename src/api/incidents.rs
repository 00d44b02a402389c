use crate::dispatch::{DispatchEngine, DispatchResult};
use crate::geo::Location;
use crate::hub::ConnectionHub;
use crate::presence::{ActorId, Role};
use crate::protocol::{IncidentId, OutboundEvent};
use crate::store::{spawn_record_call, NewIncident, RecordStore, StoreError};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::post,
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

/// Shared state for incident routes
#[derive(Clone)]
pub struct IncidentAppState {
    pub hub: Arc<ConnectionHub>,
    pub dispatcher: DispatchEngine,
    pub store: Arc<dyn RecordStore>,
}

impl IncidentAppState {
    pub fn new(hub: Arc<ConnectionHub>, store: Arc<dyn RecordStore>) -> Self {
        Self {
            dispatcher: DispatchEngine::new(Arc::clone(&hub), Arc::clone(&store)),
            hub,
            store,
        }
    }
}

/// Panic button press
#[derive(Deserialize)]
struct PanicRequest {
    user_id: ActorId,
    #[serde(default)]
    victim_name: Option<String>,
    latitude: f64,
    longitude: f64,
}

#[derive(Serialize)]
struct PanicResponse {
    status: &'static str,
    incident_id: IncidentId,
    dispatch: DispatchResult,
}

#[derive(Deserialize)]
struct StatusRequest {
    status: String,
}

#[derive(Serialize)]
struct StatusResponse {
    status: &'static str,
}

/// Error response
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Create router for incident endpoints that touch live state
pub fn create_incident_router(state: IncidentAppState) -> Router {
    Router::new()
        .route("/api/panic", post(create_panic_alert))
        .route("/api/incidents/:incident_id/status", post(update_status))
        .with_state(Arc::new(state))
}

/// POST /api/panic - Create an incident and dispatch the nearest agent
///
/// The victim name falls back to the victim's live presence entry, then to
/// a generic label.
async fn create_panic_alert(
    State(state): State<Arc<IncidentAppState>>,
    Json(req): Json<PanicRequest>,
) -> Result<(StatusCode, Json<PanicResponse>), AppError> {
    let location = Location::new(req.latitude, req.longitude);
    let victim_name = req
        .victim_name
        .filter(|name| !name.trim().is_empty())
        .or_else(|| {
            state
                .hub
                .presence_of(Role::Victim, req.user_id)
                .map(|entry| entry.display_name)
        })
        .unwrap_or_else(|| format!("Victim {}", req.user_id));

    let incident_id = state
        .store
        .create_incident(NewIncident {
            victim_id: req.user_id,
            victim_name: victim_name.clone(),
            location,
        })
        .await
        .map_err(|e| {
            error!(error = %e, user_id = req.user_id, "Failed to create incident");
            AppError::Store(e)
        })?;

    info!(incident_id = incident_id, user_id = req.user_id, "Panic alert received");

    let dispatch = state
        .dispatcher
        .dispatch_nearest(incident_id, &victim_name, location);

    Ok((
        StatusCode::CREATED,
        Json(PanicResponse {
            status: "received",
            incident_id,
            dispatch,
        }),
    ))
}

/// POST /api/incidents/:incident_id/status - Broadcast a status change
async fn update_status(
    State(state): State<Arc<IncidentAppState>>,
    Path(incident_id): Path<IncidentId>,
    Json(req): Json<StatusRequest>,
) -> Result<Json<StatusResponse>, AppError> {
    if req.status.trim().is_empty() {
        return Err(AppError::Validation("status must not be empty".to_string()));
    }

    state.hub.broadcast(&OutboundEvent::StatusUpdate {
        incident_id,
        new_status: req.status.clone(),
    });

    let store = Arc::clone(&state.store);
    spawn_record_call("update_incident_status", async move {
        store.update_incident_status(incident_id, &req.status).await
    });

    Ok(Json(StatusResponse { status: "updated" }))
}

/// Application errors
#[derive(Debug)]
enum AppError {
    Validation(String),
    Store(StoreError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Store(e) => (StatusCode::SERVICE_UNAVAILABLE, e.to_string()),
        };
        let body = Json(ErrorResponse {
            error: error_message,
        });
        (status, body).into_response()
    }
}
