// HTTP and WebSocket APIs

pub mod incidents;
pub mod monitor;
pub mod websocket;

pub use incidents::{create_incident_router, IncidentAppState};
pub use monitor::create_monitor_router;
pub use websocket::{create_ws_router, ws_handler, WsAppState};

use crate::auth::IdentityResolver;
use crate::hub::ConnectionHub;
use crate::router::EventRouter;
use crate::store::RecordStore;
use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

/// Everything the HTTP surface needs, built once at startup
#[derive(Clone)]
pub struct AppComponents {
    pub hub: Arc<ConnectionHub>,
    pub store: Arc<dyn RecordStore>,
    pub identities: Arc<dyn IdentityResolver>,
    pub auth_enabled: bool,
    pub cors_allow_any: bool,
}

/// Assemble the full application router
pub fn create_app(components: AppComponents) -> Router {
    let router = Arc::new(EventRouter::new(
        Arc::clone(&components.hub),
        Arc::clone(&components.store),
    ));

    let ws_state = Arc::new(WsAppState {
        router,
        identities: components.identities,
        auth_enabled: components.auth_enabled,
    });

    let app = Router::new()
        .route("/health", get(|| async { "ok" }))
        .merge(create_ws_router(ws_state))
        .merge(create_incident_router(IncidentAppState::new(
            Arc::clone(&components.hub),
            components.store,
        )))
        .merge(create_monitor_router(components.hub));

    if components.cors_allow_any {
        app.layer(CorsLayer::permissive())
    } else {
        app
    }
}
