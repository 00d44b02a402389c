use crate::auth::{extract_connection_token, Identity, IdentityResolver};
use crate::hub::{ConnectionHub, ConnectionId};
use crate::router::EventRouter;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, Request, State,
    },
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Extension, Router,
};
use futures::stream::SplitSink;
use futures::StreamExt;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};

/// Query parameters for WebSocket upgrade
#[derive(Deserialize)]
struct WsQuery {
    token: Option<String>,
}

/// Shared application state for WebSocket handler
#[derive(Clone)]
pub struct WsAppState {
    pub router: Arc<EventRouter>,
    pub identities: Arc<dyn IdentityResolver>,
    pub auth_enabled: bool,
}

/// Auth middleware: resolves `?token=` or a bearer header to an identity.
///
/// Runs as a tower layer BEFORE WebSocket upgrade extraction so 401 can be
/// returned cleanly. A resolved identity is attached to the request even
/// when auth is disabled; without one the connection is anonymous.
async fn ws_auth(
    State(state): State<Arc<WsAppState>>,
    Query(params): Query<WsQuery>,
    mut req: Request,
    next: Next,
) -> Response {
    let identity = extract_connection_token(params.token.as_deref(), req.headers())
        .ok()
        .and_then(|token| state.identities.resolve(&token));

    match identity {
        Some(identity) => {
            req.extensions_mut().insert(identity);
        }
        None if state.auth_enabled => {
            return (StatusCode::UNAUTHORIZED, "Unauthorized").into_response();
        }
        None => {}
    }

    next.run(req).await
}

/// GET /ws/monitor - WebSocket upgrade handler (auth handled by ws_auth middleware)
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<WsAppState>>,
    identity: Option<Extension<Identity>>,
) -> Response {
    let identity = identity.map(|Extension(identity)| identity);
    info!(identified = identity.is_some(), "WebSocket upgrade request received");
    ws.on_upgrade(move |socket| handle_socket(socket, state, identity))
}

/// Create WebSocket router with auth middleware applied
pub fn create_ws_router(state: Arc<WsAppState>) -> Router {
    Router::new()
        .route("/ws/monitor", get(ws_handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), ws_auth))
        .with_state(state)
}

/// Handle one connection: register, route inbound frames in order, and
/// unregister when the peer goes away.
async fn handle_socket(socket: WebSocket, state: Arc<WsAppState>, identity: Option<Identity>) {
    let hub = Arc::clone(state.router.hub());
    let (connection_id, outbound) = hub.connect();
    let mut session = state.router.open_session(connection_id, identity);

    let (sink, mut inbound) = socket.split();
    let writer = tokio::spawn(forward_outbound(
        Arc::clone(&hub),
        connection_id,
        outbound,
        sink,
    ));

    info!(connection_id = %connection_id, "WebSocket connection established");

    while let Some(msg) = inbound.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                state.router.route(&mut session, &text);
            }
            Ok(Message::Close(_)) => {
                info!(connection_id = %connection_id, "WebSocket client disconnected");
                break;
            }
            Ok(_) => {
                // Binary and pong ignored; pings are answered by the transport
            }
            Err(e) => {
                warn!(connection_id = %connection_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    state.router.close_session(&mut session);
    writer.abort();

    info!(connection_id = %connection_id, "WebSocket connection closed");
}

/// Drain the connection's outbound queue into the socket.
///
/// Ends when the hub drops the queue (connection unregistered) or the
/// socket write fails, in which case the connection is unregistered here.
async fn forward_outbound(
    hub: Arc<ConnectionHub>,
    connection_id: ConnectionId,
    outbound: mpsc::Receiver<String>,
    sink: SplitSink<WebSocket, Message>,
) {
    let result = ReceiverStream::new(outbound)
        .map(|text| Ok::<_, axum::Error>(Message::Text(text)))
        .forward(sink)
        .await;

    if let Err(e) = result {
        debug!(connection_id = %connection_id, error = %e, "WebSocket send failed");
        hub.unregister(connection_id);
    }
}
