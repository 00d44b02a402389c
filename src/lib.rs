// Great-circle distance
pub mod geo;

// Per-role live positions
pub mod presence;

// Wire protocol
pub mod protocol;

// Connection set, broadcast and presence ownership
pub mod hub;

// Nearest-agent matching
pub mod dispatch;

// Per-connection event routing
pub mod router;

// Incident and chat persistence collaborator
pub mod store;

// Connection identity
pub mod auth;

// Configuration
pub mod config;

// HTTP and WebSocket APIs
pub mod api;
