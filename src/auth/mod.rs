use crate::presence::{ActorId, Role};
use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;


/// Kind of user behind a connection
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserKind {
    Agent,
    Victim,
    /// Console operator; watches but has no tracked position
    Dispatcher,
}

impl UserKind {
    /// Presence role this user may publish positions under
    pub fn presence_role(&self) -> Option<Role> {
        match self {
            UserKind::Agent => Some(Role::Agent),
            UserKind::Victim => Some(Role::Victim),
            UserKind::Dispatcher => None,
        }
    }
}

/// Verified identity attached to a connection at accept time
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: ActorId,
    pub kind: UserKind,
}

impl Identity {
    /// Whether this identity may publish a location for `(role, actor_id)`
    pub fn may_publish(&self, role: Role, actor_id: ActorId) -> bool {
        self.kind.presence_role() == Some(role) && self.user_id == actor_id
    }
}

/// Resolves an access token to a verified identity.
///
/// Token issuance lives outside the hub; the hub trusts whatever this
/// returns.
pub trait IdentityResolver: Send + Sync {
    fn resolve(&self, token: &str) -> Option<Identity>;
}

/// One configured token
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TokenGrant {
    pub token: String,
    pub user_id: ActorId,
    #[serde(alias = "role")]
    pub kind: UserKind,
}

/// Resolver backed by a fixed token table
#[derive(Default)]
pub struct StaticTokenResolver {
    tokens: HashMap<String, Identity>,
}

impl StaticTokenResolver {
    pub fn new(grants: &[TokenGrant]) -> Self {
        let tokens = grants
            .iter()
            .map(|g| {
                (
                    g.token.clone(),
                    Identity {
                        user_id: g.user_id,
                        kind: g.kind,
                    },
                )
            })
            .collect();
        Self { tokens }
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl IdentityResolver for StaticTokenResolver {
    fn resolve(&self, token: &str) -> Option<Identity> {
        self.tokens.get(token).copied()
    }
}

/// Extract bearer token from HTTP Authorization header
///
/// Expected format: "Authorization: Bearer <token>"
pub fn extract_bearer_token(headers: &HeaderMap) -> Result<String, TokenError> {
    let auth_header = headers
        .get("authorization")
        .ok_or(TokenError::Missing)?
        .to_str()
        .map_err(|_| TokenError::InvalidFormat)?;

    parse_bearer_token(auth_header)
}

/// Pick the connection token from `?token=` or the Authorization header.
///
/// Browsers cannot set headers on a WebSocket handshake, so the query
/// parameter wins when both are present.
pub fn extract_connection_token(
    query_token: Option<&str>,
    headers: &HeaderMap,
) -> Result<String, TokenError> {
    match query_token {
        Some(token) => {
            let token = token.trim();
            if token.is_empty() {
                Err(TokenError::Empty)
            } else {
                Ok(token.to_string())
            }
        }
        None => extract_bearer_token(headers),
    }
}

fn parse_bearer_token(header_value: &str) -> Result<String, TokenError> {
    let parts: Vec<&str> = header_value.splitn(2, ' ').collect();

    if parts.len() != 2 {
        return Err(TokenError::InvalidFormat);
    }

    if parts[0].to_lowercase() != "bearer" {
        return Err(TokenError::InvalidFormat);
    }

    let token = parts[1].trim();
    if token.is_empty() {
        return Err(TokenError::Empty);
    }

    Ok(token.to_string())
}

/// Token extraction errors
#[derive(Debug, PartialEq, Clone)]
pub enum TokenError {
    /// Authorization header or token parameter not present
    Missing,
    /// Invalid format (not "Bearer <token>")
    InvalidFormat,
    /// Token is empty string
    Empty,
}

impl std::fmt::Display for TokenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenError::Missing => write!(f, "Authorization token not provided"),
            TokenError::InvalidFormat => write!(f, "Invalid authorization token format"),
            TokenError::Empty => write!(f, "Authorization token is empty"),
        }
    }
}

impl std::error::Error for TokenError {}
