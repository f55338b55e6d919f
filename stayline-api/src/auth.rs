use axum::http::HeaderMap;
use uuid::Uuid;

use stayline_shared::{Actor, ActorRole};

use crate::error::AppError;

/// Caller identity from the gateway-verified headers. Token validation
/// lives in the edge auth service; by the time a request reaches this
/// subsystem, `x-actor-id` is trusted.
pub fn actor_from_headers(headers: &HeaderMap) -> Result<Actor, AppError> {
    let id = headers
        .get("x-actor-id")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("missing x-actor-id header".to_string()))?;
    let id = Uuid::parse_str(id)
        .map_err(|_| AppError::Unauthorized("x-actor-id is not a valid UUID".to_string()))?;

    let role = match headers.get("x-actor-role").and_then(|v| v.to_str().ok()) {
        None | Some("guest") => ActorRole::Guest,
        Some("host") => ActorRole::Host,
        Some("admin") => ActorRole::Admin,
        Some(other) => {
            return Err(AppError::Unauthorized(format!("unknown actor role {other:?}")))
        }
    };

    Ok(Actor { id, role })
}

pub fn require_admin(headers: &HeaderMap) -> Result<Actor, AppError> {
    let actor = actor_from_headers(headers)?;
    if actor.role != ActorRole::Admin {
        return Err(AppError::Forbidden("admin role required".to_string()));
    }
    Ok(actor)
}
