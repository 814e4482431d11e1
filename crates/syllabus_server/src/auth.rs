//! Role headers extractor.
//!
//! Every content route requires `x-user-id` (UUID) and `x-user-role`.
//! Missing or malformed headers reject with 401; a non-editor role with 403.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use log::warn;
use syllabus_core::policy::role_gate::authorize;
use syllabus_core::{Actor, Role};
use uuid::Uuid;

use crate::error::AppError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// Actor allowed to use the content editors.
#[derive(Debug, Clone)]
pub struct Editor(pub Actor);

#[async_trait]
impl<S> FromRequestParts<S> for Editor
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let actor = actor_from_parts(parts).ok_or(AppError::Unauthenticated)?;
        if !authorize(&actor.role) {
            warn!(
                "event=http_auth module=server status=denied actor_id={} role={}",
                actor.id, actor.role
            );
            return Err(AppError::Forbidden(actor.role.to_string()));
        }
        Ok(Self(actor))
    }
}

fn actor_from_parts(parts: &Parts) -> Option<Actor> {
    let header = |name: &str| {
        parts
            .headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
    };
    let id = Uuid::parse_str(header(USER_ID_HEADER)?).ok()?;
    let role = Role::parse(header(USER_ROLE_HEADER)?);
    Some(Actor::new(id, role))
}
