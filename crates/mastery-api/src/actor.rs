//! Acting-user extractor.
//!
//! The gateway in front of this API authenticates the caller and forwards the
//! result as two headers:
//!
//! | Header | Value |
//! |--------|-------|
//! | `x-actor-id`   | user UUID |
//! | `x-actor-role` | `learner` or `admin` |

use axum::{
  extract::FromRequestParts,
  http::{HeaderMap, request::Parts},
};
use mastery_core::{
  Error,
  actor::{Actor, Role},
};
use uuid::Uuid;

use crate::error::ApiError;

pub const ACTOR_ID_HEADER: &str = "x-actor-id";
pub const ACTOR_ROLE_HEADER: &str = "x-actor-role";

/// The actor asserted by the request headers.
#[derive(Debug, Clone, Copy)]
pub struct RequestActor(pub Actor);

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str, ApiError> {
  let value = headers
    .get(name)
    .ok_or_else(|| Error::PermissionDenied(format!("missing {name} header")))?;
  value
    .to_str()
    .map_err(|_| ApiError::BadRequest(format!("{name} is not valid ASCII")))
}

/// Read the actor from `headers`. A missing header is a permission failure; a
/// malformed one is a bad request.
pub fn actor_from_headers(headers: &HeaderMap) -> Result<Actor, ApiError> {
  let user_id = header(headers, ACTOR_ID_HEADER)?;
  let user_id = Uuid::parse_str(user_id)
    .map_err(|_| ApiError::BadRequest(format!("{ACTOR_ID_HEADER} is not a UUID")))?;
  let role = header(headers, ACTOR_ROLE_HEADER)?;
  let role: Role = role
    .parse()
    .map_err(|_| ApiError::BadRequest(format!("unknown role {role:?}")))?;
  Ok(Actor { user_id, role })
}

impl<St> FromRequestParts<St> for RequestActor
where
  St: Send + Sync,
{
  type Rejection = ApiError;

  async fn from_request_parts(parts: &mut Parts, _state: &St) -> Result<Self, Self::Rejection> {
    actor_from_headers(&parts.headers).map(RequestActor)
  }
}
