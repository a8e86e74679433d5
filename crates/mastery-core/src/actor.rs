//! The acting user behind a request.
//!
//! Identity is established upstream (gateway or session layer); the engine
//! only inspects the role when a content mutation is requested.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

use crate::{Error, Result};

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
  Learner,
  Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
  pub user_id: Uuid,
  pub role:    Role,
}

impl Actor {
  pub fn learner(user_id: Uuid) -> Self { Self { user_id, role: Role::Learner } }

  pub fn admin(user_id: Uuid) -> Self { Self { user_id, role: Role::Admin } }

  /// Fail with [`Error::PermissionDenied`] unless this actor is an admin.
  pub fn require_admin(&self) -> Result<()> {
    match self.role {
      Role::Admin => Ok(()),
      Role::Learner => Err(Error::PermissionDenied(format!(
        "user {} may not modify quiz content",
        self.user_id
      ))),
    }
  }
}
