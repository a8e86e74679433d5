//! Handlers for module gating endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/modules` | Definitions in order |
//! | `GET`  | `/learners/:id/modules` | Locked / unlocked / passed per module |
//! | `POST` | `/learners/:id/modules/:module_id/attempts` | Body: `{"correct_count":17,"total_count":20}`; 423 if locked |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
};
use mastery_core::{
  MasteryEngine,
  engine::AttemptOutcome,
  module::{ModuleDefinition, ModuleUnlock},
  store::ProgressStore,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiError;

/// `GET /modules`
pub async fn list<S: ProgressStore>(
  State(engine): State<Arc<MasteryEngine<S>>>,
) -> Json<Vec<ModuleDefinition>> {
  Json(engine.graph().modules().to_vec())
}

/// `GET /learners/:id/modules`
pub async fn unlock_state<S: ProgressStore>(
  State(engine): State<Arc<MasteryEngine<S>>>,
  Path(learner_id): Path<Uuid>,
) -> Result<Json<Vec<ModuleUnlock>>, ApiError> {
  Ok(Json(engine.unlock_state(learner_id).await?))
}

#[derive(Debug, Deserialize)]
pub struct AttemptBody {
  pub correct_count: u32,
  pub total_count:   u32,
}

/// `POST /learners/:id/modules/:module_id/attempts`
pub async fn submit_attempt<S: ProgressStore>(
  State(engine): State<Arc<MasteryEngine<S>>>,
  Path((learner_id, module_id)): Path<(Uuid, String)>,
  Json(body): Json<AttemptBody>,
) -> Result<Json<AttemptOutcome>, ApiError> {
  let outcome = engine
    .submit_module_attempt(learner_id, &module_id, body.correct_count, body.total_count)
    .await?;
  Ok(Json(outcome))
}
