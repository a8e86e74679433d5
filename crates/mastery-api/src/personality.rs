//! Handlers for the money-personality questionnaire.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/personality/questionnaire` | Weights hidden |
//! | `POST` | `/learners/:id/personality` | Body: `{"answers":[0,3,1,...]}`, one option per question |
//! | `GET`  | `/learners/:id/personality` | 404 if never taken |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
};
use mastery_core::{
  MasteryEngine,
  personality::{PersonalityOutcome, PersonalityResult, QuestionnaireView},
  store::ProgressStore,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiError;

/// `GET /personality/questionnaire`
pub async fn questionnaire<S: ProgressStore>(
  State(engine): State<Arc<MasteryEngine<S>>>,
) -> Json<QuestionnaireView> {
  Json(engine.questionnaire().to_view())
}

#[derive(Debug, Deserialize)]
pub struct SubmitBody {
  pub answers: Vec<usize>,
}

/// `POST /learners/:id/personality`
pub async fn submit<S: ProgressStore>(
  State(engine): State<Arc<MasteryEngine<S>>>,
  Path(learner_id): Path<Uuid>,
  Json(body): Json<SubmitBody>,
) -> Result<Json<PersonalityOutcome>, ApiError> {
  Ok(Json(engine.submit_personality_answers(learner_id, &body.answers).await?))
}

/// `GET /learners/:id/personality`
pub async fn result<S: ProgressStore>(
  State(engine): State<Arc<MasteryEngine<S>>>,
  Path(learner_id): Path<Uuid>,
) -> Result<Json<PersonalityResult>, ApiError> {
  let result = engine
    .personality_result(learner_id)
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("learner {learner_id} has no personality result")))?;
  Ok(Json(result))
}
