//! `GET /learners/:id/xp`: the learner's total and the ledger entries behind it.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
};
use mastery_core::{MasteryEngine, store::ProgressStore, xp::XpSummary};
use uuid::Uuid;

use crate::error::ApiError;

pub async fn summary<S: ProgressStore>(
  State(engine): State<Arc<MasteryEngine<S>>>,
  Path(learner_id): Path<Uuid>,
) -> Result<Json<XpSummary>, ApiError> {
  Ok(Json(engine.xp_summary(learner_id).await?))
}
