//! Content administration. Every route requires `x-actor-role: admin`.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/admin/quizzes` | Body: [`NewQuiz`]; 409 if the id is taken |
//! | `POST` | `/admin/quizzes/:quiz_id/edits` | Body: `{"op":"delete_question","index":2,"expected_version":3}` |
//! | `POST` | `/admin/quizzes/:quiz_id/invalidate` | Re-run the XP sweep |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use mastery_core::{
  MasteryEngine,
  quiz::{ContentChange, NewQuiz, QuizEdit},
  store::ProgressStore,
  xp::XpEntry,
};
use serde::{Deserialize, Serialize};

use crate::{actor::RequestActor, error::ApiError};

/// `POST /admin/quizzes`
pub async fn create_quiz<S: ProgressStore>(
  State(engine): State<Arc<MasteryEngine<S>>>,
  RequestActor(actor): RequestActor,
  Json(quiz): Json<NewQuiz>,
) -> Result<impl IntoResponse, ApiError> {
  let content = engine.create_quiz(&actor, quiz).await?;
  Ok((StatusCode::CREATED, Json(content)))
}

#[derive(Debug, Deserialize)]
pub struct EditBody {
  /// Reject the edit with 409 if the quiz has moved past this version.
  #[serde(default)]
  pub expected_version: Option<u64>,
  #[serde(flatten)]
  pub edit:             QuizEdit,
}

/// `POST /admin/quizzes/:quiz_id/edits`
pub async fn edit_quiz<S: ProgressStore>(
  State(engine): State<Arc<MasteryEngine<S>>>,
  RequestActor(actor): RequestActor,
  Path(quiz_id): Path<String>,
  Json(body): Json<EditBody>,
) -> Result<Json<ContentChange>, ApiError> {
  let change = engine
    .edit_quiz(&actor, &quiz_id, body.expected_version, body.edit)
    .await?;
  Ok(Json(change))
}

#[derive(Debug, Serialize)]
pub struct InvalidateResponse {
  pub revoked: Vec<XpEntry>,
}

/// `POST /admin/quizzes/:quiz_id/invalidate`
pub async fn invalidate<S: ProgressStore>(
  State(engine): State<Arc<MasteryEngine<S>>>,
  RequestActor(actor): RequestActor,
  Path(quiz_id): Path<String>,
) -> Result<Json<InvalidateResponse>, ApiError> {
  let revoked = engine.on_admin_content_edit(&actor, &quiz_id).await?;
  Ok(Json(InvalidateResponse { revoked }))
}
