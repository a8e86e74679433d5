//! Handlers for learner-facing quiz endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/quizzes/:quiz_id` | Current content without the answer key |
//! | `POST`   | `/learners/:id/quizzes/:quiz_id/answers` | Body: `{"question_index":0,"option_index":2}` |
//! | `GET`    | `/learners/:id/quizzes/:quiz_id/progress` | 404 if none at the current version |
//! | `DELETE` | `/learners/:id/quizzes/:quiz_id/progress` | Start over |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
};
use mastery_core::{
  MasteryEngine,
  quiz::{QuizAnswerOutcome, QuizProgress, QuizView},
  store::ProgressStore,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiError;

/// `GET /quizzes/:quiz_id`
pub async fn view<S: ProgressStore>(
  State(engine): State<Arc<MasteryEngine<S>>>,
  Path(quiz_id): Path<String>,
) -> Result<Json<QuizView>, ApiError> {
  Ok(Json(engine.quiz(&quiz_id).await?.to_view()))
}

#[derive(Debug, Deserialize)]
pub struct AnswerBody {
  pub question_index: usize,
  pub option_index:   usize,
}

/// `POST /learners/:id/quizzes/:quiz_id/answers`
pub async fn answer<S: ProgressStore>(
  State(engine): State<Arc<MasteryEngine<S>>>,
  Path((learner_id, quiz_id)): Path<(Uuid, String)>,
  Json(body): Json<AnswerBody>,
) -> Result<Json<QuizAnswerOutcome>, ApiError> {
  let outcome = engine
    .submit_quiz_answer(learner_id, &quiz_id, body.question_index, body.option_index)
    .await?;
  Ok(Json(outcome))
}

/// `GET /learners/:id/quizzes/:quiz_id/progress`
pub async fn progress<S: ProgressStore>(
  State(engine): State<Arc<MasteryEngine<S>>>,
  Path((learner_id, quiz_id)): Path<(Uuid, String)>,
) -> Result<Json<QuizProgress>, ApiError> {
  let progress = engine
    .quiz_progress(learner_id, &quiz_id)
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("no progress on quiz {quiz_id}")))?;
  Ok(Json(progress))
}

/// `DELETE /learners/:id/quizzes/:quiz_id/progress`
pub async fn reset<S: ProgressStore>(
  State(engine): State<Arc<MasteryEngine<S>>>,
  Path((learner_id, quiz_id)): Path<(Uuid, String)>,
) -> Result<StatusCode, ApiError> {
  engine.reset_quiz_progress(learner_id, &quiz_id).await?;
  Ok(StatusCode::NO_CONTENT)
}
