//! JSON REST API for the mastery progression engine.
//!
//! Exposes an axum [`Router`] backed by a [`MasteryEngine`] over any
//! [`ProgressStore`]. Authentication happens upstream; the gateway forwards
//! the acting user in headers (see [`actor`]).
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", mastery_api::api_router(engine.clone()))
//! ```

pub mod actor;
pub mod admin;
pub mod error;
pub mod modules;
pub mod personality;
pub mod quizzes;
pub mod xp;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use mastery_core::{MasteryEngine, store::ProgressStore};

pub use error::ApiError;

/// Build the API router for `engine`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(engine: Arc<MasteryEngine<S>>) -> Router<()>
where
  S: ProgressStore + 'static,
{
  Router::new()
    // Modules
    .route("/modules", get(modules::list::<S>))
    .route("/learners/{id}/modules", get(modules::unlock_state::<S>))
    .route(
      "/learners/{id}/modules/{module_id}/attempts",
      post(modules::submit_attempt::<S>),
    )
    // Quizzes
    .route("/quizzes/{quiz_id}", get(quizzes::view::<S>))
    .route("/learners/{id}/quizzes/{quiz_id}/answers", post(quizzes::answer::<S>))
    .route(
      "/learners/{id}/quizzes/{quiz_id}/progress",
      get(quizzes::progress::<S>).delete(quizzes::reset::<S>),
    )
    // Personality
    .route("/personality/questionnaire", get(personality::questionnaire::<S>))
    .route(
      "/learners/{id}/personality",
      get(personality::result::<S>).post(personality::submit::<S>),
    )
    // XP
    .route("/learners/{id}/xp", get(xp::summary::<S>))
    // Administration
    .route("/admin/quizzes", post(admin::create_quiz::<S>))
    .route("/admin/quizzes/{quiz_id}/edits", post(admin::edit_quiz::<S>))
    .route("/admin/quizzes/{quiz_id}/invalidate", post(admin::invalidate::<S>))
    .with_state(engine)
}
