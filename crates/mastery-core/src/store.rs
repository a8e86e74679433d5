//! The `ProgressStore` trait: the persistence collaborator the engine runs on.
//!
//! The trait is implemented by storage backends (e.g. `mastery-store-sqlite`).
//! The engine and the API layer depend on this abstraction, not on any
//! concrete backend.

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  module::ModuleAttempt,
  personality::PersonalityResult,
  quiz::{ContentChange, Question, QuizContent, QuizProgress, RecordedAnswer},
  score::NormalizedScore,
  xp::{SourceId, XpEntry},
};

/// Abstraction over the learner-progress and content store.
///
/// These operations carry transactional guarantees every backend must honour:
///
/// - [`try_insert_xp_entry`](Self::try_insert_xp_entry) is a single atomic
///   conditional insert; concurrent calls for the same `(learner, source)`
///   produce exactly one row.
/// - [`record_module_attempt`](Self::record_module_attempt) and
///   [`record_quiz_answer`](Self::record_quiz_answer) read, merge and write
///   a learner's row in one transaction.
/// - [`commit_quiz_edit`](Self::commit_quiz_edit) bumps the content version,
///   stores the new question set and revokes XP earned against older versions
///   in one transaction.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait ProgressStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Module attempts ───────────────────────────────────────────────────

  fn get_module_attempt(
    &self,
    learner_id: Uuid,
    module_id: String,
  ) -> impl Future<Output = Result<Option<ModuleAttempt>, Self::Error>> + Send + '_;

  /// All attempts recorded for a learner, in no particular order.
  fn list_module_attempts(
    &self,
    learner_id: Uuid,
  ) -> impl Future<Output = Result<Vec<ModuleAttempt>, Self::Error>> + Send + '_;

  /// Fold `score` into the learner's row for `module_id` with
  /// [`ModuleAttempt::record`] and store the result. The read and the write
  /// form one transaction, so concurrent submissions never lose an attempt
  /// or revert a pass.
  fn record_module_attempt(
    &self,
    learner_id: Uuid,
    module_id: String,
    score: NormalizedScore,
    max_scale: f64,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<ModuleAttempt, Self::Error>> + Send + '_;

  // ── Quiz content ──────────────────────────────────────────────────────

  /// Persist a new quiz at version 1. Returns `false` if the id is taken.
  fn create_quiz(
    &self,
    content: QuizContent,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// The current version of a quiz and its question set.
  fn get_quiz_content(
    &self,
    quiz_id: String,
  ) -> impl Future<Output = Result<Option<QuizContent>, Self::Error>> + Send + '_;

  /// Atomically replace a quiz's question set under the next version.
  ///
  /// Fails (returns `Ok(None)`) without writing anything if the current
  /// version is no longer `expected_version`. On success, XP entries earned
  /// against any older version of the quiz are deleted in the same
  /// transaction and returned.
  fn commit_quiz_edit(
    &self,
    quiz_id: String,
    expected_version: u64,
    questions: Vec<Question>,
  ) -> impl Future<Output = Result<Option<ContentChange>, Self::Error>> + Send + '_;

  // ── Quiz progress ─────────────────────────────────────────────────────

  /// The stored row, whatever version it was recorded against. Callers must
  /// check the version before trusting it.
  fn get_quiz_progress(
    &self,
    learner_id: Uuid,
    quiz_id: String,
  ) -> impl Future<Output = Result<Option<QuizProgress>, Self::Error>> + Send + '_;

  /// Record one answer, already bounds-checked against `content`, in a
  /// single transaction: resume the stored row with
  /// [`QuizProgress::resume`], leave it untouched if already completed,
  /// otherwise apply [`QuizProgress::answer`] and write it back.
  fn record_quiz_answer(
    &self,
    learner_id: Uuid,
    content: QuizContent,
    question_index: usize,
    option_index: usize,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<RecordedAnswer, Self::Error>> + Send + '_;

  /// Idempotent; returns whether a row was removed.
  fn delete_quiz_progress(
    &self,
    learner_id: Uuid,
    quiz_id: String,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Personality ───────────────────────────────────────────────────────

  fn get_personality_result(
    &self,
    learner_id: Uuid,
  ) -> impl Future<Output = Result<Option<PersonalityResult>, Self::Error>> + Send + '_;

  fn upsert_personality_result(
    &self,
    result: PersonalityResult,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── XP ledger ─────────────────────────────────────────────────────────

  /// Insert `entry` unless `(learner_id, source_id)` already exists.
  /// Returns whether the row was created. Must be a single conditional write.
  fn try_insert_xp_entry(
    &self,
    entry: XpEntry,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Idempotent delete; returns the removed entry, if any.
  fn delete_xp_entry(
    &self,
    learner_id: Uuid,
    source_id: SourceId,
  ) -> impl Future<Output = Result<Option<XpEntry>, Self::Error>> + Send + '_;

  /// Delete every entry earned against `quiz_id` at a version older than
  /// `current_version`, across all learners, in one transaction.
  fn revoke_stale_quiz_xp(
    &self,
    quiz_id: String,
    current_version: u64,
  ) -> impl Future<Output = Result<Vec<XpEntry>, Self::Error>> + Send + '_;

  fn sum_xp(
    &self,
    learner_id: Uuid,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  /// A learner's entries, oldest first.
  fn list_xp_entries(
    &self,
    learner_id: Uuid,
  ) -> impl Future<Output = Result<Vec<XpEntry>, Self::Error>> + Send + '_;
}
