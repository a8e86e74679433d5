//! [`MasteryEngine`]: every learner- and admin-facing operation, generic over
//! a [`ProgressStore`].
//!
//! Submission flow: validate → normalise → write the progress row → award XP
//! (idempotently) → re-evaluate unlocks. Every validation happens before the
//! first write, so a rejected request leaves the store untouched.

use std::collections::HashSet;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
  Error,
  actor::Actor,
  module::{ModuleAttempt, ModuleDefinition, ModuleGraph, ModuleUnlock},
  personality::{PersonalityOutcome, PersonalityResult, Questionnaire},
  quiz::{ContentChange, NewQuiz, QuizAnswerOutcome, QuizContent, QuizEdit, QuizProgress},
  score::{DEFAULT_MAX_SCALE, NormalizedScore, normalize_counts},
  store::ProgressStore,
  xp::{AwardOutcome, SourceId, XpEntry, XpSummary},
};

// ─── Errors ──────────────────────────────────────────────────────────────────

/// Failure of an engine operation: either the request was rejected by a
/// domain rule, or the backing store failed.
#[derive(Debug, Error)]
pub enum EngineError<E> {
  #[error(transparent)]
  Rejected(#[from] Error),

  #[error("store error: {0}")]
  Store(#[source] E),
}

impl<E> EngineError<E> {
  /// The domain rejection, if this is one.
  pub fn rejection(&self) -> Option<&Error> {
    match self {
      EngineError::Rejected(e) => Some(e),
      EngineError::Store(_) => None,
    }
  }
}

pub type EngineResult<T, E> = std::result::Result<T, EngineError<E>>;

// ─── Configuration ───────────────────────────────────────────────────────────

fn default_personality_xp() -> u32 { 20 }

/// XP amounts not carried by module or quiz definitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewardConfig {
  /// Granted once, the first time a learner completes the questionnaire.
  #[serde(default = "default_personality_xp")]
  pub personality_xp: u32,
}

impl Default for RewardConfig {
  fn default() -> Self { Self { personality_xp: default_personality_xp() } }
}

// ─── Outcomes ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptOutcome {
  pub module_id:            String,
  /// Verdict of this attempt alone.
  pub passed:               bool,
  /// Whether the module is passed at all (never reverts).
  pub module_passed:        bool,
  pub raw_percentage:       f64,
  pub scaled_score:         f64,
  pub attempt_count:        u32,
  pub next_module_id:       Option<String>,
  pub next_module_unlocked: bool,
  pub xp_granted:           bool,
}

// ─── Engine ──────────────────────────────────────────────────────────────────

/// The mastery progression engine.
///
/// Holds the immutable module graph and questionnaire; all per-learner state
/// lives in the store.
pub struct MasteryEngine<S> {
  store:         S,
  graph:         ModuleGraph,
  questionnaire: Questionnaire,
  rewards:       RewardConfig,
  max_scale:     f64,
}

impl<S: ProgressStore> MasteryEngine<S> {
  pub fn new(store: S, graph: ModuleGraph) -> Self {
    Self {
      store,
      graph,
      questionnaire: Questionnaire::standard(),
      rewards: RewardConfig::default(),
      max_scale: DEFAULT_MAX_SCALE,
    }
  }

  pub fn with_rewards(mut self, rewards: RewardConfig) -> Self {
    self.rewards = rewards;
    self
  }

  pub fn with_questionnaire(mut self, questionnaire: Questionnaire) -> Self {
    self.questionnaire = questionnaire;
    self
  }

  pub fn store(&self) -> &S { &self.store }

  pub fn graph(&self) -> &ModuleGraph { &self.graph }

  pub fn questionnaire(&self) -> &Questionnaire { &self.questionnaire }

  pub fn module_definition(&self, module_id: &str) -> Option<&ModuleDefinition> {
    self.graph.get(module_id)
  }

  // ── Module graph ──────────────────────────────────────────────────────

  async fn passed_modules(&self, learner_id: Uuid) -> EngineResult<HashSet<String>, S::Error> {
    let attempts = self
      .store
      .list_module_attempts(learner_id)
      .await
      .map_err(EngineError::Store)?;
    Ok(
      attempts
        .into_iter()
        .filter(|a| a.passed)
        .map(|a| a.module_id)
        .collect(),
    )
  }

  pub async fn is_unlocked(&self, learner_id: Uuid, module_id: &str) -> EngineResult<bool, S::Error> {
    let module = self
      .graph
      .get(module_id)
      .ok_or_else(|| Error::ModuleNotFound(module_id.to_owned()))?;
    let Some(prereq) = &module.prerequisite_id else { return Ok(true) };
    let attempt = self
      .store
      .get_module_attempt(learner_id, prereq.clone())
      .await
      .map_err(EngineError::Store)?;
    Ok(attempt.is_some_and(|a| a.passed))
  }

  /// Status of every module for `learner_id`, in module order.
  pub async fn unlock_state(&self, learner_id: Uuid) -> EngineResult<Vec<ModuleUnlock>, S::Error> {
    let passed = self.passed_modules(learner_id).await?;
    Ok(self.graph.unlock_state(|id: &str| passed.contains(id)))
  }

  // ── Module attempts ───────────────────────────────────────────────────

  /// Score `correct_count / total_count` against the module's threshold and
  /// record it.
  pub async fn submit_module_attempt(
    &self,
    learner_id: Uuid,
    module_id: &str,
    correct_count: u32,
    total_count: u32,
  ) -> EngineResult<AttemptOutcome, S::Error> {
    let module = self
      .graph
      .get(module_id)
      .ok_or_else(|| Error::ModuleNotFound(module_id.to_owned()))?;
    let score = normalize_counts(
      correct_count,
      total_count,
      module.pass_threshold,
      self.max_scale,
    )?;
    self.record_attempt(learner_id, module_id, score).await
  }

  /// Record an already-normalised result for a module.
  ///
  /// Fails with [`Error::ModuleLocked`] before any write if the module's
  /// prerequisite has not been passed.
  pub async fn record_attempt(
    &self,
    learner_id: Uuid,
    module_id: &str,
    score: NormalizedScore,
  ) -> EngineResult<AttemptOutcome, S::Error> {
    let passed = self.passed_modules(learner_id).await?;
    let module = self
      .graph
      .require_unlocked(module_id, |id: &str| passed.contains(id))?;

    let attempt = self
      .store
      .record_module_attempt(learner_id, module.id.clone(), score, self.max_scale, Utc::now())
      .await
      .map_err(EngineError::Store)?;
    let module_passed = attempt.passed;
    let attempt_count = attempt.attempt_count;

    let xp_granted = if module_passed {
      self
        .award(learner_id, SourceId::module(&module.id), module.xp_reward)
        .await?
        .granted
    } else {
      false
    };

    let is_passed = |id: &str| passed.contains(id) || (module_passed && id == module.id);
    let next = self.graph.dependents(&module.id).next();
    let next_module_unlocked = next.is_some_and(|m| self.graph.is_unlocked(m, is_passed));

    debug!(
      %learner_id,
      module_id = %module.id,
      raw = score.raw_percentage,
      passed = score.passed,
      attempt_count,
      "module attempt recorded"
    );

    Ok(AttemptOutcome {
      module_id: module.id.clone(),
      passed: score.passed,
      module_passed,
      raw_percentage: score.raw_percentage,
      scaled_score: if module_passed { self.max_scale } else { score.scaled_score },
      attempt_count,
      next_module_id: next.map(|m| m.id.clone()),
      next_module_unlocked,
      xp_granted,
    })
  }

  pub async fn module_attempts(&self, learner_id: Uuid) -> EngineResult<Vec<ModuleAttempt>, S::Error> {
    self
      .store
      .list_module_attempts(learner_id)
      .await
      .map_err(EngineError::Store)
  }

  // ── Quizzes ───────────────────────────────────────────────────────────

  pub async fn quiz(&self, quiz_id: &str) -> EngineResult<QuizContent, S::Error> {
    self
      .store
      .get_quiz_content(quiz_id.to_owned())
      .await
      .map_err(EngineError::Store)?
      .ok_or_else(|| Error::QuizNotFound(quiz_id.to_owned()).into())
  }

  /// The learner's progress on the current version of `quiz_id`. Progress
  /// recorded against an older version is reported as absent.
  pub async fn quiz_progress(
    &self,
    learner_id: Uuid,
    quiz_id: &str,
  ) -> EngineResult<Option<QuizProgress>, S::Error> {
    let content = self.quiz(quiz_id).await?;
    let progress = self
      .store
      .get_quiz_progress(learner_id, quiz_id.to_owned())
      .await
      .map_err(EngineError::Store)?;
    Ok(progress.filter(|p| p.is_current(content.version)))
  }

  /// Answer one question of a quiz.
  ///
  /// Progress left over from an older content version is replaced by a fresh
  /// row, so answers from different versions never mix. Once the quiz is
  /// completed at the current version, further answers are checked but not
  /// recorded.
  pub async fn submit_quiz_answer(
    &self,
    learner_id: Uuid,
    quiz_id: &str,
    question_index: usize,
    option_index: usize,
  ) -> EngineResult<QuizAnswerOutcome, S::Error> {
    let content = self.quiz(quiz_id).await?;
    let correct = content.check_answer(question_index, option_index)?;

    let recorded = self
      .store
      .record_quiz_answer(learner_id, content.clone(), question_index, option_index, Utc::now())
      .await
      .map_err(EngineError::Store)?;
    if let Some(seen) = recorded.discarded_version {
      debug!(
        %learner_id,
        quiz_id,
        seen,
        current = content.version,
        "discarded stale quiz progress"
      );
    }

    let progress = &recorded.progress;
    let outcome = QuizAnswerOutcome {
      correct,
      completed: progress.completed,
      score: progress.score,
      passed: progress.passed,
      answered_count: progress.answered_count,
      xp_granted: false,
    };

    if !(recorded.recorded && outcome.completed && outcome.passed) {
      return Ok(outcome);
    }

    let source = SourceId::quiz(&content.quiz_id, content.version);
    let granted = self.award(learner_id, source, content.xp_reward).await?.granted;

    // An edit may have landed between reading the content and granting; its
    // sweep would have missed this entry, so run it again.
    let current = self.quiz(quiz_id).await?;
    if current.version != content.version {
      warn!(
        quiz_id,
        awarded_version = content.version,
        current_version = current.version,
        "quiz edited during award, re-running invalidation"
      );
      self.on_content_changed(quiz_id).await?;
    }

    Ok(QuizAnswerOutcome { xp_granted: granted, ..outcome })
  }

  /// Discard a learner's progress on a quiz so they can retake it.
  pub async fn reset_quiz_progress(&self, learner_id: Uuid, quiz_id: &str) -> EngineResult<bool, S::Error> {
    self.quiz(quiz_id).await?;
    self
      .store
      .delete_quiz_progress(learner_id, quiz_id.to_owned())
      .await
      .map_err(EngineError::Store)
  }

  // ── Personality ───────────────────────────────────────────────────────

  /// Classify a completed questionnaire, store the result (replacing any
  /// earlier one) and award the one-off completion XP.
  pub async fn submit_personality_answers(
    &self,
    learner_id: Uuid,
    answers: &[usize],
  ) -> EngineResult<PersonalityOutcome, S::Error> {
    let classification = self.questionnaire.classify(answers)?;

    self
      .store
      .upsert_personality_result(PersonalityResult {
        learner_id,
        primary: classification.primary,
        secondary: classification.secondary,
        scores: classification.scores,
        questionnaire_version: self.questionnaire.version,
        answered_at: Utc::now(),
      })
      .await
      .map_err(EngineError::Store)?;

    let xp_granted = self
      .award(learner_id, SourceId::Personality, self.rewards.personality_xp)
      .await?
      .granted;

    Ok(PersonalityOutcome {
      primary: classification.primary,
      secondary: classification.secondary,
      scores: classification.scores,
      xp_granted,
    })
  }

  pub async fn personality_result(&self, learner_id: Uuid) -> EngineResult<Option<PersonalityResult>, S::Error> {
    self
      .store
      .get_personality_result(learner_id)
      .await
      .map_err(EngineError::Store)
  }

  // ── XP ────────────────────────────────────────────────────────────────

  /// Grant `amount` XP for `source_id` at most once per learner.
  ///
  /// A repeated or concurrent call for an already-granted source returns
  /// `granted: false`; that is the expected outcome of a retry.
  pub async fn award(
    &self,
    learner_id: Uuid,
    source_id: SourceId,
    amount: u32,
  ) -> EngineResult<AwardOutcome, S::Error> {
    let entry = XpEntry {
      learner_id,
      source_id: source_id.clone(),
      amount,
      awarded_at: Utc::now(),
    };
    let granted = self
      .store
      .try_insert_xp_entry(entry)
      .await
      .map_err(EngineError::Store)?;

    if granted {
      info!(%learner_id, source = %source_id, amount, "xp granted");
    } else {
      debug!(%learner_id, source = %source_id, "xp already granted");
    }
    Ok(AwardOutcome { granted })
  }

  /// Remove the entry for `source_id`, if present. Used by invalidation.
  pub async fn revoke(&self, learner_id: Uuid, source_id: SourceId) -> EngineResult<bool, S::Error> {
    let removed = self
      .store
      .delete_xp_entry(learner_id, source_id.clone())
      .await
      .map_err(EngineError::Store)?;
    if let Some(entry) = &removed {
      info!(%learner_id, source = %source_id, amount = entry.amount, "xp revoked");
    }
    Ok(removed.is_some())
  }

  pub async fn total_xp(&self, learner_id: Uuid) -> EngineResult<u64, S::Error> {
    self.store.sum_xp(learner_id).await.map_err(EngineError::Store)
  }

  pub async fn xp_summary(&self, learner_id: Uuid) -> EngineResult<XpSummary, S::Error> {
    let entries = self
      .store
      .list_xp_entries(learner_id)
      .await
      .map_err(EngineError::Store)?;
    let total = self.total_xp(learner_id).await?;
    Ok(XpSummary { learner_id, total, entries })
  }

  // ── Content administration ────────────────────────────────────────────

  pub async fn create_quiz(&self, actor: &Actor, quiz: NewQuiz) -> EngineResult<QuizContent, S::Error> {
    actor.require_admin()?;
    quiz.validate()?;
    let content = quiz.into_content();
    let created = self
      .store
      .create_quiz(content.clone())
      .await
      .map_err(EngineError::Store)?;
    if !created {
      return Err(Error::QuizAlreadyExists(content.quiz_id).into());
    }
    info!(quiz_id = %content.quiz_id, questions = content.questions.len(), "quiz created");
    Ok(content)
  }

  /// Apply an admin edit as a single version bump.
  ///
  /// The new question set, the version increment and the revocation of XP
  /// earned against older versions commit together. Stale progress rows are
  /// left in place and ignored by every read path from then on.
  ///
  /// When `expected_version` is given and another edit has landed since, the
  /// edit is rejected with [`Error::VersionConflict`].
  pub async fn edit_quiz(
    &self,
    actor: &Actor,
    quiz_id: &str,
    expected_version: Option<u64>,
    edit: QuizEdit,
  ) -> EngineResult<ContentChange, S::Error> {
    actor.require_admin()?;
    let content = self.quiz(quiz_id).await?;
    if let Some(expected) = expected_version
      && expected != content.version
    {
      return Err(
        Error::VersionConflict {
          quiz_id: quiz_id.to_owned(),
          expected,
          actual: content.version,
        }
        .into(),
      );
    }
    let questions = edit.apply(&content)?;

    let change = self
      .store
      .commit_quiz_edit(quiz_id.to_owned(), content.version, questions)
      .await
      .map_err(EngineError::Store)?;
    let Some(change) = change else {
      let actual = self.quiz(quiz_id).await?.version;
      return Err(
        Error::VersionConflict {
          quiz_id: quiz_id.to_owned(),
          expected: content.version,
          actual,
        }
        .into(),
      );
    };

    info!(
      quiz_id,
      version = change.content.version,
      revoked = change.revoked_xp.len(),
      editor = %actor.user_id,
      "quiz content changed"
    );
    Ok(change)
  }

  /// Revoke every XP entry earned against an older version of `quiz_id`.
  ///
  /// Idempotent, and atomic across learners. [`edit_quiz`](Self::edit_quiz)
  /// already performs this sweep; this entry point exists for content changed
  /// outside the engine.
  pub async fn on_content_changed(&self, quiz_id: &str) -> EngineResult<Vec<XpEntry>, S::Error> {
    let content = self.quiz(quiz_id).await?;
    let revoked = self
      .store
      .revoke_stale_quiz_xp(quiz_id.to_owned(), content.version)
      .await
      .map_err(EngineError::Store)?;
    for entry in &revoked {
      info!(
        learner_id = %entry.learner_id,
        source = %entry.source_id,
        amount = entry.amount,
        "xp revoked by content change"
      );
    }
    Ok(revoked)
  }

  /// Admin-triggered form of [`on_content_changed`](Self::on_content_changed).
  pub async fn on_admin_content_edit(
    &self,
    actor: &Actor,
    quiz_id: &str,
  ) -> EngineResult<Vec<XpEntry>, S::Error> {
    actor.require_admin()?;
    self.on_content_changed(quiz_id).await
  }
}
