//! Integration tests for `SqliteStore` and the engine running on it, against
//! an in-memory database.

use std::sync::Arc;

use chrono::Utc;
use mastery_core::{
  EngineError, Error, MasteryEngine,
  actor::Actor,
  module::{ModuleGraph, UnlockStatus},
  personality::{Category, PersonalityResult, Questionnaire},
  quiz::{NewQuiz, Question, QuizEdit},
  score::normalize_counts,
  store::ProgressStore,
  xp::{SourceId, XpEntry},
};
use uuid::Uuid;

use crate::SqliteStore;

type Engine = MasteryEngine<SqliteStore>;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn modules() -> ModuleGraph {
  ModuleGraph::chain(["budgeting", "saving", "credit", "investing"], 80).unwrap()
}

async fn engine() -> Engine { MasteryEngine::new(store().await, modules()) }

fn admin() -> Actor { Actor::admin(Uuid::new_v4()) }

fn question(n: usize) -> Question {
  Question {
    prompt:         format!("Question {n}"),
    options:        vec!["A".into(), "B".into(), "C".into(), "D".into()],
    correct_option: n % 4,
  }
}

fn xp_entry(learner_id: Uuid, source_id: SourceId, amount: u32) -> XpEntry {
  XpEntry { learner_id, source_id, amount, awarded_at: Utc::now() }
}

/// A ten-question quiz worth 30 XP at the default 70% threshold.
async fn seed_quiz(e: &Engine, quiz_id: &str) {
  let mut quiz = NewQuiz::new(quiz_id, (0..10).map(question).collect());
  quiz.xp_reward = 30;
  e.create_quiz(&admin(), quiz).await.unwrap();
}

/// Answer every question, getting exactly `correct` of them right.
async fn answer_quiz(e: &Engine, learner: Uuid, quiz_id: &str, correct: usize) {
  for n in 0..10 {
    let right = n % 4;
    let choice = if n < correct { right } else { (right + 1) % 4 };
    e.submit_quiz_answer(learner, quiz_id, n, choice).await.unwrap();
  }
}

fn rejection<E: std::fmt::Debug>(err: EngineError<E>) -> Error {
  match err {
    EngineError::Rejected(e) => e,
    other => panic!("expected a rejection, got {other:?}"),
  }
}

// ─── Store: module attempts ──────────────────────────────────────────────────

#[tokio::test]
async fn module_attempt_roundtrip() {
  let s = store().await;
  let learner = Uuid::new_v4();
  let score = normalize_counts(17, 20, 80, 100.0).unwrap();

  let attempt = s
    .record_module_attempt(learner, "budgeting".into(), score, 100.0, Utc::now())
    .await
    .unwrap();
  assert_eq!(attempt.attempt_count, 1);

  let fetched = s
    .get_module_attempt(learner, "budgeting".into())
    .await
    .unwrap()
    .unwrap();
  assert_eq!(fetched, attempt);
  assert_eq!(fetched.raw_score, 85.0);
  assert_eq!(fetched.scaled_score, 100.0);

  let missing = s.get_module_attempt(learner, "saving".into()).await.unwrap();
  assert!(missing.is_none());
}

#[tokio::test]
async fn record_module_attempt_folds_into_the_stored_row() {
  let s = store().await;
  let learner = Uuid::new_v4();
  let fail = normalize_counts(1, 10, 80, 100.0).unwrap();
  let pass = normalize_counts(9, 10, 80, 100.0).unwrap();

  s.record_module_attempt(learner, "budgeting".into(), pass, 100.0, Utc::now())
    .await
    .unwrap();
  let latest = s
    .record_module_attempt(learner, "budgeting".into(), fail, 100.0, Utc::now())
    .await
    .unwrap();
  assert_eq!(latest.raw_score, 10.0);
  assert_eq!(latest.best_score, 90.0);

  let all = s.list_module_attempts(learner).await.unwrap();
  assert_eq!(all.len(), 1);
  assert_eq!(all[0].attempt_count, 2);
  assert!(all[0].passed);
  assert!(all[0].first_passed_at.is_some());
}

// ─── Store: XP ledger ────────────────────────────────────────────────────────

#[tokio::test]
async fn xp_insert_is_conditional() {
  let s = store().await;
  let learner = Uuid::new_v4();

  assert!(s.try_insert_xp_entry(xp_entry(learner, SourceId::module("5"), 50)).await.unwrap());
  assert!(!s.try_insert_xp_entry(xp_entry(learner, SourceId::module("5"), 50)).await.unwrap());
  assert!(s.try_insert_xp_entry(xp_entry(learner, SourceId::module("6"), 10)).await.unwrap());

  assert_eq!(s.sum_xp(learner).await.unwrap(), 60);
  assert_eq!(s.sum_xp(Uuid::new_v4()).await.unwrap(), 0);
  assert_eq!(s.list_xp_entries(learner).await.unwrap().len(), 2);
}

#[tokio::test]
async fn xp_delete_is_idempotent() {
  let s = store().await;
  let learner = Uuid::new_v4();
  s.try_insert_xp_entry(xp_entry(learner, SourceId::Personality, 20)).await.unwrap();

  let removed = s.delete_xp_entry(learner, SourceId::Personality).await.unwrap();
  assert_eq!(removed.map(|e| e.amount), Some(20));
  assert!(s.delete_xp_entry(learner, SourceId::Personality).await.unwrap().is_none());
  assert_eq!(s.sum_xp(learner).await.unwrap(), 0);
}

#[tokio::test]
async fn revoke_stale_quiz_xp_only_touches_older_versions_of_that_quiz() {
  let s = store().await;
  let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
  s.try_insert_xp_entry(xp_entry(a, SourceId::quiz("econ", 1), 30)).await.unwrap();
  s.try_insert_xp_entry(xp_entry(b, SourceId::quiz("econ", 1), 30)).await.unwrap();
  s.try_insert_xp_entry(xp_entry(a, SourceId::quiz("econ", 2), 30)).await.unwrap();
  s.try_insert_xp_entry(xp_entry(a, SourceId::quiz("tax", 1), 15)).await.unwrap();
  s.try_insert_xp_entry(xp_entry(a, SourceId::module("econ"), 50)).await.unwrap();

  let revoked = s.revoke_stale_quiz_xp("econ".into(), 2).await.unwrap();
  assert_eq!(revoked.len(), 2);
  assert!(revoked.iter().all(|e| e.source_id == SourceId::quiz("econ", 1)));

  assert_eq!(s.sum_xp(a).await.unwrap(), 30 + 15 + 50);
  assert_eq!(s.sum_xp(b).await.unwrap(), 0);
}

// ─── Store: quizzes ──────────────────────────────────────────────────────────

#[tokio::test]
async fn create_quiz_rejects_duplicate_ids() {
  let s = store().await;
  let content = NewQuiz::new("econ", vec![question(0)]).into_content();
  assert!(s.create_quiz(content.clone()).await.unwrap());
  assert!(!s.create_quiz(content).await.unwrap());
}

#[tokio::test]
async fn commit_quiz_edit_is_compare_and_swap() {
  let s = store().await;
  let content = NewQuiz::new("econ", vec![question(0), question(1)]).into_content();
  s.create_quiz(content).await.unwrap();

  let change = s
    .commit_quiz_edit("econ".into(), 1, vec![question(7)])
    .await
    .unwrap()
    .expect("version 1 is current");
  assert_eq!(change.content.version, 2);
  assert_eq!(change.content.questions, vec![question(7)]);

  // A second writer still holding version 1 loses.
  let lost = s.commit_quiz_edit("econ".into(), 1, vec![question(9)]).await.unwrap();
  assert!(lost.is_none());

  let current = s.get_quiz_content("econ".into()).await.unwrap().unwrap();
  assert_eq!(current.version, 2);
  assert_eq!(current.questions, vec![question(7)]);
}

#[tokio::test]
async fn quiz_progress_roundtrip_and_delete() {
  let s = store().await;
  let content = NewQuiz::new("econ", vec![question(0), question(1)]).into_content();
  s.create_quiz(content.clone()).await.unwrap();

  let learner = Uuid::new_v4();
  let recorded = s
    .record_quiz_answer(learner, content.clone(), 1, 1, Utc::now())
    .await
    .unwrap();
  assert!(recorded.recorded);
  assert_eq!(recorded.discarded_version, None);
  assert_eq!(recorded.progress.answered_count, 1);
  assert_eq!(recorded.progress.correct_count, 1);

  let fetched = s.get_quiz_progress(learner, "econ".into()).await.unwrap().unwrap();
  assert_eq!(fetched, recorded.progress);

  assert!(s.delete_quiz_progress(learner, "econ".into()).await.unwrap());
  assert!(!s.delete_quiz_progress(learner, "econ".into()).await.unwrap());
  assert!(s.get_quiz_progress(learner, "econ".into()).await.unwrap().is_none());
}

#[tokio::test]
async fn completed_quiz_progress_is_frozen() {
  let s = store().await;
  let content = NewQuiz::new("econ", vec![question(0), question(1)]).into_content();
  s.create_quiz(content.clone()).await.unwrap();
  let learner = Uuid::new_v4();

  s.record_quiz_answer(learner, content.clone(), 0, 0, Utc::now()).await.unwrap();
  let done = s
    .record_quiz_answer(learner, content.clone(), 1, 1, Utc::now())
    .await
    .unwrap();
  assert!(done.progress.completed);

  let late = s
    .record_quiz_answer(learner, content.clone(), 0, 3, Utc::now())
    .await
    .unwrap();
  assert!(!late.recorded);
  assert_eq!(late.progress, done.progress);

  let stored = s.get_quiz_progress(learner, "econ".into()).await.unwrap().unwrap();
  assert_eq!(stored.answers.get(&0), Some(&0));
}

#[tokio::test]
async fn stale_quiz_progress_is_replaced_on_the_next_answer() {
  let s = store().await;
  let content = NewQuiz::new("econ", vec![question(0), question(1)]).into_content();
  s.create_quiz(content.clone()).await.unwrap();
  let learner = Uuid::new_v4();
  s.record_quiz_answer(learner, content.clone(), 0, 0, Utc::now()).await.unwrap();

  let change = s
    .commit_quiz_edit("econ".into(), 1, vec![question(0), question(1), question(2)])
    .await
    .unwrap()
    .unwrap();

  let recorded = s
    .record_quiz_answer(learner, change.content, 2, 2, Utc::now())
    .await
    .unwrap();
  assert!(recorded.recorded);
  assert_eq!(recorded.discarded_version, Some(1));
  assert_eq!(recorded.progress.content_version_seen, 2);
  assert_eq!(recorded.progress.answered_count, 1);
  assert_eq!(recorded.progress.answers.get(&0), None);
}

#[tokio::test]
async fn personality_result_roundtrip() {
  let s = store().await;
  let learner = Uuid::new_v4();
  let classification = Questionnaire::standard()
    .classify(&vec![0; Questionnaire::standard().questions.len()])
    .unwrap();
  let result = PersonalityResult {
    learner_id:            learner,
    primary:               classification.primary,
    secondary:             classification.secondary,
    scores:                classification.scores,
    questionnaire_version: 1,
    answered_at:           Utc::now(),
  };

  s.upsert_personality_result(result.clone()).await.unwrap();
  let fetched = s.get_personality_result(learner).await.unwrap().unwrap();
  assert_eq!(fetched, result);
}

// ─── Engine: gating ──────────────────────────────────────────────────────────

#[tokio::test]
async fn first_module_open_rest_locked_for_new_learner() {
  let e = engine().await;
  let state = e.unlock_state(Uuid::new_v4()).await.unwrap();
  let statuses: Vec<_> = state.iter().map(|m| m.status).collect();
  assert_eq!(statuses, vec![
    UnlockStatus::Unlocked,
    UnlockStatus::Locked,
    UnlockStatus::Locked,
    UnlockStatus::Locked,
  ]);
}

#[tokio::test]
async fn passing_a_module_unlocks_the_next() {
  let e = engine().await;
  let learner = Uuid::new_v4();

  let outcome = e.submit_module_attempt(learner, "budgeting", 9, 10).await.unwrap();
  assert!(outcome.passed);
  assert_eq!(outcome.next_module_id.as_deref(), Some("saving"));
  assert!(outcome.next_module_unlocked);
  assert!(outcome.xp_granted);

  assert!(e.is_unlocked(learner, "saving").await.unwrap());
  assert!(!e.is_unlocked(learner, "credit").await.unwrap());
}

#[tokio::test]
async fn failing_a_module_keeps_the_next_locked() {
  let e = engine().await;
  let learner = Uuid::new_v4();

  let outcome = e.submit_module_attempt(learner, "budgeting", 7, 10).await.unwrap();
  assert!(!outcome.passed);
  assert!(!outcome.next_module_unlocked);
  assert!(!outcome.xp_granted);
  assert_eq!(outcome.scaled_score, 70.0);
  assert_eq!(e.total_xp(learner).await.unwrap(), 0);
}

#[tokio::test]
async fn locked_module_attempt_is_rejected_without_side_effects() {
  let e = engine().await;
  let learner = Uuid::new_v4();
  e.submit_module_attempt(learner, "budgeting", 10, 10).await.unwrap();
  e.submit_module_attempt(learner, "saving", 10, 10).await.unwrap();
  e.submit_module_attempt(learner, "credit", 2, 10).await.unwrap();
  let xp_before = e.total_xp(learner).await.unwrap();

  let err = e
    .submit_module_attempt(learner, "investing", 10, 10)
    .await
    .unwrap_err();
  assert_eq!(rejection(err), Error::ModuleLocked {
    module_id:       "investing".into(),
    prerequisite_id: "credit".into(),
  });

  let row = e
    .store()
    .get_module_attempt(learner, "investing".into())
    .await
    .unwrap();
  assert!(row.is_none());
  assert_eq!(e.total_xp(learner).await.unwrap(), xp_before);
}

#[tokio::test]
async fn invalid_counts_and_unknown_modules_are_rejected() {
  let e = engine().await;
  let learner = Uuid::new_v4();

  let err = e.submit_module_attempt(learner, "budgeting", 3, 0).await.unwrap_err();
  assert!(matches!(rejection(err), Error::InvalidScore { .. }));

  let err = e.submit_module_attempt(learner, "astrology", 3, 4).await.unwrap_err();
  assert!(matches!(rejection(err), Error::ModuleNotFound(_)));

  assert!(e.module_attempts(learner).await.unwrap().is_empty());
}

// ─── Engine: normalisation ───────────────────────────────────────────────────

#[tokio::test]
async fn passing_below_perfect_retains_raw_percentage() {
  let e = engine().await;
  let learner = Uuid::new_v4();

  let outcome = e.submit_module_attempt(learner, "budgeting", 17, 20).await.unwrap();
  assert_eq!(outcome.raw_percentage, 85.0);
  assert_eq!(outcome.scaled_score, 100.0);

  let stored = e
    .store()
    .get_module_attempt(learner, "budgeting".into())
    .await
    .unwrap()
    .unwrap();
  assert!(stored.passed);
  assert_eq!(stored.raw_score, 85.0);
  assert_eq!(stored.scaled_score, 100.0);
}

#[tokio::test]
async fn reattempt_after_pass_keeps_pass_and_does_not_regrant() {
  let e = engine().await;
  let learner = Uuid::new_v4();

  e.submit_module_attempt(learner, "budgeting", 9, 10).await.unwrap();
  let retry = e.submit_module_attempt(learner, "budgeting", 3, 10).await.unwrap();

  assert!(!retry.passed);
  assert!(retry.module_passed);
  assert!(!retry.xp_granted);
  assert!(retry.next_module_unlocked);
  assert_eq!(retry.attempt_count, 2);
  assert_eq!(e.total_xp(learner).await.unwrap(), 50);

  let stored = e
    .store()
    .get_module_attempt(learner, "budgeting".into())
    .await
    .unwrap()
    .unwrap();
  assert_eq!(stored.raw_score, 30.0);
  assert_eq!(stored.best_score, 90.0);
}

// ─── Engine: XP idempotency ──────────────────────────────────────────────────

#[tokio::test]
async fn concurrent_attempts_are_both_counted() {
  let e = engine().await;
  let learner = Uuid::new_v4();

  let (pass, fail) = tokio::join!(
    e.submit_module_attempt(learner, "budgeting", 9, 10),
    e.submit_module_attempt(learner, "budgeting", 1, 10),
  );
  let (pass, fail) = (pass.unwrap(), fail.unwrap());
  assert!(pass.passed);
  assert!(!fail.passed);

  let attempts = e.module_attempts(learner).await.unwrap();
  assert_eq!(attempts.len(), 1);
  assert_eq!(attempts[0].attempt_count, 2);
  assert!(attempts[0].passed);
  assert_eq!(attempts[0].best_score, 90.0);
  assert!(e.is_unlocked(learner, "saving").await.unwrap());
  assert_eq!(e.total_xp(learner).await.unwrap(), 50);
}

#[tokio::test]
async fn many_spawned_attempts_keep_every_count() {
  let e = Arc::new(engine().await);
  let learner = Uuid::new_v4();

  let handles: Vec<_> = (0..8)
    .map(|n| {
      let e = Arc::clone(&e);
      let correct = if n == 3 { 10 } else { 2 };
      tokio::spawn(async move { e.submit_module_attempt(learner, "budgeting", correct, 10).await })
    })
    .collect();
  for handle in handles {
    handle.await.unwrap().unwrap();
  }

  let attempts = e.module_attempts(learner).await.unwrap();
  assert_eq!(attempts[0].attempt_count, 8);
  assert!(attempts[0].passed);
  assert_eq!(e.total_xp(learner).await.unwrap(), 50);
}

#[tokio::test]
async fn concurrent_duplicate_awards_grant_once() {
  let e = engine().await;
  let learner = Uuid::new_v4();

  let (first, second) = tokio::join!(
    e.award(learner, SourceId::module("5"), 50),
    e.award(learner, SourceId::module("5"), 50),
  );
  let granted = [first.unwrap().granted, second.unwrap().granted];
  assert_eq!(granted.iter().filter(|g| **g).count(), 1);

  assert_eq!(e.total_xp(learner).await.unwrap(), 50);
  assert_eq!(e.xp_summary(learner).await.unwrap().entries.len(), 1);
}

#[tokio::test]
async fn many_spawned_awards_grant_once() {
  let e = Arc::new(engine().await);
  let learner = Uuid::new_v4();

  let handles: Vec<_> = (0..8)
    .map(|_| {
      let e = Arc::clone(&e);
      tokio::spawn(async move { e.award(learner, SourceId::quiz("econ", 3), 25).await })
    })
    .collect();

  let mut granted = 0;
  for handle in handles {
    if handle.await.unwrap().unwrap().granted {
      granted += 1;
    }
  }
  assert_eq!(granted, 1);
  assert_eq!(e.total_xp(learner).await.unwrap(), 25);
}

// ─── Engine: quizzes ─────────────────────────────────────────────────────────

#[tokio::test]
async fn completing_a_quiz_scores_and_awards() {
  let e = engine().await;
  seed_quiz(&e, "econ-news").await;
  let learner = Uuid::new_v4();

  answer_quiz(&e, learner, "econ-news", 9).await;

  let progress = e.quiz_progress(learner, "econ-news").await.unwrap().unwrap();
  assert!(progress.completed);
  assert!(progress.passed);
  assert_eq!(progress.score, Some(90.0));
  assert_eq!(progress.correct_count, 9);

  let summary = e.xp_summary(learner).await.unwrap();
  assert_eq!(summary.total, 30);
  assert_eq!(summary.entries[0].source_id, SourceId::quiz("econ-news", 1));
}

#[tokio::test]
async fn failing_a_quiz_awards_nothing() {
  let e = engine().await;
  seed_quiz(&e, "econ-news").await;
  let learner = Uuid::new_v4();

  answer_quiz(&e, learner, "econ-news", 5).await;

  let progress = e.quiz_progress(learner, "econ-news").await.unwrap().unwrap();
  assert!(progress.completed);
  assert!(!progress.passed);
  assert_eq!(e.total_xp(learner).await.unwrap(), 0);
}

#[tokio::test]
async fn concurrent_answers_are_all_kept() {
  let e = engine().await;
  seed_quiz(&e, "econ-news").await;
  let learner = Uuid::new_v4();

  let (first, second) = tokio::join!(
    e.submit_quiz_answer(learner, "econ-news", 0, 0),
    e.submit_quiz_answer(learner, "econ-news", 1, 1),
  );
  first.unwrap();
  second.unwrap();

  let progress = e.quiz_progress(learner, "econ-news").await.unwrap().unwrap();
  assert_eq!(progress.answered_count, 2);
  assert_eq!(progress.correct_count, 2);
}

#[tokio::test]
async fn spawned_answers_complete_the_quiz_once() {
  let e = Arc::new(engine().await);
  seed_quiz(&e, "econ-news").await;
  let learner = Uuid::new_v4();

  let handles: Vec<_> = (0..10)
    .map(|n| {
      let e = Arc::clone(&e);
      tokio::spawn(async move { e.submit_quiz_answer(learner, "econ-news", n, n % 4).await })
    })
    .collect();

  let mut granted = 0;
  for handle in handles {
    if handle.await.unwrap().unwrap().xp_granted {
      granted += 1;
    }
  }
  assert_eq!(granted, 1);

  let progress = e.quiz_progress(learner, "econ-news").await.unwrap().unwrap();
  assert!(progress.completed);
  assert_eq!(progress.answered_count, 10);
  assert_eq!(progress.score, Some(100.0));
  assert_eq!(e.total_xp(learner).await.unwrap(), 30);
}

#[tokio::test]
async fn answers_after_completion_are_not_recorded() {
  let e = engine().await;
  seed_quiz(&e, "econ-news").await;
  let learner = Uuid::new_v4();
  answer_quiz(&e, learner, "econ-news", 9).await;

  // Question 9 was answered wrongly; answering it correctly now must not
  // change the frozen result.
  let outcome = e.submit_quiz_answer(learner, "econ-news", 9, 1).await.unwrap();
  assert!(outcome.correct);
  assert!(outcome.completed);
  assert_eq!(outcome.score, Some(90.0));
  assert!(!outcome.xp_granted);

  let progress = e.quiz_progress(learner, "econ-news").await.unwrap().unwrap();
  assert_eq!(progress.correct_count, 9);
}

#[tokio::test]
async fn reset_allows_a_retake_without_double_xp() {
  let e = engine().await;
  seed_quiz(&e, "econ-news").await;
  let learner = Uuid::new_v4();
  answer_quiz(&e, learner, "econ-news", 10).await;

  assert!(e.reset_quiz_progress(learner, "econ-news").await.unwrap());
  assert!(e.quiz_progress(learner, "econ-news").await.unwrap().is_none());

  answer_quiz(&e, learner, "econ-news", 10).await;
  assert_eq!(e.total_xp(learner).await.unwrap(), 30);
}

#[tokio::test]
async fn out_of_range_answers_are_rejected_without_writes() {
  let e = engine().await;
  seed_quiz(&e, "econ-news").await;
  let learner = Uuid::new_v4();

  let err = e.submit_quiz_answer(learner, "econ-news", 10, 0).await.unwrap_err();
  assert!(matches!(
    rejection(err),
    Error::InvalidQuestionIndex { index: 10, len: 10, .. }
  ));

  let err = e.submit_quiz_answer(learner, "econ-news", 0, 4).await.unwrap_err();
  assert!(matches!(rejection(err), Error::InvalidOptionIndex { index: 4, .. }));

  let err = e.submit_quiz_answer(learner, "missing", 0, 0).await.unwrap_err();
  assert!(matches!(rejection(err), Error::QuizNotFound(_)));

  let row = e.store().get_quiz_progress(learner, "econ-news".into()).await.unwrap();
  assert!(row.is_none());
}

// ─── Engine: cascading invalidation ──────────────────────────────────────────

#[tokio::test]
async fn editing_a_quiz_voids_progress_and_revokes_xp() {
  let e = engine().await;
  seed_quiz(&e, "econ-news").await;
  let learner = Uuid::new_v4();
  let bystander = Uuid::new_v4();

  answer_quiz(&e, learner, "econ-news", 9).await;
  answer_quiz(&e, bystander, "econ-news", 10).await;
  e.submit_module_attempt(learner, "budgeting", 10, 10).await.unwrap();
  assert_eq!(e.total_xp(learner).await.unwrap(), 30 + 50);

  let change = e
    .edit_quiz(&admin(), "econ-news", Some(1), QuizEdit::EditQuestion {
      index:    3,
      question: question(4),
    })
    .await
    .unwrap();
  assert_eq!(change.content.version, 2);
  assert_eq!(change.revoked_xp.len(), 2);

  // Lazily invalidated: the row is still stored but no longer trusted.
  assert!(e.quiz_progress(learner, "econ-news").await.unwrap().is_none());
  let raw = e.store().get_quiz_progress(learner, "econ-news".into()).await.unwrap();
  assert_eq!(raw.map(|p| p.content_version_seen), Some(1));

  assert_eq!(e.total_xp(learner).await.unwrap(), 50);
  assert_eq!(e.total_xp(bystander).await.unwrap(), 0);
}

#[tokio::test]
async fn answering_after_an_edit_restarts_cleanly() {
  let e = engine().await;
  seed_quiz(&e, "econ-news").await;
  let learner = Uuid::new_v4();

  for n in 0..5 {
    e.submit_quiz_answer(learner, "econ-news", n, n % 4).await.unwrap();
  }
  e.edit_quiz(&admin(), "econ-news", None, QuizEdit::DeleteQuestion { index: 0 })
    .await
    .unwrap();

  let outcome = e.submit_quiz_answer(learner, "econ-news", 0, 1).await.unwrap();
  assert_eq!(outcome.answered_count, 1);

  let progress = e.quiz_progress(learner, "econ-news").await.unwrap().unwrap();
  assert_eq!(progress.content_version_seen, 2);
  assert_eq!(progress.answers.len(), 1);
}

#[tokio::test]
async fn passing_again_after_an_edit_earns_the_new_version() {
  let e = engine().await;
  seed_quiz(&e, "econ-news").await;
  let learner = Uuid::new_v4();

  answer_quiz(&e, learner, "econ-news", 10).await;
  e.edit_quiz(&admin(), "econ-news", None, QuizEdit::EditQuestion {
    index:    0,
    question: question(0),
  })
  .await
  .unwrap();
  answer_quiz(&e, learner, "econ-news", 10).await;

  let summary = e.xp_summary(learner).await.unwrap();
  assert_eq!(summary.total, 30);
  assert_eq!(summary.entries[0].source_id, SourceId::quiz("econ-news", 2));
}

#[tokio::test]
async fn stale_edit_is_a_version_conflict() {
  let e = engine().await;
  seed_quiz(&e, "econ-news").await;
  e.edit_quiz(&admin(), "econ-news", Some(1), QuizEdit::DeleteQuestion { index: 9 })
    .await
    .unwrap();

  let err = e
    .edit_quiz(&admin(), "econ-news", Some(1), QuizEdit::DeleteQuestion { index: 0 })
    .await
    .unwrap_err();
  assert_eq!(rejection(err), Error::VersionConflict {
    quiz_id:  "econ-news".into(),
    expected: 1,
    actual:   2,
  });
  assert_eq!(e.quiz("econ-news").await.unwrap().questions.len(), 9);
}

#[tokio::test]
async fn learners_cannot_edit_content() {
  let e = engine().await;
  seed_quiz(&e, "econ-news").await;
  let learner = Actor::learner(Uuid::new_v4());

  let err = e
    .edit_quiz(&learner, "econ-news", None, QuizEdit::DeleteQuestion { index: 0 })
    .await
    .unwrap_err();
  assert!(matches!(rejection(err), Error::PermissionDenied(_)));

  let err = e
    .create_quiz(&learner, NewQuiz::new("sneaky", vec![question(0)]))
    .await
    .unwrap_err();
  assert!(matches!(rejection(err), Error::PermissionDenied(_)));

  let err = e.on_admin_content_edit(&learner, "econ-news").await.unwrap_err();
  assert!(matches!(rejection(err), Error::PermissionDenied(_)));

  assert_eq!(e.quiz("econ-news").await.unwrap().version, 1);
}

#[tokio::test]
async fn on_content_changed_sweeps_xp_left_behind() {
  let e = engine().await;
  seed_quiz(&e, "econ-news").await;
  let learner = Uuid::new_v4();

  // Simulate a grant that raced an edit: XP for version 1 written after the
  // quiz already moved to version 2.
  e.edit_quiz(&admin(), "econ-news", None, QuizEdit::DeleteQuestion { index: 0 })
    .await
    .unwrap();
  e.award(learner, SourceId::quiz("econ-news", 1), 30).await.unwrap();
  assert_eq!(e.total_xp(learner).await.unwrap(), 30);

  let revoked = e.on_admin_content_edit(&admin(), "econ-news").await.unwrap();
  assert_eq!(revoked.len(), 1);
  assert_eq!(e.total_xp(learner).await.unwrap(), 0);

  // Idempotent.
  assert!(e.on_content_changed("econ-news").await.unwrap().is_empty());
}

#[tokio::test]
async fn duplicate_quiz_creation_is_rejected() {
  let e = engine().await;
  seed_quiz(&e, "econ-news").await;
  let err = e
    .create_quiz(&admin(), NewQuiz::new("econ-news", vec![question(0)]))
    .await
    .unwrap_err();
  assert!(matches!(rejection(err), Error::QuizAlreadyExists(_)));
}

// ─── Engine: personality ─────────────────────────────────────────────────────

#[tokio::test]
async fn personality_retake_overwrites_without_regranting() {
  let e = engine().await;
  let learner = Uuid::new_v4();
  let len = e.questionnaire().questions.len();

  let first = e.submit_personality_answers(learner, &vec![0; len]).await.unwrap();
  assert_eq!(first.primary, Category::Saver);
  assert!(first.xp_granted);

  let retake = e.submit_personality_answers(learner, &vec![1; len]).await.unwrap();
  assert!(!retake.xp_granted);

  let stored = e.personality_result(learner).await.unwrap().unwrap();
  assert_eq!(stored.primary, retake.primary);
  assert_eq!(stored.scores, retake.scores);
  assert_eq!(e.total_xp(learner).await.unwrap(), 20);
}

#[tokio::test]
async fn incomplete_personality_answers_store_nothing() {
  let e = engine().await;
  let learner = Uuid::new_v4();

  let err = e.submit_personality_answers(learner, &[0, 0]).await.unwrap_err();
  assert!(matches!(rejection(err), Error::IncompleteAnswers { .. }));
  assert!(e.personality_result(learner).await.unwrap().is_none());
  assert_eq!(e.total_xp(learner).await.unwrap(), 0);
}
