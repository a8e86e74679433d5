//! Error types for `mastery-core`.
//!
//! Every variant here is a rejection of an invalid request. Recoverable
//! conditions (stale quiz progress, duplicate XP awards) are normalised by the
//! engine and never surface as errors.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
  #[error("module not found: {0}")]
  ModuleNotFound(String),

  #[error("module {module_id} is locked until {prerequisite_id} is passed")]
  ModuleLocked {
    module_id:       String,
    prerequisite_id: String,
  },

  #[error("quiz not found: {0}")]
  QuizNotFound(String),

  #[error("quiz {0} already exists")]
  QuizAlreadyExists(String),

  #[error("question index {index} is out of bounds for quiz {quiz_id} ({len} questions)")]
  InvalidQuestionIndex {
    quiz_id: String,
    index:   usize,
    len:     usize,
  },

  #[error("option index {index} is out of bounds ({len} options)")]
  InvalidOptionIndex { index: usize, len: usize },

  #[error("expected {expected} answers, got {actual}")]
  IncompleteAnswers { expected: usize, actual: usize },

  #[error("invalid score: {correct} correct out of {total}")]
  InvalidScore { correct: u32, total: u32 },

  #[error("pass threshold {0} is outside 0..=100")]
  InvalidThreshold(u8),

  #[error("invalid identifier {0:?}: must be non-empty and must not contain ':'")]
  InvalidIdentifier(String),

  #[error("invalid question: {0}")]
  InvalidQuestion(String),

  #[error("invalid module graph: {0}")]
  InvalidGraph(String),

  #[error("quiz {quiz_id} is at version {actual}, edit expected {expected}")]
  VersionConflict {
    quiz_id:  String,
    expected: u64,
    actual:   u64,
  },

  /// A learner submitted against content that has since changed. The engine
  /// resolves this by discarding the stale progress; it is never returned by
  /// a public engine operation.
  #[error("quiz {quiz_id} progress was recorded against version {seen}, current is {current}")]
  StaleContent {
    quiz_id: String,
    seen:    u64,
    current: u64,
  },

  #[error("permission denied: {0}")]
  PermissionDenied(String),

  #[error("unknown xp source: {0:?}")]
  UnknownSource(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
