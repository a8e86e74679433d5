//! Quiz content, admin edits and per-learner quiz progress.
//!
//! Every admin edit produces a complete new question set under the next
//! content version (copy-on-write), so a reader always sees one consistent
//! version. Progress rows record the version they were answered against and
//! are only trusted while that version is still current.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result, xp::validate_identifier};

fn default_quiz_threshold() -> u8 { 70 }

fn default_quiz_xp() -> u32 { 25 }

// ─── Content ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
  pub prompt:         String,
  pub options:        Vec<String>,
  /// Index into `options` of the correct answer.
  pub correct_option: usize,
}

impl Question {
  pub fn validate(&self) -> Result<()> {
    if self.prompt.trim().is_empty() {
      return Err(Error::InvalidQuestion("prompt is empty".into()));
    }
    if self.options.len() < 2 {
      return Err(Error::InvalidQuestion(format!(
        "{:?} needs at least two options",
        self.prompt
      )));
    }
    if self.correct_option >= self.options.len() {
      return Err(Error::InvalidQuestion(format!(
        "{:?} marks option {} correct but has {} options",
        self.prompt,
        self.correct_option,
        self.options.len()
      )));
    }
    Ok(())
  }
}

/// The current, versioned content of a quiz.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizContent {
  pub quiz_id:        String,
  pub title:          String,
  /// Generation counter; bumped by every edit.
  pub version:        u64,
  pub pass_threshold: u8,
  pub xp_reward:      u32,
  pub questions:      Vec<Question>,
}

impl QuizContent {
  /// Bounds-check a (question, option) pair and report whether it is correct.
  pub fn check_answer(&self, question_index: usize, option_index: usize) -> Result<bool> {
    let question = self.questions.get(question_index).ok_or_else(|| {
      Error::InvalidQuestionIndex {
        quiz_id: self.quiz_id.clone(),
        index:   question_index,
        len:     self.questions.len(),
      }
    })?;
    if option_index >= question.options.len() {
      return Err(Error::InvalidOptionIndex {
        index: option_index,
        len:   question.options.len(),
      });
    }
    Ok(option_index == question.correct_option)
  }

  /// The learner-facing view, without the answer key.
  pub fn to_view(&self) -> QuizView {
    QuizView {
      quiz_id:        self.quiz_id.clone(),
      title:          self.title.clone(),
      version:        self.version,
      pass_threshold: self.pass_threshold,
      questions:      self
        .questions
        .iter()
        .map(|q| QuestionView { prompt: q.prompt.clone(), options: q.options.clone() })
        .collect(),
    }
  }
}

/// Input for creating a quiz. The first version is always 1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewQuiz {
  pub quiz_id:        String,
  #[serde(default)]
  pub title:          String,
  #[serde(default = "default_quiz_threshold")]
  pub pass_threshold: u8,
  #[serde(default = "default_quiz_xp")]
  pub xp_reward:      u32,
  #[serde(default)]
  pub questions:      Vec<Question>,
}

impl NewQuiz {
  pub fn new(quiz_id: impl Into<String>, questions: Vec<Question>) -> Self {
    Self {
      quiz_id: quiz_id.into(),
      title: String::new(),
      pass_threshold: default_quiz_threshold(),
      xp_reward: default_quiz_xp(),
      questions,
    }
  }

  pub fn validate(&self) -> Result<()> {
    validate_identifier(&self.quiz_id)?;
    if self.pass_threshold > 100 {
      return Err(Error::InvalidThreshold(self.pass_threshold));
    }
    self.questions.iter().try_for_each(Question::validate)
  }

  pub fn into_content(self) -> QuizContent {
    QuizContent {
      title: if self.title.is_empty() { self.quiz_id.clone() } else { self.title },
      quiz_id: self.quiz_id,
      version: 1,
      pass_threshold: self.pass_threshold,
      xp_reward: self.xp_reward,
      questions: self.questions,
    }
  }
}

/// An admin mutation of a quiz's question set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum QuizEdit {
  /// Append a question, or insert it at `position`.
  AddQuestion {
    question: Question,
    #[serde(default)]
    position: Option<usize>,
  },
  EditQuestion { index: usize, question: Question },
  DeleteQuestion { index: usize },
  /// Replace the entire question set in one version bump.
  ReplaceAll { questions: Vec<Question> },
}

impl QuizEdit {
  /// Apply this edit to `content`, returning the question set for the next
  /// version. `content` itself is left untouched.
  pub fn apply(&self, content: &QuizContent) -> Result<Vec<Question>> {
    let out_of_bounds = |index: usize, len: usize| Error::InvalidQuestionIndex {
      quiz_id: content.quiz_id.clone(),
      index,
      len,
    };

    let mut questions = content.questions.clone();
    match self {
      QuizEdit::AddQuestion { question, position } => {
        question.validate()?;
        let at = position.unwrap_or(questions.len());
        if at > questions.len() {
          return Err(out_of_bounds(at, questions.len()));
        }
        questions.insert(at, question.clone());
      }
      QuizEdit::EditQuestion { index, question } => {
        question.validate()?;
        let len = questions.len();
        let slot = questions.get_mut(*index).ok_or_else(|| out_of_bounds(*index, len))?;
        *slot = question.clone();
      }
      QuizEdit::DeleteQuestion { index } => {
        if *index >= questions.len() {
          return Err(out_of_bounds(*index, questions.len()));
        }
        questions.remove(*index);
      }
      QuizEdit::ReplaceAll { questions: replacement } => {
        replacement.iter().try_for_each(Question::validate)?;
        questions = replacement.clone();
      }
    }
    Ok(questions)
  }
}

/// What a version bump did: the new content and the XP it took back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentChange {
  pub content:    QuizContent,
  pub revoked_xp: Vec<crate::xp::XpEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionView {
  pub prompt:  String,
  pub options: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizView {
  pub quiz_id:        String,
  pub title:          String,
  pub version:        u64,
  pub pass_threshold: u8,
  pub questions:      Vec<QuestionView>,
}

// ─── Progress ────────────────────────────────────────────────────────────────

/// A learner's answers to one quiz at one content version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizProgress {
  pub learner_id:           Uuid,
  pub quiz_id:              String,
  pub content_version_seen: u64,
  /// question index → selected option index
  pub answers:              BTreeMap<usize, usize>,
  pub answered_count:       u32,
  pub correct_count:        u32,
  pub completed:            bool,
  /// Percentage correct; set once completed.
  pub score:                Option<f64>,
  pub passed:               bool,
  pub updated_at:           DateTime<Utc>,
}

impl QuizProgress {
  pub fn start(learner_id: Uuid, content: &QuizContent, now: DateTime<Utc>) -> Self {
    Self {
      learner_id,
      quiz_id: content.quiz_id.clone(),
      content_version_seen: content.version,
      answers: BTreeMap::new(),
      answered_count: 0,
      correct_count: 0,
      completed: false,
      score: None,
      passed: false,
      updated_at: now,
    }
  }

  /// The row to continue from: `stored` if it was recorded against the
  /// current version of `content`, otherwise a fresh start. The second value
  /// is the version of the discarded row, if one was discarded.
  pub fn resume(
    stored: Option<Self>,
    learner_id: Uuid,
    content: &QuizContent,
    now: DateTime<Utc>,
  ) -> (Self, Option<u64>) {
    match stored {
      Some(p) if p.is_current(content.version) => (p, None),
      Some(p) => (Self::start(learner_id, content, now), Some(p.content_version_seen)),
      None => (Self::start(learner_id, content, now), None),
    }
  }

  /// Whether this row was recorded against `current_version`.
  pub fn is_current(&self, current_version: u64) -> bool {
    self.content_version_seen == current_version
  }

  /// Fail with [`Error::StaleContent`] if the content has moved on.
  pub fn ensure_current(&self, current_version: u64) -> Result<()> {
    if self.is_current(current_version) {
      Ok(())
    } else {
      Err(Error::StaleContent {
        quiz_id: self.quiz_id.clone(),
        seen:    self.content_version_seen,
        current: current_version,
      })
    }
  }

  /// Record (or replace) an answer and recompute the derived counts against
  /// `content`. Indices must already have been bounds-checked.
  pub fn answer(
    &mut self,
    content: &QuizContent,
    question_index: usize,
    option_index: usize,
    now: DateTime<Utc>,
  ) {
    self.answers.insert(question_index, option_index);
    self.answered_count = self.answers.len() as u32;
    self.correct_count = self
      .answers
      .iter()
      .filter(|&(&q, &o)| content.questions.get(q).is_some_and(|q| q.correct_option == o))
      .count() as u32;
    self.updated_at = now;

    let total = content.questions.len();
    if total > 0 && self.answers.len() == total {
      let score = f64::from(self.correct_count) * 100.0 / total as f64;
      self.completed = true;
      self.score = Some(score);
      self.passed = u64::from(self.correct_count) * 100
        >= u64::from(content.pass_threshold) * total as u64;
    }
  }
}

/// What the store did with one answer.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedAnswer {
  /// The progress row after the answer (or unchanged, if not recorded).
  pub progress:          QuizProgress,
  /// `false` when the quiz was already completed at this version.
  pub recorded:          bool,
  /// Version of a stale row that was replaced.
  pub discarded_version: Option<u64>,
}

/// Result of a single quiz answer submission.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuizAnswerOutcome {
  pub correct:        bool,
  pub completed:      bool,
  pub score:          Option<f64>,
  pub passed:         bool,
  pub answered_count: u32,
  pub xp_granted:     bool,
}
