//! Encoding and decoding helpers between domain types and the plain column
//! representations stored in SQLite.
//!
//! Timestamps are RFC 3339 strings, UUIDs hyphenated lowercase strings,
//! booleans `0`/`1` integers, and structured fields compact JSON.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use mastery_core::{
  module::ModuleAttempt,
  personality::{Category, CategoryScores, PersonalityResult},
  quiz::{Question, QuizContent, QuizProgress},
  xp::{SourceId, XpEntry},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

/// Versions, counts and indices are stored as SQLite's signed 64-bit integer.
pub fn encode_u64(column: &'static str, n: u64) -> Result<i64> {
  i64::try_from(n).map_err(|_| Error::Overflow { column, value: n })
}

pub fn decode_u64(column: &'static str, n: i64) -> Result<u64> {
  u64::try_from(n).map_err(|_| Error::Corrupt { column, value: n.to_string() })
}

pub fn decode_u32(column: &'static str, n: i64) -> Result<u32> {
  u32::try_from(n).map_err(|_| Error::Corrupt { column, value: n.to_string() })
}

pub fn decode_u8(column: &'static str, n: i64) -> Result<u8> {
  u8::try_from(n).map_err(|_| Error::Corrupt { column, value: n.to_string() })
}

pub fn decode_usize(column: &'static str, n: i64) -> Result<usize> {
  usize::try_from(n).map_err(|_| Error::Corrupt { column, value: n.to_string() })
}

pub fn decode_category(column: &'static str, s: &str) -> Result<Category> {
  s.parse()
    .map_err(|_| Error::Corrupt { column, value: s.to_owned() })
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values read from a `module_attempts` row.
pub struct RawModuleAttempt {
  pub learner_id:      String,
  pub module_id:       String,
  pub raw_score:       f64,
  pub best_score:      f64,
  pub scaled_score:    f64,
  pub passed:          bool,
  pub attempt_count:   i64,
  pub last_attempt_at: String,
  pub first_passed_at: Option<String>,
}

pub const MODULE_ATTEMPT_COLUMNS: &str = "learner_id, module_id, raw_score, best_score, \
   scaled_score, passed, attempt_count, last_attempt_at, first_passed_at";

impl RawModuleAttempt {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      learner_id:      row.get(0)?,
      module_id:       row.get(1)?,
      raw_score:       row.get(2)?,
      best_score:      row.get(3)?,
      scaled_score:    row.get(4)?,
      passed:          row.get(5)?,
      attempt_count:   row.get(6)?,
      last_attempt_at: row.get(7)?,
      first_passed_at: row.get(8)?,
    })
  }

  pub fn into_attempt(self) -> Result<ModuleAttempt> {
    Ok(ModuleAttempt {
      learner_id:      decode_uuid(&self.learner_id)?,
      module_id:       self.module_id,
      raw_score:       self.raw_score,
      best_score:      self.best_score,
      scaled_score:    self.scaled_score,
      passed:          self.passed,
      attempt_count:   decode_u32("attempt_count", self.attempt_count)?,
      last_attempt_at: decode_dt(&self.last_attempt_at)?,
      first_passed_at: self
        .first_passed_at
        .as_deref()
        .map(decode_dt)
        .transpose()?,
    })
  }
}

/// Raw values from a `quizzes` row.
pub struct RawQuizHeader {
  pub quiz_id:        String,
  pub title:          String,
  pub version:        i64,
  pub pass_threshold: i64,
  pub xp_reward:      i64,
}

/// Raw values from a `quiz_questions` row.
pub struct RawQuestion {
  pub prompt:         String,
  pub options_json:   String,
  pub correct_option: i64,
}

impl RawQuestion {
  pub fn into_question(self) -> Result<Question> {
    Ok(Question {
      prompt:         self.prompt,
      options:        serde_json::from_str(&self.options_json)?,
      correct_option: decode_usize("correct_option", self.correct_option)?,
    })
  }
}

impl RawQuizHeader {
  pub fn into_content(self, questions: Vec<RawQuestion>) -> Result<QuizContent> {
    Ok(QuizContent {
      quiz_id:        self.quiz_id,
      title:          self.title,
      version:        decode_u64("version", self.version)?,
      pass_threshold: decode_u8("pass_threshold", self.pass_threshold)?,
      xp_reward:      decode_u32("xp_reward", self.xp_reward)?,
      questions:      questions
        .into_iter()
        .map(RawQuestion::into_question)
        .collect::<Result<_>>()?,
    })
  }
}

/// Column values for inserting one version's question set.
pub fn encode_questions(questions: &[Question]) -> Result<Vec<(i64, String, String, i64)>> {
  questions
    .iter()
    .enumerate()
    .map(|(position, q)| {
      Ok((
        encode_u64("position", position as u64)?,
        q.prompt.clone(),
        serde_json::to_string(&q.options)?,
        encode_u64("correct_option", q.correct_option as u64)?,
      ))
    })
    .collect()
}

/// Raw values from a `quiz_progress` row.
pub struct RawQuizProgress {
  pub learner_id:           String,
  pub quiz_id:              String,
  pub content_version_seen: i64,
  pub answers_json:         String,
  pub answered_count:       i64,
  pub correct_count:        i64,
  pub completed:            bool,
  pub score:                Option<f64>,
  pub passed:               bool,
  pub updated_at:           String,
}

pub const QUIZ_PROGRESS_COLUMNS: &str = "learner_id, quiz_id, content_version_seen, \
   answers_json, answered_count, correct_count, completed, score, passed, updated_at";

impl RawQuizProgress {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      learner_id:           row.get(0)?,
      quiz_id:              row.get(1)?,
      content_version_seen: row.get(2)?,
      answers_json:         row.get(3)?,
      answered_count:       row.get(4)?,
      correct_count:        row.get(5)?,
      completed:            row.get(6)?,
      score:                row.get(7)?,
      passed:               row.get(8)?,
      updated_at:           row.get(9)?,
    })
  }

  pub fn into_progress(self) -> Result<QuizProgress> {
    let answers: BTreeMap<usize, usize> = serde_json::from_str(&self.answers_json)?;
    Ok(QuizProgress {
      learner_id: decode_uuid(&self.learner_id)?,
      quiz_id: self.quiz_id,
      content_version_seen: decode_u64("content_version_seen", self.content_version_seen)?,
      answers,
      answered_count: decode_u32("answered_count", self.answered_count)?,
      correct_count: decode_u32("correct_count", self.correct_count)?,
      completed: self.completed,
      score: self.score,
      passed: self.passed,
      updated_at: decode_dt(&self.updated_at)?,
    })
  }
}

/// Raw values from a `personality_results` row.
pub struct RawPersonality {
  pub learner_id:            String,
  pub primary_category:      String,
  pub secondary_category:    Option<String>,
  pub scores_json:           String,
  pub questionnaire_version: i64,
  pub answered_at:           String,
}

impl RawPersonality {
  pub fn into_result(self) -> Result<PersonalityResult> {
    let scores: CategoryScores = serde_json::from_str(&self.scores_json)?;
    Ok(PersonalityResult {
      learner_id: decode_uuid(&self.learner_id)?,
      primary: decode_category("primary_category", &self.primary_category)?,
      secondary: self
        .secondary_category
        .as_deref()
        .map(|s| decode_category("secondary_category", s))
        .transpose()?,
      scores,
      questionnaire_version: decode_u32("questionnaire_version", self.questionnaire_version)?,
      answered_at: decode_dt(&self.answered_at)?,
    })
  }
}

/// Raw values from an `xp_ledger` row.
pub struct RawXpEntry {
  pub learner_id: String,
  pub source_id:  String,
  pub amount:     i64,
  pub awarded_at: String,
}

pub const XP_COLUMNS: &str = "learner_id, source_id, amount, awarded_at";

impl RawXpEntry {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      learner_id: row.get(0)?,
      source_id:  row.get(1)?,
      amount:     row.get(2)?,
      awarded_at: row.get(3)?,
    })
  }

  pub fn into_entry(self) -> Result<XpEntry> {
    Ok(XpEntry {
      learner_id: decode_uuid(&self.learner_id)?,
      source_id:  self.source_id.parse::<SourceId>()?,
      amount:     decode_u32("amount", self.amount)?,
      awarded_at: decode_dt(&self.awarded_at)?,
    })
  }
}
