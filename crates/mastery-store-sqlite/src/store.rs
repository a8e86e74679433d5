//! [`SqliteStore`]: the SQLite implementation of [`ProgressStore`].

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension as _, TransactionBehavior};
use uuid::Uuid;

use mastery_core::{
  module::ModuleAttempt,
  personality::PersonalityResult,
  quiz::{ContentChange, Question, QuizContent, QuizProgress, RecordedAnswer},
  score::NormalizedScore,
  store::ProgressStore,
  xp::{SourceId, XpEntry},
};

use crate::{
  Result,
  encode::{
    MODULE_ATTEMPT_COLUMNS, QUIZ_PROGRESS_COLUMNS, RawModuleAttempt, RawPersonality,
    RawQuestion, RawQuizHeader, RawQuizProgress, RawXpEntry, XP_COLUMNS, encode_dt,
    encode_questions, encode_u64, encode_uuid,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A progress store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

/// Read the current version of a quiz and its question set on `conn`.
fn read_quiz(
  conn: &rusqlite::Connection,
  quiz_id: &str,
) -> rusqlite::Result<Option<(RawQuizHeader, Vec<RawQuestion>)>> {
  let header = conn
    .query_row(
      "SELECT quiz_id, title, version, pass_threshold, xp_reward
       FROM quizzes WHERE quiz_id = ?1",
      rusqlite::params![quiz_id],
      |row| {
        Ok(RawQuizHeader {
          quiz_id:        row.get(0)?,
          title:          row.get(1)?,
          version:        row.get(2)?,
          pass_threshold: row.get(3)?,
          xp_reward:      row.get(4)?,
        })
      },
    )
    .optional()?;

  let Some(header) = header else { return Ok(None) };

  let mut stmt = conn.prepare(
    "SELECT prompt, options_json, correct_option
     FROM quiz_questions
     WHERE quiz_id = ?1 AND version = ?2
     ORDER BY position",
  )?;
  let questions = stmt
    .query_map(rusqlite::params![quiz_id, header.version], |row| {
      Ok(RawQuestion {
        prompt:         row.get(0)?,
        options_json:   row.get(1)?,
        correct_option: row.get(2)?,
      })
    })?
    .collect::<rusqlite::Result<Vec<_>>>()?;

  Ok(Some((header, questions)))
}

fn insert_questions(
  conn: &rusqlite::Connection,
  quiz_id: &str,
  version: i64,
  rows: &[(i64, String, String, i64)],
) -> rusqlite::Result<()> {
  let mut stmt = conn.prepare(
    "INSERT INTO quiz_questions
       (quiz_id, version, position, prompt, options_json, correct_option)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
  )?;
  for (position, prompt, options_json, correct_option) in rows {
    stmt.execute(rusqlite::params![
      quiz_id,
      version,
      position,
      prompt,
      options_json,
      correct_option
    ])?;
  }
  Ok(())
}

/// Delete quiz-derived XP older than `current_version`, returning the rows.
fn delete_stale_quiz_xp(
  conn: &rusqlite::Connection,
  quiz_id: &str,
  current_version: i64,
) -> rusqlite::Result<Vec<RawXpEntry>> {
  let mut stmt = conn.prepare(&format!(
    "DELETE FROM xp_ledger
     WHERE quiz_id = ?1 AND content_version < ?2
     RETURNING {XP_COLUMNS}"
  ))?;
  let rows = stmt
    .query_map(rusqlite::params![quiz_id, current_version], RawXpEntry::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(rows)
}

fn read_module_attempt(
  conn: &rusqlite::Connection,
  learner_id: &str,
  module_id: &str,
) -> rusqlite::Result<Option<RawModuleAttempt>> {
  conn
    .query_row(
      &format!(
        "SELECT {MODULE_ATTEMPT_COLUMNS} FROM module_attempts
         WHERE learner_id = ?1 AND module_id = ?2"
      ),
      rusqlite::params![learner_id, module_id],
      RawModuleAttempt::from_row,
    )
    .optional()
}

fn write_module_attempt(
  conn: &rusqlite::Connection,
  learner_id: &str,
  attempt: &ModuleAttempt,
) -> rusqlite::Result<()> {
  conn.execute(
    &format!(
      "INSERT INTO module_attempts ({MODULE_ATTEMPT_COLUMNS})
       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
       ON CONFLICT (learner_id, module_id) DO UPDATE SET
         raw_score       = excluded.raw_score,
         best_score      = excluded.best_score,
         scaled_score    = excluded.scaled_score,
         passed          = excluded.passed,
         attempt_count   = excluded.attempt_count,
         last_attempt_at = excluded.last_attempt_at,
         first_passed_at = excluded.first_passed_at"
    ),
    rusqlite::params![
      learner_id,
      attempt.module_id,
      attempt.raw_score,
      attempt.best_score,
      attempt.scaled_score,
      attempt.passed,
      i64::from(attempt.attempt_count),
      encode_dt(attempt.last_attempt_at),
      attempt.first_passed_at.map(encode_dt),
    ],
  )?;
  Ok(())
}

fn read_quiz_progress(
  conn: &rusqlite::Connection,
  learner_id: &str,
  quiz_id: &str,
) -> rusqlite::Result<Option<RawQuizProgress>> {
  conn
    .query_row(
      &format!(
        "SELECT {QUIZ_PROGRESS_COLUMNS} FROM quiz_progress
         WHERE learner_id = ?1 AND quiz_id = ?2"
      ),
      rusqlite::params![learner_id, quiz_id],
      RawQuizProgress::from_row,
    )
    .optional()
}

fn write_quiz_progress(
  conn: &rusqlite::Connection,
  learner_id: &str,
  version: i64,
  answers_json: &str,
  progress: &QuizProgress,
) -> rusqlite::Result<()> {
  conn.execute(
    &format!(
      "INSERT INTO quiz_progress ({QUIZ_PROGRESS_COLUMNS})
       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
       ON CONFLICT (learner_id, quiz_id) DO UPDATE SET
         content_version_seen = excluded.content_version_seen,
         answers_json         = excluded.answers_json,
         answered_count       = excluded.answered_count,
         correct_count        = excluded.correct_count,
         completed            = excluded.completed,
         score                = excluded.score,
         passed               = excluded.passed,
         updated_at           = excluded.updated_at"
    ),
    rusqlite::params![
      learner_id,
      progress.quiz_id,
      version,
      answers_json,
      progress.answered_count,
      progress.correct_count,
      progress.completed,
      progress.score,
      progress.passed,
      encode_dt(progress.updated_at),
    ],
  )?;
  Ok(())
}

// ─── ProgressStore impl ──────────────────────────────────────────────────────

impl ProgressStore for SqliteStore {
  type Error = crate::Error;

  // ── Module attempts ───────────────────────────────────────────────────────

  async fn get_module_attempt(
    &self,
    learner_id: Uuid,
    module_id: String,
  ) -> Result<Option<ModuleAttempt>> {
    let learner_str = encode_uuid(learner_id);

    let raw = self
      .conn
      .call(move |conn| Ok(read_module_attempt(conn, &learner_str, &module_id)?))
      .await?;

    raw.map(RawModuleAttempt::into_attempt).transpose()
  }

  async fn list_module_attempts(&self, learner_id: Uuid) -> Result<Vec<ModuleAttempt>> {
    let learner_str = encode_uuid(learner_id);

    let raws: Vec<RawModuleAttempt> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {MODULE_ATTEMPT_COLUMNS} FROM module_attempts WHERE learner_id = ?1"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![learner_str], RawModuleAttempt::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawModuleAttempt::into_attempt).collect()
  }

  async fn record_module_attempt(
    &self,
    learner_id: Uuid,
    module_id: String,
    score: NormalizedScore,
    max_scale: f64,
    now: DateTime<Utc>,
  ) -> Result<ModuleAttempt> {
    let learner_str = encode_uuid(learner_id);

    // Decode failures travel as the inner `Result`; returning early drops
    // the transaction, which rolls it back.
    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let previous = match read_module_attempt(&tx, &learner_str, &module_id)?
          .map(RawModuleAttempt::into_attempt)
          .transpose()
        {
          Ok(previous) => previous,
          Err(e) => return Ok(Err(e)),
        };
        let attempt =
          ModuleAttempt::record(previous, learner_id, &module_id, &score, max_scale, now);
        write_module_attempt(&tx, &learner_str, &attempt)?;
        tx.commit()?;
        Ok(Ok(attempt))
      })
      .await?
  }

  // ── Quiz content ──────────────────────────────────────────────────────────

  async fn create_quiz(&self, content: QuizContent) -> Result<bool> {
    let rows    = encode_questions(&content.questions)?;
    let now_str = encode_dt(Utc::now());
    let version = encode_u64("version", content.version)?;

    let created = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let inserted = tx.execute(
          "INSERT INTO quizzes (quiz_id, title, version, pass_threshold, xp_reward, updated_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)
           ON CONFLICT (quiz_id) DO NOTHING",
          rusqlite::params![
            content.quiz_id,
            content.title,
            version,
            content.pass_threshold,
            content.xp_reward,
            now_str,
          ],
        )?;
        if inserted == 0 {
          return Ok(false);
        }
        insert_questions(&tx, &content.quiz_id, version, &rows)?;
        tx.commit()?;
        Ok(true)
      })
      .await?;

    Ok(created)
  }

  async fn get_quiz_content(&self, quiz_id: String) -> Result<Option<QuizContent>> {
    let raw = self
      .conn
      .call(move |conn| Ok(read_quiz(conn, &quiz_id)?))
      .await?;

    raw
      .map(|(header, questions)| header.into_content(questions))
      .transpose()
  }

  async fn commit_quiz_edit(
    &self,
    quiz_id: String,
    expected_version: u64,
    questions: Vec<Question>,
  ) -> Result<Option<ContentChange>> {
    let rows     = encode_questions(&questions)?;
    let now_str  = encode_dt(Utc::now());
    let expected = encode_u64("version", expected_version)?;

    let committed = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        // Compare-and-swap on the version pointer.
        let bumped: Option<i64> = tx
          .query_row(
            "UPDATE quizzes SET version = version + 1, updated_at = ?3
             WHERE quiz_id = ?1 AND version = ?2
             RETURNING version",
            rusqlite::params![quiz_id, expected, now_str],
            |row| row.get(0),
          )
          .optional()?;
        let Some(new_version) = bumped else { return Ok(None) };

        insert_questions(&tx, &quiz_id, new_version, &rows)?;
        let revoked = delete_stale_quiz_xp(&tx, &quiz_id, new_version)?;
        let quiz = read_quiz(&tx, &quiz_id)?;
        tx.commit()?;
        Ok(quiz.map(|q| (q, revoked)))
      })
      .await?;

    let Some(((header, questions), revoked)) = committed else { return Ok(None) };
    Ok(Some(ContentChange {
      content:    header.into_content(questions)?,
      revoked_xp: revoked
        .into_iter()
        .map(RawXpEntry::into_entry)
        .collect::<Result<_>>()?,
    }))
  }

  // ── Quiz progress ─────────────────────────────────────────────────────────

  async fn get_quiz_progress(
    &self,
    learner_id: Uuid,
    quiz_id: String,
  ) -> Result<Option<QuizProgress>> {
    let learner_str = encode_uuid(learner_id);

    let raw = self
      .conn
      .call(move |conn| Ok(read_quiz_progress(conn, &learner_str, &quiz_id)?))
      .await?;

    raw.map(RawQuizProgress::into_progress).transpose()
  }

  async fn record_quiz_answer(
    &self,
    learner_id: Uuid,
    content: QuizContent,
    question_index: usize,
    option_index: usize,
    now: DateTime<Utc>,
  ) -> Result<RecordedAnswer> {
    let learner_str = encode_uuid(learner_id);
    let version     = encode_u64("content_version_seen", content.version)?;

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let stored = match read_quiz_progress(&tx, &learner_str, &content.quiz_id)?
          .map(RawQuizProgress::into_progress)
          .transpose()
        {
          Ok(stored) => stored,
          Err(e) => return Ok(Err(e)),
        };

        let (mut progress, discarded_version) =
          QuizProgress::resume(stored, learner_id, &content, now);
        if progress.completed {
          return Ok(Ok(RecordedAnswer { progress, recorded: false, discarded_version }));
        }

        progress.answer(&content, question_index, option_index, now);
        let answers_json = match serde_json::to_string(&progress.answers) {
          Ok(json) => json,
          Err(e) => return Ok(Err(crate::Error::from(e))),
        };
        write_quiz_progress(&tx, &learner_str, version, &answers_json, &progress)?;
        tx.commit()?;
        Ok(Ok(RecordedAnswer { progress, recorded: true, discarded_version }))
      })
      .await?
  }

  async fn delete_quiz_progress(&self, learner_id: Uuid, quiz_id: String) -> Result<bool> {
    let learner_str = encode_uuid(learner_id);

    let deleted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM quiz_progress WHERE learner_id = ?1 AND quiz_id = ?2",
          rusqlite::params![learner_str, quiz_id],
        )?)
      })
      .await?;

    Ok(deleted > 0)
  }

  // ── Personality ───────────────────────────────────────────────────────────

  async fn get_personality_result(&self, learner_id: Uuid) -> Result<Option<PersonalityResult>> {
    let learner_str = encode_uuid(learner_id);

    let raw: Option<RawPersonality> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT learner_id, primary_category, secondary_category, scores_json,
                      questionnaire_version, answered_at
               FROM personality_results WHERE learner_id = ?1",
              rusqlite::params![learner_str],
              |row| {
                Ok(RawPersonality {
                  learner_id:            row.get(0)?,
                  primary_category:      row.get(1)?,
                  secondary_category:    row.get(2)?,
                  scores_json:           row.get(3)?,
                  questionnaire_version: row.get(4)?,
                  answered_at:           row.get(5)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawPersonality::into_result).transpose()
  }

  async fn upsert_personality_result(&self, result: PersonalityResult) -> Result<()> {
    let learner_str   = encode_uuid(result.learner_id);
    let primary_str   = result.primary.as_ref().to_owned();
    let secondary_str = result.secondary.map(|c| c.as_ref().to_owned());
    let scores_json   = serde_json::to_string(&result.scores)?;
    let answered_str  = encode_dt(result.answered_at);
    let version       = i64::from(result.questionnaire_version);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO personality_results (
             learner_id, primary_category, secondary_category, scores_json,
             questionnaire_version, answered_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
           ON CONFLICT (learner_id) DO UPDATE SET
             primary_category      = excluded.primary_category,
             secondary_category    = excluded.secondary_category,
             scores_json           = excluded.scores_json,
             questionnaire_version = excluded.questionnaire_version,
             answered_at           = excluded.answered_at",
          rusqlite::params![
            learner_str,
            primary_str,
            secondary_str,
            scores_json,
            version,
            answered_str,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── XP ledger ─────────────────────────────────────────────────────────────

  async fn try_insert_xp_entry(&self, entry: XpEntry) -> Result<bool> {
    let learner_str = encode_uuid(entry.learner_id);
    let source_str  = entry.source_id.to_string();
    let awarded_str = encode_dt(entry.awarded_at);
    let (quiz_id, content_version) = match entry.source_id.quiz_version() {
      Some((quiz_id, version)) => {
        (Some(quiz_id.to_owned()), Some(encode_u64("content_version", version)?))
      }
      None => (None, None),
    };

    let inserted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "INSERT INTO xp_ledger
             (learner_id, source_id, amount, awarded_at, quiz_id, content_version)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)
           ON CONFLICT (learner_id, source_id) DO NOTHING",
          rusqlite::params![
            learner_str,
            source_str,
            entry.amount,
            awarded_str,
            quiz_id,
            content_version,
          ],
        )?)
      })
      .await?;

    Ok(inserted == 1)
  }

  async fn delete_xp_entry(&self, learner_id: Uuid, source_id: SourceId) -> Result<Option<XpEntry>> {
    let learner_str = encode_uuid(learner_id);
    let source_str  = source_id.to_string();

    let raw: Option<RawXpEntry> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "DELETE FROM xp_ledger WHERE learner_id = ?1 AND source_id = ?2
                 RETURNING {XP_COLUMNS}"
              ),
              rusqlite::params![learner_str, source_str],
              RawXpEntry::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawXpEntry::into_entry).transpose()
  }

  async fn revoke_stale_quiz_xp(&self, quiz_id: String, current_version: u64) -> Result<Vec<XpEntry>> {
    let current = encode_u64("content_version", current_version)?;

    let raws = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let rows = delete_stale_quiz_xp(&tx, &quiz_id, current)?;
        tx.commit()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawXpEntry::into_entry).collect()
  }

  async fn sum_xp(&self, learner_id: Uuid) -> Result<u64> {
    let learner_str = encode_uuid(learner_id);

    let total: i64 = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "SELECT COALESCE(SUM(amount), 0) FROM xp_ledger WHERE learner_id = ?1",
          rusqlite::params![learner_str],
          |row| row.get(0),
        )?)
      })
      .await?;

    crate::encode::decode_u64("amount", total)
  }

  async fn list_xp_entries(&self, learner_id: Uuid) -> Result<Vec<XpEntry>> {
    let learner_str = encode_uuid(learner_id);

    let raws: Vec<RawXpEntry> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {XP_COLUMNS} FROM xp_ledger
           WHERE learner_id = ?1
           ORDER BY awarded_at, source_id"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![learner_str], RawXpEntry::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawXpEntry::into_entry).collect()
  }
}
