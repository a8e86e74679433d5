//! SQL schema for the mastery SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- One row per (learner, module); replaced on every submission.
CREATE TABLE IF NOT EXISTS module_attempts (
    learner_id      TEXT    NOT NULL,
    module_id       TEXT    NOT NULL,
    raw_score       REAL    NOT NULL,   -- latest attempt, 0-100
    best_score      REAL    NOT NULL,
    scaled_score    REAL    NOT NULL,   -- max scale once passed
    passed          INTEGER NOT NULL,   -- monotonic 0 -> 1
    attempt_count   INTEGER NOT NULL,
    last_attempt_at TEXT    NOT NULL,
    first_passed_at TEXT,
    PRIMARY KEY (learner_id, module_id)
);

-- Current version pointer per quiz.
CREATE TABLE IF NOT EXISTS quizzes (
    quiz_id        TEXT    PRIMARY KEY,
    title          TEXT    NOT NULL,
    version        INTEGER NOT NULL CHECK (version >= 1),
    pass_threshold INTEGER NOT NULL CHECK (pass_threshold BETWEEN 0 AND 100),
    xp_reward      INTEGER NOT NULL,
    updated_at     TEXT    NOT NULL
);

-- Copy-on-write question sets: every version owns a full set of rows.
-- Rows of superseded versions are never updated.
CREATE TABLE IF NOT EXISTS quiz_questions (
    quiz_id        TEXT    NOT NULL REFERENCES quizzes(quiz_id),
    version        INTEGER NOT NULL,
    position       INTEGER NOT NULL,
    prompt         TEXT    NOT NULL,
    options_json   TEXT    NOT NULL,   -- JSON array of option labels
    correct_option INTEGER NOT NULL,
    PRIMARY KEY (quiz_id, version, position)
);

-- Only trusted while content_version_seen equals quizzes.version.
CREATE TABLE IF NOT EXISTS quiz_progress (
    learner_id           TEXT    NOT NULL,
    quiz_id              TEXT    NOT NULL REFERENCES quizzes(quiz_id),
    content_version_seen INTEGER NOT NULL,
    answers_json         TEXT    NOT NULL,   -- {question_index: option_index}
    answered_count       INTEGER NOT NULL,
    correct_count        INTEGER NOT NULL,
    completed            INTEGER NOT NULL,
    score                REAL,
    passed               INTEGER NOT NULL,
    updated_at           TEXT    NOT NULL,
    PRIMARY KEY (learner_id, quiz_id)
);

CREATE TABLE IF NOT EXISTS personality_results (
    learner_id            TEXT    PRIMARY KEY,
    primary_category      TEXT    NOT NULL,
    secondary_category    TEXT,
    scores_json           TEXT    NOT NULL,
    questionnaire_version INTEGER NOT NULL,
    answered_at           TEXT    NOT NULL
);

-- At most one grant per (learner, source); enforced by the primary key and
-- relied on by INSERT ... ON CONFLICT DO NOTHING.
CREATE TABLE IF NOT EXISTS xp_ledger (
    learner_id      TEXT    NOT NULL,
    source_id       TEXT    NOT NULL,
    amount          INTEGER NOT NULL CHECK (amount >= 0),
    awarded_at      TEXT    NOT NULL,
    quiz_id         TEXT,      -- set for quiz-derived sources
    content_version INTEGER,   -- set for quiz-derived sources
    PRIMARY KEY (learner_id, source_id)
);

CREATE INDEX IF NOT EXISTS xp_ledger_quiz_idx ON xp_ledger(quiz_id, content_version);
CREATE INDEX IF NOT EXISTS quiz_progress_quiz_idx ON quiz_progress(quiz_id);

PRAGMA user_version = 1;
";
