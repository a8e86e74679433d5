//! Error type for `mastery-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] mastery_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A stored column held a value outside its domain (negative count,
  /// unknown category, ...).
  #[error("corrupt column {column}: {value}")]
  Corrupt { column: &'static str, value: String },

  /// A value too large for SQLite's signed 64-bit INTEGER.
  #[error("{column} value {value} does not fit in a 64-bit signed integer")]
  Overflow { column: &'static str, value: u64 },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
