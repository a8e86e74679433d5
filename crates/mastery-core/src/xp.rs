//! Experience-point ledger types.
//!
//! Every grant is keyed by the learner and a [`SourceId`] naming the exact
//! achievement instance. The store guarantees at most one entry per key, so a
//! learner's total is always the sum of their ledger and revoking an entry is
//! enough to take the XP back.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use crate::{Error, Result};

/// Module, quiz and category identifiers are embedded in source keys, so they
/// may not contain the `:` separator.
pub fn validate_identifier(id: &str) -> Result<()> {
  if id.is_empty() || id.contains(':') || id.trim() != id {
    return Err(Error::InvalidIdentifier(id.to_owned()));
  }
  Ok(())
}

// ─── Source ──────────────────────────────────────────────────────────────────

/// A stable key identifying one achievement.
///
/// | Variant | Key |
/// |---------|-----|
/// | `Module` | `module:<module_id>` |
/// | `Quiz` | `quiz:<quiz_id>:v<version>` |
/// | `Personality` | `personality` |
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SourceId {
  Module(String),
  Quiz { quiz_id: String, version: u64 },
  Personality,
}

impl SourceId {
  pub fn module(module_id: impl Into<String>) -> Self { Self::Module(module_id.into()) }

  pub fn quiz(quiz_id: impl Into<String>, version: u64) -> Self {
    Self::Quiz { quiz_id: quiz_id.into(), version }
  }

  /// The quiz and content version this source was earned against, if any.
  pub fn quiz_version(&self) -> Option<(&str, u64)> {
    match self {
      Self::Quiz { quiz_id, version } => Some((quiz_id, *version)),
      _ => None,
    }
  }
}

impl fmt::Display for SourceId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Module(id) => write!(f, "module:{id}"),
      Self::Quiz { quiz_id, version } => write!(f, "quiz:{quiz_id}:v{version}"),
      Self::Personality => f.write_str("personality"),
    }
  }
}

impl FromStr for SourceId {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    let unknown = || Error::UnknownSource(s.to_owned());

    if s == "personality" {
      return Ok(Self::Personality);
    }
    if let Some(id) = s.strip_prefix("module:") {
      validate_identifier(id).map_err(|_| unknown())?;
      return Ok(Self::Module(id.to_owned()));
    }
    if let Some(rest) = s.strip_prefix("quiz:") {
      let (quiz_id, version) = rest.rsplit_once(":v").ok_or_else(unknown)?;
      validate_identifier(quiz_id).map_err(|_| unknown())?;
      let version = version.parse().map_err(|_| unknown())?;
      return Ok(Self::Quiz { quiz_id: quiz_id.to_owned(), version });
    }
    Err(unknown())
  }
}

impl Serialize for SourceId {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(self)
  }
}

impl<'de> Deserialize<'de> for SourceId {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let s = String::deserialize(deserializer)?;
    s.parse().map_err(serde::de::Error::custom)
  }
}

// ─── Ledger ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct XpEntry {
  pub learner_id: Uuid,
  pub source_id:  SourceId,
  pub amount:     u32,
  pub awarded_at: DateTime<Utc>,
}

/// The result of an award attempt. `granted == false` means the learner
/// already held this achievement; it is not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AwardOutcome {
  pub granted: bool,
}

/// A learner's derived XP total together with the entries it sums.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct XpSummary {
  pub learner_id: Uuid,
  pub total:      u64,
  pub entries:    Vec<XpEntry>,
}
