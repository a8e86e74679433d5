//! Score normalisation.
//!
//! A learner's true achievement (`raw_percentage`) is kept separate from the
//! gating verdict (`passed`) and from `scaled_score`, the encoding required by
//! consumers that treat "score equals the maximum" as "passed". Only the
//! scaled score is ever rewritten to the maximum; the raw percentage is always
//! retained for history and analytics.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// The default scale for [`NormalizedScore::scaled_score`].
pub const DEFAULT_MAX_SCALE: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedScore {
  /// The achieved percentage, 0–100.
  pub raw_percentage: f64,
  pub passed:         bool,
  /// `max_scale` when passed, otherwise `raw_percentage`.
  pub scaled_score:   f64,
}

/// Normalise an already-computed percentage against `pass_threshold`.
pub fn normalize(
  raw_percentage: f64,
  pass_threshold: u8,
  max_scale: f64,
) -> Result<NormalizedScore> {
  check_threshold(pass_threshold)?;
  let raw_percentage = raw_percentage.clamp(0.0, 100.0);
  let passed = raw_percentage >= f64::from(pass_threshold);
  Ok(encode(raw_percentage, passed, max_scale))
}

/// Normalise a `correct / total` count pair.
///
/// The verdict is decided with integer cross-multiplication so a fractional
/// percentage (e.g. 2/3) can never flip across the threshold through floating
/// point error.
pub fn normalize_counts(
  correct: u32,
  total: u32,
  pass_threshold: u8,
  max_scale: f64,
) -> Result<NormalizedScore> {
  check_threshold(pass_threshold)?;
  if total == 0 || correct > total {
    return Err(Error::InvalidScore { correct, total });
  }
  let passed =
    u64::from(correct) * 100 >= u64::from(pass_threshold) * u64::from(total);
  let raw_percentage = f64::from(correct) * 100.0 / f64::from(total);
  Ok(encode(raw_percentage, passed, max_scale))
}

fn encode(raw_percentage: f64, passed: bool, max_scale: f64) -> NormalizedScore {
  NormalizedScore {
    raw_percentage,
    passed,
    scaled_score: if passed { max_scale } else { raw_percentage },
  }
}

fn check_threshold(pass_threshold: u8) -> Result<()> {
  if pass_threshold > 100 {
    return Err(Error::InvalidThreshold(pass_threshold));
  }
  Ok(())
}
