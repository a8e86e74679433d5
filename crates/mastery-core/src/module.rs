//! Learning modules, per-learner attempts and the prerequisite graph.
//!
//! Unlocking is expressed prerequisite-by-prerequisite: a module is open when
//! it has no prerequisite, or when the learner has passed its prerequisite.
//! Today the configured modules form a single chain, but a branching graph is
//! purely a configuration change.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result, score::NormalizedScore, xp::validate_identifier};

fn default_module_xp() -> u32 { 50 }

// ─── Definitions ─────────────────────────────────────────────────────────────

/// A gated unit of learning content. Loaded from configuration at startup and
/// immutable for the life of the process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleDefinition {
  pub id:              String,
  #[serde(default)]
  pub title:           String,
  /// Position in the total order; unique across modules.
  pub order_index:     u32,
  /// The module that must be passed first, if any.
  #[serde(default)]
  pub prerequisite_id: Option<String>,
  /// Minimum percentage (0–100) required to pass.
  pub pass_threshold:  u8,
  /// XP granted the first time the module is passed.
  #[serde(default = "default_module_xp")]
  pub xp_reward:       u32,
}

impl ModuleDefinition {
  pub fn new(
    id: impl Into<String>,
    order_index: u32,
    prerequisite_id: Option<&str>,
    pass_threshold: u8,
  ) -> Self {
    let id = id.into();
    Self {
      title: id.clone(),
      id,
      order_index,
      prerequisite_id: prerequisite_id.map(str::to_owned),
      pass_threshold,
      xp_reward: default_module_xp(),
    }
  }
}

// ─── Attempts ────────────────────────────────────────────────────────────────

/// A learner's standing on one module. One row per (learner, module).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleAttempt {
  pub learner_id:      Uuid,
  pub module_id:       String,
  /// Percentage achieved on the latest attempt.
  pub raw_score:       f64,
  /// Highest percentage achieved on any attempt.
  pub best_score:      f64,
  /// Gating-compatible encoding: the maximum scale once passed.
  pub scaled_score:    f64,
  /// Monotonic: once true, later failing attempts never reset it.
  pub passed:          bool,
  pub attempt_count:   u32,
  pub last_attempt_at: DateTime<Utc>,
  pub first_passed_at: Option<DateTime<Utc>>,
}

impl ModuleAttempt {
  /// Fold a new normalised result into the learner's previous standing.
  ///
  /// The latest attempt always wins for `raw_score`; `passed` only ever moves
  /// from false to true.
  pub fn record(
    previous: Option<ModuleAttempt>,
    learner_id: Uuid,
    module_id: &str,
    score: &NormalizedScore,
    max_scale: f64,
    now: DateTime<Utc>,
  ) -> ModuleAttempt {
    match previous {
      None => ModuleAttempt {
        learner_id,
        module_id: module_id.to_owned(),
        raw_score: score.raw_percentage,
        best_score: score.raw_percentage,
        scaled_score: score.scaled_score,
        passed: score.passed,
        attempt_count: 1,
        last_attempt_at: now,
        first_passed_at: score.passed.then_some(now),
      },
      Some(prev) => {
        let passed = prev.passed || score.passed;
        ModuleAttempt {
          learner_id,
          module_id: module_id.to_owned(),
          raw_score: score.raw_percentage,
          best_score: prev.best_score.max(score.raw_percentage),
          scaled_score: if passed { max_scale } else { score.scaled_score },
          passed,
          attempt_count: prev.attempt_count.saturating_add(1),
          last_attempt_at: now,
          first_passed_at: prev
            .first_passed_at
            .or_else(|| score.passed.then_some(now)),
        }
      }
    }
  }
}

// ─── Status ──────────────────────────────────────────────────────────────────

/// The learner-facing status of a module, derived from two stored booleans:
/// whether its prerequisite is passed and whether it is passed itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnlockStatus {
  Locked,
  Unlocked,
  Passed,
}

/// One entry of an unlock-state listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleUnlock {
  pub module_id: String,
  pub status:    UnlockStatus,
}

// ─── Graph ───────────────────────────────────────────────────────────────────

/// The validated prerequisite graph over all configured modules.
#[derive(Debug, Clone)]
pub struct ModuleGraph {
  /// Sorted by `order_index`.
  modules: Vec<ModuleDefinition>,
  by_id:   HashMap<String, usize>,
}

impl ModuleGraph {
  /// Validate `definitions` and build the graph.
  ///
  /// Every prerequisite must name an existing module with a strictly smaller
  /// `order_index`, which also guarantees the graph is acyclic.
  pub fn new(mut definitions: Vec<ModuleDefinition>) -> Result<Self> {
    definitions.sort_by_key(|m| m.order_index);

    let mut by_id = HashMap::with_capacity(definitions.len());
    let mut seen_order = HashSet::with_capacity(definitions.len());
    for (idx, module) in definitions.iter().enumerate() {
      validate_identifier(&module.id)?;
      if module.pass_threshold > 100 {
        return Err(Error::InvalidThreshold(module.pass_threshold));
      }
      if by_id.insert(module.id.clone(), idx).is_some() {
        return Err(Error::InvalidGraph(format!("duplicate module id {:?}", module.id)));
      }
      if !seen_order.insert(module.order_index) {
        return Err(Error::InvalidGraph(format!(
          "duplicate order index {}",
          module.order_index
        )));
      }
    }

    for module in &definitions {
      let Some(prereq) = &module.prerequisite_id else { continue };
      let Some(&prereq_idx) = by_id.get(prereq) else {
        return Err(Error::InvalidGraph(format!(
          "module {:?} requires unknown module {prereq:?}",
          module.id
        )));
      };
      if definitions[prereq_idx].order_index >= module.order_index {
        return Err(Error::InvalidGraph(format!(
          "module {:?} requires {prereq:?}, which is not ordered before it",
          module.id
        )));
      }
    }

    Ok(Self { modules: definitions, by_id })
  }

  /// Build a simple chain where each module requires the one before it.
  pub fn chain<I, T>(ids: I, pass_threshold: u8) -> Result<Self>
  where
    I: IntoIterator<Item = T>,
    T: Into<String>,
  {
    let mut prev: Option<String> = None;
    let mut definitions = Vec::new();
    for (i, id) in ids.into_iter().enumerate() {
      let id = id.into();
      definitions.push(ModuleDefinition::new(
        id.clone(),
        i as u32,
        prev.as_deref(),
        pass_threshold,
      ));
      prev = Some(id);
    }
    Self::new(definitions)
  }

  /// All modules in order.
  pub fn modules(&self) -> &[ModuleDefinition] { &self.modules }

  pub fn get(&self, module_id: &str) -> Option<&ModuleDefinition> {
    self.by_id.get(module_id).map(|&i| &self.modules[i])
  }

  /// Modules that list `module_id` as their prerequisite, in order.
  pub fn dependents<'a>(
    &'a self,
    module_id: &'a str,
  ) -> impl Iterator<Item = &'a ModuleDefinition> + 'a {
    self
      .modules
      .iter()
      .filter(move |m| m.prerequisite_id.as_deref() == Some(module_id))
  }

  /// Whether `module` is open given the `passed` predicate over module ids.
  pub fn is_unlocked(
    &self,
    module: &ModuleDefinition,
    passed: impl Fn(&str) -> bool,
  ) -> bool {
    match &module.prerequisite_id {
      None => true,
      Some(prereq) => passed(prereq),
    }
  }

  /// Look up `module_id` and fail unless it is unlocked.
  pub fn require_unlocked(
    &self,
    module_id: &str,
    passed: impl Fn(&str) -> bool,
  ) -> Result<&ModuleDefinition> {
    let module = self
      .get(module_id)
      .ok_or_else(|| Error::ModuleNotFound(module_id.to_owned()))?;
    match &module.prerequisite_id {
      Some(prereq) if !passed(prereq) => Err(Error::ModuleLocked {
        module_id:       module_id.to_owned(),
        prerequisite_id: prereq.clone(),
      }),
      _ => Ok(module),
    }
  }

  pub fn status(
    &self,
    module: &ModuleDefinition,
    passed: impl Fn(&str) -> bool,
  ) -> UnlockStatus {
    if passed(&module.id) {
      UnlockStatus::Passed
    } else if self.is_unlocked(module, &passed) {
      UnlockStatus::Unlocked
    } else {
      UnlockStatus::Locked
    }
  }

  /// The status of every module, in order.
  pub fn unlock_state(&self, passed: impl Fn(&str) -> bool) -> Vec<ModuleUnlock> {
    self
      .modules
      .iter()
      .map(|m| ModuleUnlock {
        module_id: m.id.clone(),
        status:    self.status(m, &passed),
      })
      .collect()
  }
}
