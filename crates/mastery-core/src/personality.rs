//! Money-personality classifier.
//!
//! Each questionnaire option carries a weight for one or more categories. The
//! weights of the chosen options are summed, categories are ranked by score,
//! and the top one or two become the learner's primary and secondary
//! personality.
//!
//! Ties are broken by [`PRIORITY`], never by sort stability or map iteration
//! order. Changing the list changes results, so it is versioned together with
//! the questionnaire.

use std::{cmp::Ordering, fmt};

use chrono::{DateTime, Utc};
use serde::{
  Deserialize, Deserializer, Serialize, Serializer,
  de::{MapAccess, Visitor},
  ser::SerializeMap,
};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Categories ──────────────────────────────────────────────────────────────

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr, EnumString,
  Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Category {
  Saver,
  Spender,
  Investor,
  Debtor,
  Avoider,
  Planner,
}

/// Tie-break order: on equal scores the category listed first wins.
pub const PRIORITY: [Category; 6] = [
  Category::Saver,
  Category::Spender,
  Category::Investor,
  Category::Debtor,
  Category::Avoider,
  Category::Planner,
];

/// Version of [`PRIORITY`] and [`Questionnaire::standard`]; bump when either
/// changes.
pub const QUESTIONNAIRE_VERSION: u32 = 1;

impl Category {
  /// Position in [`PRIORITY`]; lower wins ties.
  pub fn priority_rank(self) -> usize {
    PRIORITY
      .iter()
      .position(|&c| c == self)
      .unwrap_or(PRIORITY.len())
  }
}

// ─── Scores ──────────────────────────────────────────────────────────────────

/// Per-category totals, stored in [`PRIORITY`] order.
///
/// Serialised as a JSON object whose keys follow [`PRIORITY`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CategoryScores([u32; PRIORITY.len()]);

impl CategoryScores {
  pub fn get(&self, category: Category) -> u32 { self.0[category.priority_rank()] }

  pub fn add(&mut self, category: Category, weight: u32) {
    let slot = &mut self.0[category.priority_rank()];
    *slot = slot.saturating_add(weight);
  }

  /// `(category, score)` pairs in priority order.
  pub fn iter(&self) -> impl Iterator<Item = (Category, u32)> + '_ {
    PRIORITY.iter().map(|&c| (c, self.get(c)))
  }

  /// Categories ranked by score descending, ties by priority.
  pub fn ranked(&self) -> Vec<(Category, u32)> {
    let mut ranked: Vec<_> = self.iter().collect();
    ranked.sort_by(|a, b| rank_order(*a, *b));
    ranked
  }
}

impl FromIterator<(Category, u32)> for CategoryScores {
  fn from_iter<I: IntoIterator<Item = (Category, u32)>>(iter: I) -> Self {
    let mut scores = Self::default();
    for (category, weight) in iter {
      scores.add(category, weight);
    }
    scores
  }
}

fn rank_order(a: (Category, u32), b: (Category, u32)) -> Ordering {
  b.1
    .cmp(&a.1)
    .then_with(|| a.0.priority_rank().cmp(&b.0.priority_rank()))
}

impl Serialize for CategoryScores {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(PRIORITY.len()))?;
    for (category, score) in self.iter() {
      map.serialize_entry(&category, &score)?;
    }
    map.end()
  }
}

impl<'de> Deserialize<'de> for CategoryScores {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    struct ScoresVisitor;

    impl<'de> Visitor<'de> for ScoresVisitor {
      type Value = CategoryScores;

      fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a map of category to score")
      }

      fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut scores = CategoryScores::default();
        while let Some((category, score)) = access.next_entry::<Category, u32>()? {
          scores.0[category.priority_rank()] = score;
        }
        Ok(scores)
      }
    }

    deserializer.deserialize_map(ScoresVisitor)
  }
}

// ─── Classification ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
  pub primary:   Category,
  pub secondary: Option<Category>,
  pub scores:    CategoryScores,
}

/// Pick the primary and secondary category from accumulated scores.
///
/// The runner-up becomes secondary only when it is non-zero and at least 70%
/// of the primary score, compared exactly as `10 * second >= 7 * first`.
pub fn classify_scores(scores: CategoryScores) -> Classification {
  let ranked = scores.ranked();
  let (primary, first) = ranked[0];
  let secondary = ranked.get(1).and_then(|&(category, second)| {
    let close_enough = u64::from(second) * 10 >= u64::from(first) * 7;
    (second > 0 && close_enough).then_some(category)
  });
  Classification { primary, secondary, scores }
}

// ─── Questionnaire ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonalityOption {
  pub label:   String,
  pub weights: Vec<(Category, u32)>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonalityQuestion {
  pub prompt:  String,
  pub options: Vec<PersonalityOption>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Questionnaire {
  pub version:   u32,
  pub questions: Vec<PersonalityQuestion>,
}

/// The questionnaire as shown to learners, without weights.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionnaireView {
  pub version:   u32,
  pub questions: Vec<QuestionnaireViewItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionnaireViewItem {
  pub prompt:  String,
  pub options: Vec<String>,
}

impl Questionnaire {
  /// Score `answers` (one option index per question, in order).
  pub fn classify(&self, answers: &[usize]) -> Result<Classification> {
    if answers.len() != self.questions.len() {
      return Err(Error::IncompleteAnswers {
        expected: self.questions.len(),
        actual:   answers.len(),
      });
    }

    let mut scores = CategoryScores::default();
    for (question, &choice) in self.questions.iter().zip(answers) {
      let option = question.options.get(choice).ok_or(Error::InvalidOptionIndex {
        index: choice,
        len:   question.options.len(),
      })?;
      for &(category, weight) in &option.weights {
        scores.add(category, weight);
      }
    }
    Ok(classify_scores(scores))
  }

  pub fn to_view(&self) -> QuestionnaireView {
    QuestionnaireView {
      version:   self.version,
      questions: self
        .questions
        .iter()
        .map(|q| QuestionnaireViewItem {
          prompt:  q.prompt.clone(),
          options: q.options.iter().map(|o| o.label.clone()).collect(),
        })
        .collect(),
    }
  }

  /// The built-in money-personality questionnaire.
  pub fn standard() -> Self {
    use Category::*;

    fn question(prompt: &str, options: &[(&str, &[(Category, u32)])]) -> PersonalityQuestion {
      PersonalityQuestion {
        prompt:  prompt.to_owned(),
        options: options
          .iter()
          .map(|(label, weights)| PersonalityOption {
            label:   (*label).to_owned(),
            weights: weights.to_vec(),
          })
          .collect(),
      }
    }

    Questionnaire {
      version:   QUESTIONNAIRE_VERSION,
      questions: vec![
        question("You receive an unexpected $500. What do you do first?", &[
          ("Put it straight into savings", &[(Saver, 3), (Planner, 1)]),
          ("Treat myself to something I've wanted", &[(Spender, 3)]),
          ("Add it to my investment account", &[(Investor, 3), (Planner, 1)]),
          ("Pay down what I owe", &[(Debtor, 2), (Planner, 1)]),
          ("Leave it in my checking account and forget about it", &[(Avoider, 3)]),
        ]),
        question("How often do you check your bank balance?", &[
          ("Every day or two", &[(Saver, 2), (Planner, 1)]),
          ("Right before a big purchase", &[(Spender, 2)]),
          ("When I review my portfolio", &[(Investor, 2)]),
          ("Only when a payment is due", &[(Debtor, 2)]),
          ("As rarely as possible", &[(Avoider, 3)]),
        ]),
        question("Which statement best describes your budget?", &[
          ("I track every expense against a plan", &[(Planner, 3), (Saver, 1)]),
          ("I don't have one; I spend what I earn", &[(Spender, 2), (Avoider, 1)]),
          ("I automate savings and investing first", &[(Investor, 2), (Planner, 1)]),
          ("Most of it goes to repayments", &[(Debtor, 3)]),
        ]),
        question("A friend suggests an expensive weekend trip. You...", &[
          ("Decline and keep the money saved", &[(Saver, 3)]),
          ("Go; memories are worth it", &[(Spender, 3)]),
          ("Go if it fits the travel fund I planned", &[(Planner, 3)]),
          ("Put it on a credit card and sort it out later", &[(Debtor, 3)]),
        ]),
        question("How do you feel about the stock market?", &[
          ("Too risky, I prefer a savings account", &[(Saver, 2)]),
          ("Exciting, I like to follow it", &[(Investor, 3)]),
          ("I'd rather not think about it", &[(Avoider, 2)]),
          ("Part of a long-term plan", &[(Investor, 1), (Planner, 2)]),
        ]),
        question("When a bill arrives, you usually...", &[
          ("Pay it immediately", &[(Saver, 1), (Planner, 2)]),
          ("Pay the minimum and carry the rest", &[(Debtor, 3)]),
          ("Leave it unopened for a while", &[(Avoider, 3)]),
          ("Pay it from money set aside for it", &[(Planner, 2), (Saver, 1)]),
        ]),
        question("What does money mean to you?", &[
          ("Security", &[(Saver, 3)]),
          ("Freedom to enjoy life now", &[(Spender, 3)]),
          ("A tool to build wealth", &[(Investor, 3)]),
          ("Stress", &[(Avoider, 2), (Debtor, 1)]),
          ("Something to organise", &[(Planner, 3)]),
        ]),
        question("How big is your emergency fund?", &[
          ("Six months of expenses or more", &[(Saver, 3), (Planner, 1)]),
          ("I don't have one, I'd use credit", &[(Debtor, 2), (Spender, 1)]),
          ("Most of my cushion is invested", &[(Investor, 2)]),
          ("I'm not sure", &[(Avoider, 3)]),
        ]),
      ],
    }
  }
}

/// A learner's stored personality result. One per learner; replaced on retake.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonalityResult {
  pub learner_id:            Uuid,
  pub primary:               Category,
  pub secondary:             Option<Category>,
  pub scores:                CategoryScores,
  pub questionnaire_version: u32,
  pub answered_at:           DateTime<Utc>,
}

/// Result of submitting the questionnaire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonalityOutcome {
  pub primary:    Category,
  pub secondary:  Option<Category>,
  pub scores:     CategoryScores,
  pub xp_granted: bool,
}
