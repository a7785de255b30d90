//! Progress aggregation: fold a user's full recording history into a
//! snapshot of per-category completion.
//!
//! `compute_progress` is a pure function of the fact list. It is total by
//! contract: facts with unknown language/task_type/role values are ignored,
//! never an error, so arbitrary (even corrupted) histories are safe.

use std::collections::{BTreeMap, HashSet};

use crate::domain::{InstructionCategory, Language, RecordingFact};

/// Which halves of a pair item have been recorded at least once.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PairStatus {
  pub secret: bool,
  pub question: bool,
}

impl PairStatus {
  pub fn is_complete(self) -> bool {
    self.secret && self.question
  }
}

/// Completion state for one language partition.
///
/// Pairs live in a `BTreeMap` so iteration (and therefore the engine's
/// incomplete-pair tie-break) is ascending by item_id.
#[derive(Clone, Debug, Default)]
pub struct LanguageProgress {
  pub nobody_done: HashSet<String>,
  pub onlyme_done: HashSet<String>,
  pub pairs: BTreeMap<String, PairStatus>,
  pub extra_done: HashSet<String>,
}

impl LanguageProgress {
  pub fn instruction_done(&self, category: InstructionCategory) -> &HashSet<String> {
    match category {
      InstructionCategory::Nobody => &self.nobody_done,
      InstructionCategory::Onlyme => &self.onlyme_done,
    }
  }

  pub fn instruction_done_count(&self, category: InstructionCategory) -> usize {
    self.instruction_done(category).len()
  }

  pub fn pairs_done_count(&self) -> usize {
    self.pairs.values().filter(|p| p.is_complete()).count()
  }

  pub fn extra_done_count(&self) -> usize {
    self.extra_done.len()
  }
}

/// Derived, recomputed-per-request summary of a user's completion state.
#[derive(Clone, Debug, Default)]
pub struct ProgressSnapshot {
  pub zh: LanguageProgress,
  pub en: LanguageProgress,
}

impl ProgressSnapshot {
  pub fn for_language(&self, lang: Language) -> &LanguageProgress {
    match lang {
      Language::Zh => &self.zh,
      Language::En => &self.en,
    }
  }

  fn for_language_mut(&mut self, lang: Language) -> &mut LanguageProgress {
    match lang {
      Language::Zh => &mut self.zh,
      Language::En => &mut self.en,
    }
  }
}

/// Fold the fact list into a snapshot.
///
/// Duplicate facts collapse into "recorded at least once": sets and flags
/// never double-count.
pub fn compute_progress(facts: &[RecordingFact]) -> ProgressSnapshot {
  let mut snapshot = ProgressSnapshot::default();

  for fact in facts {
    let Some(lang) = Language::parse(&fact.language) else {
      continue;
    };
    let progress = snapshot.for_language_mut(lang);

    match fact.task_type.as_str() {
      "instruction" => {
        // The role slot carries the category for instruction facts.
        match InstructionCategory::parse(&fact.role) {
          Some(InstructionCategory::Nobody) => {
            progress.nobody_done.insert(fact.item_id.clone());
          }
          Some(InstructionCategory::Onlyme) => {
            progress.onlyme_done.insert(fact.item_id.clone());
          }
          None => {}
        }
      }
      "pair" => {
        let status = progress.pairs.entry(fact.item_id.clone()).or_default();
        match fact.role.as_str() {
          "secret" => status.secret = true,
          "question" => status.question = true,
          _ => {}
        }
      }
      "extra_question" => {
        progress.extra_done.insert(fact.item_id.clone());
      }
      _ => {}
    }
  }

  snapshot
}
