//! Per-user instruction line assignment.
//!
//! Each user gets a fixed subset of the instruction lines for every
//! (language, category), stable for the user's lifetime:
//!   - the draw is seeded from FNV-1a 64 over
//!     `{username} 0x1f {lang}_{category}` (see `util::fnv1a_64`), so the
//!     same assignment is re-derivable after a restart;
//!   - sampling is without replacement and the drawn order is kept, so the
//!     user always sees their lines in one deterministic sequence;
//!   - results are cached in memory keyed by (user, language, category).
//!     First assignment happens under the write lock, which serializes
//!     concurrent first requests for the same key.

use std::collections::HashMap;
use std::sync::RwLock;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::warn;

use crate::domain::{InstructionCategory, Language};
use crate::util::fnv1a_64;

type AssignmentKey = (String, Language, InstructionCategory);

#[derive(Default)]
pub struct UserAssignments {
  cache: RwLock<HashMap<AssignmentKey, Vec<usize>>>,
}

impl UserAssignments {
  pub fn new() -> Self {
    Self::default()
  }

  /// The user's assigned ordinals into a line list of length `available`,
  /// in their fixed presentation order. Cached after the first call.
  ///
  /// If fewer lines exist than requested the effective count degrades to
  /// `available` (warned, non-fatal).
  pub fn assigned_indices(
    &self,
    username: &str,
    lang: Language,
    category: InstructionCategory,
    available: usize,
    count: usize,
  ) -> Vec<usize> {
    let key = (username.to_string(), lang, category);

    if let Some(found) = read_lock(&self.cache).get(&key) {
      return found.clone();
    }

    let mut cache = write_lock(&self.cache);
    cache
      .entry(key)
      .or_insert_with(|| sample_indices(username, lang, category, available, count))
      .clone()
  }

  /// Assigned `(ordinal, text)` pairs for the given line list, in the
  /// user's fixed order.
  pub fn assigned_lines(
    &self,
    username: &str,
    lang: Language,
    category: InstructionCategory,
    lines: &[String],
    count: usize,
  ) -> Vec<(usize, String)> {
    self
      .assigned_indices(username, lang, category, lines.len(), count)
      .into_iter()
      .filter(|&idx| idx < lines.len())
      .map(|idx| (idx, lines[idx].clone()))
      .collect()
  }
}

/// One deterministic draw. The seed depends only on the username and the
/// `{lang}_{category}` key, never on wall-clock or call order.
fn sample_indices(
  username: &str,
  lang: Language,
  category: InstructionCategory,
  available: usize,
  count: usize,
) -> Vec<usize> {
  let effective = if available < count {
    warn!(
      target: "task",
      user = username,
      lang = lang.code(),
      category = category.key(),
      available,
      requested = count,
      "Not enough instruction lines; reducing assignment size"
    );
    available
  } else {
    count
  };

  let mut seed_bytes = Vec::with_capacity(username.len() + 16);
  seed_bytes.extend_from_slice(username.as_bytes());
  seed_bytes.push(0x1f);
  seed_bytes.extend_from_slice(lang.code().as_bytes());
  seed_bytes.push(b'_');
  seed_bytes.extend_from_slice(category.key().as_bytes());

  let mut rng = StdRng::seed_from_u64(fnv1a_64(&seed_bytes));
  rand::seq::index::sample(&mut rng, available, effective).into_iter().collect()
}

fn read_lock<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
  lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write_lock<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
  lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
  use super::*;

  fn lines(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("line {i}")).collect()
  }

  #[test]
  fn repeated_calls_return_identical_ordered_lines() {
    let assignments = UserAssignments::new();
    let lines = lines(20);
    let first = assignments.assigned_lines("alice", Language::Zh, InstructionCategory::Nobody, &lines, 5);
    let second = assignments.assigned_lines("alice", Language::Zh, InstructionCategory::Nobody, &lines, 5);
    assert_eq!(first, second);
    assert_eq!(first.len(), 5);
  }

  #[test]
  fn derivation_is_stable_across_store_instances() {
    // A fresh cache (e.g. after restart) must re-derive the same draw.
    let lines = lines(30);
    let a = UserAssignments::new().assigned_lines("bob", Language::En, InstructionCategory::Onlyme, &lines, 5);
    let b = UserAssignments::new().assigned_lines("bob", Language::En, InstructionCategory::Onlyme, &lines, 5);
    assert_eq!(a, b);
  }

  #[test]
  fn indices_are_distinct_and_in_range() {
    let assignments = UserAssignments::new();
    let picked = assignments.assigned_indices("carol", Language::Zh, InstructionCategory::Onlyme, 12, 5);
    assert_eq!(picked.len(), 5);
    let mut dedup = picked.clone();
    dedup.sort_unstable();
    dedup.dedup();
    assert_eq!(dedup.len(), 5);
    assert!(picked.iter().all(|&i| i < 12));
  }

  #[test]
  fn shortfall_reduces_effective_count() {
    let assignments = UserAssignments::new();
    let lines = lines(3);
    let picked = assignments.assigned_lines("dave", Language::En, InstructionCategory::Nobody, &lines, 5);
    assert_eq!(picked.len(), 3);
  }

  #[test]
  fn empty_line_list_yields_empty_assignment() {
    let assignments = UserAssignments::new();
    let picked = assignments.assigned_lines("erin", Language::Zh, InstructionCategory::Nobody, &[], 5);
    assert!(picked.is_empty());
  }

  #[test]
  fn categories_and_users_draw_independently() {
    let assignments = UserAssignments::new();
    let lines = lines(50);
    let nobody = assignments.assigned_lines("frank", Language::Zh, InstructionCategory::Nobody, &lines, 5);
    let onlyme = assignments.assigned_lines("frank", Language::Zh, InstructionCategory::Onlyme, &lines, 5);
    let other = assignments.assigned_lines("grace", Language::Zh, InstructionCategory::Nobody, &lines, 5);
    // Deterministic seeds, so these comparisons are stable.
    assert_ne!(nobody, onlyme);
    assert_ne!(nobody, other);
  }
}
