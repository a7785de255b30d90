//! Read-only corpus store: bilingual secret/question item sets (JSONL) and
//! instruction line lists (TXT), loaded once at startup.
//!
//! Missing files are logged loudly and yield empty sets; the server still
//! starts and the affected categories simply exhaust immediately.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use tracing::{info, instrument, warn};

use crate::config::Settings;
use crate::domain::{CorpusItem, InstructionCategory, Language};

/// Raw shape of one corpus JSONL line. `entry_id` is optional in the data;
/// lines without one get their zero-based line number as id.
#[derive(Deserialize)]
struct RawItem {
  entry_id: Option<String>,
  secret_text: String,
  question_for_secret: String,
}

pub struct CorpusStore {
  items: HashMap<Language, Vec<CorpusItem>>,
  by_id: HashMap<(Language, String), usize>,
  instructions: HashMap<(Language, InstructionCategory), Vec<String>>,
}

impl CorpusStore {
  /// Load all corpus files named by the settings.
  #[instrument(level = "info", skip_all)]
  pub fn load(settings: &Settings) -> Self {
    let mut items = HashMap::new();
    let mut instructions = HashMap::new();

    for lang in Language::ALL {
      let path = settings.items_path(lang);
      let loaded = load_jsonl(&path);
      info!(target: "voxrecord_backend", lang = lang.code(), count = loaded.len(), path = %path.display(), "Loaded corpus items");
      items.insert(lang, loaded);

      for category in InstructionCategory::ALL {
        let path = settings.instruction_path(lang, category);
        let lines = load_txt(&path);
        info!(target: "voxrecord_backend", lang = lang.code(), category = category.key(), count = lines.len(), "Loaded instruction lines");
        instructions.insert((lang, category), lines);
      }
    }

    Self::from_parts(items, instructions)
  }

  /// Assemble a store from already-loaded data. Used by `load` and by
  /// tests that need a corpus without touching the filesystem.
  pub fn from_parts(
    items: HashMap<Language, Vec<CorpusItem>>,
    instructions: HashMap<(Language, InstructionCategory), Vec<String>>,
  ) -> Self {
    let mut by_id = HashMap::new();
    for (lang, list) in &items {
      for (pos, item) in list.iter().enumerate() {
        by_id.insert((*lang, item.item_id.clone()), pos);
      }
    }
    Self { items, by_id, instructions }
  }

  pub fn items(&self, lang: Language) -> &[CorpusItem] {
    self.items.get(&lang).map(Vec::as_slice).unwrap_or(&[])
  }

  pub fn item_by_id(&self, lang: Language, item_id: &str) -> Option<&CorpusItem> {
    let pos = *self.by_id.get(&(lang, item_id.to_string()))?;
    self.items.get(&lang)?.get(pos)
  }

  pub fn instruction_lines(&self, lang: Language, category: InstructionCategory) -> &[String] {
    self
      .instructions
      .get(&(lang, category))
      .map(Vec::as_slice)
      .unwrap_or(&[])
  }
}

/// Parse a JSONL corpus file. Malformed lines are skipped with a warning;
/// an absent file yields an empty set.
fn load_jsonl(path: &Path) -> Vec<CorpusItem> {
  let text = match std::fs::read_to_string(path) {
    Ok(t) => t,
    Err(e) => {
      warn!(target: "voxrecord_backend", path = %path.display(), error = %e, "Corpus file not readable");
      return Vec::new();
    }
  };

  let mut out = Vec::new();
  for (line_num, line) in text.lines().enumerate() {
    let line = line.trim();
    if line.is_empty() {
      continue;
    }
    match serde_json::from_str::<RawItem>(line) {
      Ok(raw) => out.push(CorpusItem {
        item_id: raw.entry_id.unwrap_or_else(|| line_num.to_string()),
        secret_text: raw.secret_text,
        question_for_secret: raw.question_for_secret,
      }),
      Err(e) => {
        warn!(target: "voxrecord_backend", path = %path.display(), line = line_num + 1, error = %e, "Skipping malformed corpus line");
      }
    }
  }
  out
}

/// Load instruction lines, dropping blanks. Ordinals elsewhere refer to the
/// retained lines in this order.
fn load_txt(path: &Path) -> Vec<String> {
  let text = match std::fs::read_to_string(path) {
    Ok(t) => t,
    Err(e) => {
      warn!(target: "voxrecord_backend", path = %path.display(), error = %e, "Instruction file not readable");
      return Vec::new();
    }
  };
  text
    .lines()
    .map(str::trim)
    .filter(|l| !l.is_empty())
    .map(str::to_string)
    .collect()
}
