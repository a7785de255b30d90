//! Domain models used by the backend: languages, task categories, recording
//! facts, and the task descriptor handed to the front-end.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Corpus language partition. Task priority walks zh first, then en.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
  Zh,
  En,
}

impl Language {
  /// Priority order: primary language first.
  pub const ALL: [Language; 2] = [Language::Zh, Language::En];

  pub fn code(self) -> &'static str {
    match self {
      Language::Zh => "zh",
      Language::En => "en",
    }
  }

  pub fn parse(s: &str) -> Option<Language> {
    match s {
      "zh" => Some(Language::Zh),
      "en" => Some(Language::En),
      _ => None,
    }
  }
}

/// The two instruction-delivery modes. Each has its own quota and its own
/// per-user line assignment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstructionCategory {
  Nobody,
  Onlyme,
}

impl InstructionCategory {
  pub const ALL: [InstructionCategory; 2] = [InstructionCategory::Nobody, InstructionCategory::Onlyme];

  pub fn key(self) -> &'static str {
    match self {
      InstructionCategory::Nobody => "nobody",
      InstructionCategory::Onlyme => "onlyme",
    }
  }

  pub fn parse(s: &str) -> Option<InstructionCategory> {
    match s {
      "nobody" => Some(InstructionCategory::Nobody),
      "onlyme" => Some(InstructionCategory::Onlyme),
      _ => None,
    }
  }

  /// Instruction facts and tasks carry the category name in the role slot.
  pub fn role(self) -> Role {
    match self {
      InstructionCategory::Nobody => Role::Nobody,
      InstructionCategory::Onlyme => Role::Onlyme,
    }
  }
}

/// What kind of recording a task asks for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
  Instruction,
  Pair,
  ExtraQuestion,
}

/// Which half of a task a recording covers. Pairs use secret/question,
/// extra questions are always question, instructions carry their category.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
  Secret,
  Question,
  Nobody,
  Onlyme,
}

/// One bilingual corpus entry: a secret text plus the question derived from
/// it. Immutable after load.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CorpusItem {
  pub item_id: String,
  pub secret_text: String,
  pub question_for_secret: String,
}

/// One persisted recording. Append-only: the engine only ever reads these.
///
/// `language`, `task_type` and `role` stay plain strings on purpose — the
/// progress aggregator must stay total over arbitrary histories, so
/// unknown values are ignored there instead of failing deserialization.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RecordingFact {
  pub id: String,
  pub username: String,
  pub language: String,
  pub task_type: String,
  pub role: String,
  pub item_id: String,
  pub file_path: String,
  pub created_at: DateTime<Utc>,
}

/// The next thing a participant should record. This is the complete
/// contract surface the engine exposes to its caller.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TaskDescriptor {
  pub language: Language,
  pub task_type: TaskType,
  pub role: Role,
  pub item_id: String,
  pub text: String,
}

/// Composite id of one assigned instruction line, e.g. `nobody_3`.
/// Unique per (language, category) because the ordinal indexes that
/// category's source list.
pub fn instruction_item_id(category: InstructionCategory, ordinal: usize) -> String {
  format!("{}_{}", category.key(), ordinal)
}

/// Inverse of [`instruction_item_id`]; returns (category, ordinal).
pub fn parse_instruction_item_id(item_id: &str) -> Option<(InstructionCategory, usize)> {
  let (cat, ord) = item_id.rsplit_once('_')?;
  Some((InstructionCategory::parse(cat)?, ord.parse().ok()?))
}
