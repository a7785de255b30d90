//! Runtime settings: corpus/data paths, per-category quotas, CORS origins.
//!
//! Defaults work out of the box; a TOML file pointed to by
//! `RECORDER_CONFIG_PATH` overrides any subset of fields.

use std::path::PathBuf;

use serde::Deserialize;
use tracing::{error, info};

use crate::domain::{InstructionCategory, Language};

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Settings {
  /// Where recordings and the JSONL stores live.
  pub data_dir: PathBuf,
  /// Where the corpus JSONL files and instruction TXT files live.
  pub source_dir: PathBuf,
  /// Comma-separated list of allowed origins, or "*" for any.
  pub cors_origins: String,

  /// How many instruction lines each user gets per (language, category).
  pub instruction_count: usize,

  // Quotas: the completion target per (language, category).
  pub zh_nobody_quota: usize,
  pub zh_onlyme_quota: usize,
  pub zh_pairs_quota: usize,
  pub zh_extra_quota: usize,
  pub en_nobody_quota: usize,
  pub en_onlyme_quota: usize,
  pub en_pairs_quota: usize,
  pub en_extra_quota: usize,
}

impl Default for Settings {
  fn default() -> Self {
    Self {
      data_dir: PathBuf::from("./data"),
      source_dir: PathBuf::from("./source"),
      cors_origins: "*".into(),
      instruction_count: 5,
      zh_nobody_quota: 5,
      zh_onlyme_quota: 5,
      zh_pairs_quota: 20,
      zh_extra_quota: 10,
      en_nobody_quota: 5,
      en_onlyme_quota: 5,
      en_pairs_quota: 20,
      en_extra_quota: 10,
    }
  }
}

impl Settings {
  pub fn recordings_dir(&self) -> PathBuf {
    self.data_dir.join("recordings")
  }

  pub fn users_path(&self) -> PathBuf {
    self.data_dir.join("users.jsonl")
  }

  pub fn facts_path(&self) -> PathBuf {
    self.data_dir.join("recordings.jsonl")
  }

  pub fn items_path(&self, lang: Language) -> PathBuf {
    self.source_dir.join(format!("secrets_{}.jsonl", lang.code()))
  }

  pub fn instruction_path(&self, lang: Language, category: InstructionCategory) -> PathBuf {
    self
      .source_dir
      .join(format!("instruction_{}_{}.txt", lang.code(), category.key()))
  }

  pub fn instruction_quota(&self, lang: Language, category: InstructionCategory) -> usize {
    match (lang, category) {
      (Language::Zh, InstructionCategory::Nobody) => self.zh_nobody_quota,
      (Language::Zh, InstructionCategory::Onlyme) => self.zh_onlyme_quota,
      (Language::En, InstructionCategory::Nobody) => self.en_nobody_quota,
      (Language::En, InstructionCategory::Onlyme) => self.en_onlyme_quota,
    }
  }

  pub fn pairs_quota(&self, lang: Language) -> usize {
    match lang {
      Language::Zh => self.zh_pairs_quota,
      Language::En => self.en_pairs_quota,
    }
  }

  pub fn extra_quota(&self, lang: Language) -> usize {
    match lang {
      Language::Zh => self.zh_extra_quota,
      Language::En => self.en_extra_quota,
    }
  }

  /// Parse the CORS origin list the way the front-end expects: "*" means
  /// any origin, otherwise a comma-separated allow-list.
  pub fn cors_origin_list(&self) -> Option<Vec<String>> {
    if self.cors_origins.trim() == "*" {
      return None;
    }
    Some(
      self
        .cors_origins
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect(),
    )
  }

  pub fn ensure_directories(&self) -> std::io::Result<()> {
    std::fs::create_dir_all(self.recordings_dir())
  }
}

/// Attempt to load `Settings` from RECORDER_CONFIG_PATH. On any parsing/IO
/// error we log and fall back to defaults rather than refusing to start.
pub fn load_settings_from_env() -> Settings {
  let Some(path) = std::env::var("RECORDER_CONFIG_PATH").ok() else {
    return Settings::default();
  };
  match std::fs::read_to_string(&path) {
    Ok(s) => match toml::from_str::<Settings>(&s) {
      Ok(cfg) => {
        info!(target: "voxrecord_backend", %path, "Loaded settings (TOML)");
        cfg
      }
      Err(e) => {
        error!(target: "voxrecord_backend", %path, error = %e, "Failed to parse TOML settings; using defaults");
        Settings::default()
      }
    },
    Err(e) => {
      error!(target: "voxrecord_backend", %path, error = %e, "Failed to read TOML settings file; using defaults");
      Settings::default()
    }
  }
}
