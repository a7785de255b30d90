//! Persistence for participants and their recordings.
//!
//! Facts are append-only: one JSONL line per recording, mirrored in memory
//! for reads. The engine never writes here; the HTTP layer appends a fact
//! after a successful upload and recomputes progress from the full list.
//!
//! A line that fails to parse on reload is skipped with a warning so one
//! corrupt entry cannot take the whole store down.

use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::config::Settings;
use crate::domain::RecordingFact;

#[derive(Debug, Error)]
pub enum StoreError {
  #[error("store io error: {0}")]
  Io(#[from] std::io::Error),
  #[error("store encoding error: {0}")]
  Encode(#[from] serde_json::Error),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UserRecord {
  pub username: String,
  pub created_at: DateTime<Utc>,
}

pub struct FactStore {
  users_path: PathBuf,
  facts_path: PathBuf,
  users: RwLock<BTreeMap<String, UserRecord>>,
  facts: RwLock<Vec<RecordingFact>>,
}

impl FactStore {
  /// Open the store under the configured data dir, creating directories
  /// and loading any existing JSONL state. Unreadable state is fatal here,
  /// at startup, never mid-request.
  #[instrument(level = "info", skip_all)]
  pub fn open(settings: &Settings) -> Result<Self, StoreError> {
    settings.ensure_directories()?;

    let users_path = settings.users_path();
    let facts_path = settings.facts_path();

    let users: BTreeMap<String, UserRecord> = load_jsonl::<UserRecord>(&users_path)?
      .into_iter()
      .map(|u| (u.username.clone(), u))
      .collect();
    let facts = load_jsonl::<RecordingFact>(&facts_path)?;

    info!(
      target: "voxrecord_backend",
      users = users.len(),
      facts = facts.len(),
      data_dir = %settings.data_dir.display(),
      "Opened fact store"
    );

    Ok(Self {
      users_path,
      facts_path,
      users: RwLock::new(users),
      facts: RwLock::new(facts),
    })
  }

  pub fn user_exists(&self, username: &str) -> bool {
    read(&self.users).contains_key(username)
  }

  /// Register the user on first login; idempotent afterwards.
  pub fn ensure_user(&self, username: &str) -> Result<UserRecord, StoreError> {
    if let Some(existing) = read(&self.users).get(username) {
      return Ok(existing.clone());
    }

    let mut users = write(&self.users);
    if let Some(existing) = users.get(username) {
      return Ok(existing.clone());
    }
    let record = UserRecord { username: username.to_string(), created_at: Utc::now() };
    append_jsonl(&self.users_path, &record)?;
    users.insert(username.to_string(), record.clone());
    info!(target: "voxrecord_backend", user = username, "Created new user");
    Ok(record)
  }

  /// Append one recording fact durably, then mirror it in memory.
  pub fn append_fact(&self, fact: RecordingFact) -> Result<(), StoreError> {
    append_jsonl(&self.facts_path, &fact)?;
    write(&self.facts).push(fact);
    Ok(())
  }

  /// The user's full history, oldest first.
  pub fn facts_for(&self, username: &str) -> Vec<RecordingFact> {
    read(&self.facts)
      .iter()
      .filter(|f| f.username == username)
      .cloned()
      .collect()
  }

  pub fn all_facts(&self) -> Vec<RecordingFact> {
    read(&self.facts).clone()
  }

  pub fn all_users(&self) -> Vec<UserRecord> {
    read(&self.users).values().cloned().collect()
  }
}

fn load_jsonl<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Vec<T>, StoreError> {
  let text = match std::fs::read_to_string(path) {
    Ok(t) => t,
    Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
    Err(e) => return Err(e.into()),
  };

  let mut out = Vec::new();
  for (line_num, line) in text.lines().enumerate() {
    let line = line.trim();
    if line.is_empty() {
      continue;
    }
    match serde_json::from_str::<T>(line) {
      Ok(v) => out.push(v),
      Err(e) => {
        warn!(target: "voxrecord_backend", path = %path.display(), line = line_num + 1, error = %e, "Skipping corrupt store line");
      }
    }
  }
  Ok(out)
}

fn append_jsonl<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
  let mut line = serde_json::to_string(value)?;
  line.push('\n');
  let mut file = OpenOptions::new().create(true).append(true).open(path)?;
  file.write_all(line.as_bytes())?;
  Ok(())
}

fn read<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
  lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
  lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}
