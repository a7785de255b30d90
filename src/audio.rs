//! Audio conversion via ffmpeg and canonical recording filenames.
//!
//! Uploads arrive as whatever the browser's MediaRecorder produced (webm,
//! ogg, ...) and are normalized to 16 kHz mono 16-bit PCM WAV, the usual
//! format for speech corpora. ffmpeg runs as a child process with a hard
//! timeout; this is the only place in the backend with such a deadline.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tokio::process::Command;
use tracing::{instrument, warn};

use crate::util::{sanitize_for_filename, trunc_for_log};

const CONVERT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum AudioError {
  #[error("could not run ffmpeg: {0}")]
  Spawn(#[from] std::io::Error),
  #[error("ffmpeg timed out after {}s", CONVERT_TIMEOUT.as_secs())]
  Timeout,
  #[error("ffmpeg failed: {0}")]
  Ffmpeg(String),
}

/// True if an ffmpeg binary is on PATH and answers `-version`.
pub async fn ffmpeg_available() -> bool {
  Command::new("ffmpeg")
    .arg("-version")
    .stdout(Stdio::null())
    .stderr(Stdio::null())
    .status()
    .await
    .map(|s| s.success())
    .unwrap_or(false)
}

/// Canonical recording filename:
/// `user-{u}__lang-{l}__type-{t}__role-{r}__item-{id}__ts-{timestamp}.wav`.
pub fn recording_filename(username: &str, language: &str, task_type: &str, role: &str, item_id: &str) -> String {
  let type_short = match task_type {
    "extra_question" => "extraQ",
    "instruction" => "instr",
    other => other,
  };
  format!(
    "user-{}__lang-{}__type-{}__role-{}__item-{}__ts-{}.wav",
    sanitize_for_filename(username),
    language,
    type_short,
    role,
    sanitize_for_filename(item_id),
    Utc::now().format("%Y%m%dT%H%M%S"),
  )
}

/// Convert `input` to canonical WAV at `output`.
#[instrument(level = "debug", skip_all, fields(output = %output.display()))]
pub async fn convert_to_wav(input: &Path, output: &Path) -> Result<(), AudioError> {
  // `output()` captures stdout/stderr; ffmpeg reports problems on stderr.
  let child = Command::new("ffmpeg")
    .arg("-i")
    .arg(input)
    .args(["-acodec", "pcm_s16le", "-ar", "16000", "-ac", "1", "-y"])
    .arg(output)
    .output();

  let result = match tokio::time::timeout(CONVERT_TIMEOUT, child).await {
    Ok(r) => r?,
    Err(_) => {
      warn!(target: "voxrecord_backend", input = %input.display(), "ffmpeg conversion timed out");
      return Err(AudioError::Timeout);
    }
  };

  if result.status.success() {
    Ok(())
  } else {
    let stderr = String::from_utf8_lossy(&result.stderr);
    Err(AudioError::Ffmpeg(trunc_for_log(&stderr, 200)))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn filenames_are_canonical_and_sanitized() {
    let name = recording_filename("al ice", "zh", "extra_question", "question", "item/7");
    assert!(name.starts_with("user-al_ice__lang-zh__type-extraQ__role-question__item-item_7__ts-"));
    assert!(name.ends_with(".wav"));
  }

  #[test]
  fn pair_and_instruction_type_tags() {
    assert!(recording_filename("u", "en", "pair", "secret", "a").contains("__type-pair__"));
    assert!(recording_filename("u", "en", "instruction", "nobody", "nobody_0").contains("__type-instr__"));
  }
}
