//! Public request/response structs for the HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{InstructionCategory, RecordingFact, TaskDescriptor};
use crate::progress::ProgressSnapshot;

/// The progress object shown to participants: completed counts per
/// (language, category). Field names are part of the front-end contract.
#[derive(Debug, Serialize)]
pub struct ProgressOut {
    pub zh_nobody_done: usize,
    pub zh_onlyme_done: usize,
    pub zh_pairs_done: usize,
    pub zh_extra_questions_done: usize,
    pub en_nobody_done: usize,
    pub en_onlyme_done: usize,
    pub en_pairs_done: usize,
    pub en_extra_questions_done: usize,
}

/// Convert the internal snapshot to the public counters.
pub fn progress_out(snapshot: &ProgressSnapshot) -> ProgressOut {
    ProgressOut {
        zh_nobody_done: snapshot.zh.instruction_done_count(InstructionCategory::Nobody),
        zh_onlyme_done: snapshot.zh.instruction_done_count(InstructionCategory::Onlyme),
        zh_pairs_done: snapshot.zh.pairs_done_count(),
        zh_extra_questions_done: snapshot.zh.extra_done_count(),
        en_nobody_done: snapshot.en.instruction_done_count(InstructionCategory::Nobody),
        en_onlyme_done: snapshot.en.instruction_done_count(InstructionCategory::Onlyme),
        en_pairs_done: snapshot.en.pairs_done_count(),
        en_extra_questions_done: snapshot.en.extra_done_count(),
    }
}

#[derive(Serialize)]
pub struct HealthOut {
    pub status: &'static str,
    pub message: &'static str,
    pub ffmpeg_available: bool,
}

#[derive(Serialize)]
pub struct LoginOut {
    pub username: String,
    pub progress: ProgressOut,
}

#[derive(Debug, Deserialize)]
pub struct NextTaskQuery {
    pub username: String,
}

#[derive(Serialize)]
pub struct NextTaskOut {
    pub username: String,
    pub task: Option<TaskDescriptor>,
    pub progress: ProgressOut,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// JSON upload variant for clients that ship audio as base64 (the same
/// transport the browser recorder uses for in-page transfers).
#[derive(Debug, Deserialize)]
pub struct UploadB64In {
    pub username: String,
    pub language: String,
    pub task_type: String,
    pub role: String,
    pub item_id: String,
    #[serde(rename = "audioBase64")]
    pub audio_base64: String,
    #[serde(default)]
    pub mime: Option<String>,
}

#[derive(Serialize)]
pub struct UploadOut {
    pub status: &'static str,
    pub file_path: String,
    pub filename: String,
    pub progress: ProgressOut,
    pub message: &'static str,
}

#[derive(Serialize)]
pub struct ExportOut {
    pub total_recordings: usize,
    pub recordings: Vec<RecordingFact>,
}

#[derive(Serialize)]
pub struct UserStatsEntry {
    pub username: String,
    pub created_at: DateTime<Utc>,
    pub progress: ProgressOut,
}

#[derive(Serialize)]
pub struct UserStatsOut {
    pub total_users: usize,
    pub users: Vec<UserStatsEntry>,
}
