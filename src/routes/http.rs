//! HTTP endpoint handlers. These are thin wrappers that validate input and
//! forward to the engine/store; each is instrumented and logs basic result
//! info.

use std::sync::Arc;

use axum::{
  body::Bytes,
  extract::{Multipart, Query, State},
  Json,
};
use base64::Engine as _;
use chrono::Utc;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::audio::{convert_to_wav, recording_filename};
use crate::domain::{parse_instruction_item_id, InstructionCategory, Language, RecordingFact};
use crate::error::ApiError;
use crate::protocol::*;
use crate::state::AppState;

#[instrument(level = "info", skip(state))]
pub async fn http_health(State(state): State<Arc<AppState>>) -> Json<HealthOut> {
  Json(HealthOut {
    status: "ok",
    message: "VoxRecord backend is running",
    ffmpeg_available: state.ffmpeg_available,
  })
}

/// Login or create a user, returning current progress.
#[instrument(level = "info", skip_all)]
pub async fn http_login(
  State(state): State<Arc<AppState>>,
  mut multipart: Multipart,
) -> Result<Json<LoginOut>, ApiError> {
  let mut username = None;
  while let Some(field) = multipart
    .next_field()
    .await
    .map_err(|e| ApiError::BadRequest(format!("Invalid form data: {e}")))?
  {
    if field.name() == Some("username") {
      let value = field
        .text()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Invalid form data: {e}")))?;
      username = Some(value);
    }
  }

  let username = username
    .map(|s| s.trim().to_string())
    .filter(|s| !s.is_empty())
    .ok_or_else(|| ApiError::BadRequest("Username cannot be empty".into()))?;

  state.store.ensure_user(&username)?;
  let progress = state.progress_for(&username);
  info!(target: "voxrecord_backend", user = %username, "Login");
  Ok(Json(LoginOut { progress: progress_out(&progress), username }))
}

/// The next recording task for a user, plus current progress.
#[instrument(level = "info", skip(state), fields(user = %q.username))]
pub async fn http_next_task(
  State(state): State<Arc<AppState>>,
  Query(q): Query<NextTaskQuery>,
) -> Result<Json<NextTaskOut>, ApiError> {
  let username = q.username.trim().to_string();
  if username.is_empty() {
    return Err(ApiError::BadRequest("Username is required".into()));
  }
  if !state.store.user_exists(&username) {
    return Err(ApiError::UnknownUser);
  }

  let progress = state.progress_for(&username);
  let task = state.next_task_for(&username, &progress);
  match &task {
    Some(t) => {
      info!(target: "task", user = %username, lang = t.language.code(), task_type = ?t.task_type, item = %t.item_id, "Task served")
    }
    None => info!(target: "task", user = %username, "All tasks completed"),
  }

  let message = task
    .is_none()
    .then(|| "All tasks completed! Thank you for your participation.".to_string());
  Ok(Json(NextTaskOut { username, task, progress: progress_out(&progress), message }))
}

/// Multipart upload: form fields plus the audio blob itself.
#[instrument(level = "info", skip_all)]
pub async fn http_upload_recording(
  State(state): State<Arc<AppState>>,
  mut multipart: Multipart,
) -> Result<Json<UploadOut>, ApiError> {
  let mut meta = UploadMeta::default();
  let mut audio: Option<Bytes> = None;

  while let Some(field) = multipart
    .next_field()
    .await
    .map_err(|e| ApiError::BadRequest(format!("Invalid form data: {e}")))?
  {
    let name = field.name().unwrap_or_default().to_string();
    if name == "audio" {
      audio = Some(
        field
          .bytes()
          .await
          .map_err(|e| ApiError::BadRequest(format!("Invalid audio field: {e}")))?,
      );
      continue;
    }
    let value = field
      .text()
      .await
      .map_err(|e| ApiError::BadRequest(format!("Invalid form data: {e}")))?;
    match name.as_str() {
      "username" => meta.username = value,
      "language" => meta.language = value,
      "task_type" => meta.task_type = value,
      "role" => meta.role = value,
      "item_id" => meta.item_id = value,
      _ => {}
    }
  }

  let audio = audio.ok_or_else(|| ApiError::BadRequest("Missing audio file".into()))?;
  validate_upload(&state, &meta)?;
  process_upload(&state, meta, &audio).await
}

/// JSON upload: audio arrives base64-encoded.
#[instrument(level = "info", skip(state, body), fields(user = %body.username, item = %body.item_id))]
pub async fn http_upload_recording_b64(
  State(state): State<Arc<AppState>>,
  Json(body): Json<UploadB64In>,
) -> Result<Json<UploadOut>, ApiError> {
  let meta = UploadMeta {
    username: body.username,
    language: body.language,
    task_type: body.task_type,
    role: body.role,
    item_id: body.item_id,
  };
  validate_upload(&state, &meta)?;

  debug!(target: "voxrecord_backend", mime = body.mime.as_deref().unwrap_or("unknown"), b64_len = body.audio_base64.len(), "Decoding base64 upload");
  let audio = base64::engine::general_purpose::STANDARD
    .decode(body.audio_base64.as_bytes())
    .map_err(|e| ApiError::BadRequest(format!("Invalid base64 audio: {e}")))?;

  process_upload(&state, meta, &audio).await
}

/// Export all recording metadata as JSON.
#[instrument(level = "info", skip(state))]
pub async fn http_export_metadata(State(state): State<Arc<AppState>>) -> Json<ExportOut> {
  let recordings = state.store.all_facts();
  Json(ExportOut { total_recordings: recordings.len(), recordings })
}

/// Per-user progress for all registered users.
#[instrument(level = "info", skip(state))]
pub async fn http_user_stats(State(state): State<Arc<AppState>>) -> Json<UserStatsOut> {
  let users: Vec<UserStatsEntry> = state
    .store
    .all_users()
    .into_iter()
    .map(|u| {
      let progress = state.progress_for(&u.username);
      UserStatsEntry {
        username: u.username,
        created_at: u.created_at,
        progress: progress_out(&progress),
      }
    })
    .collect();
  Json(UserStatsOut { total_users: users.len(), users })
}

#[derive(Debug, Default)]
struct UploadMeta {
  username: String,
  language: String,
  task_type: String,
  role: String,
  item_id: String,
}

/// Reject uploads that do not describe a real task before touching disk.
fn validate_upload(state: &AppState, meta: &UploadMeta) -> Result<(), ApiError> {
  if !state.store.user_exists(&meta.username) {
    return Err(ApiError::UnknownUser);
  }
  let lang = Language::parse(&meta.language)
    .ok_or_else(|| ApiError::BadRequest("Language must be 'zh' or 'en'".into()))?;

  match meta.task_type.as_str() {
    "pair" => {
      if !matches!(meta.role.as_str(), "secret" | "question") {
        return Err(ApiError::BadRequest("Role must be 'secret' or 'question'".into()));
      }
      require_corpus_item(state, lang, &meta.item_id)?;
    }
    "extra_question" => {
      if meta.role != "question" {
        return Err(ApiError::BadRequest("Role must be 'question' for extra questions".into()));
      }
      require_corpus_item(state, lang, &meta.item_id)?;
    }
    "instruction" => {
      let category = InstructionCategory::parse(&meta.role)
        .ok_or_else(|| ApiError::BadRequest("Role must be 'nobody' or 'onlyme'".into()))?;
      let Some((id_category, ordinal)) = parse_instruction_item_id(&meta.item_id) else {
        return Err(ApiError::BadRequest(format!("Invalid instruction item id '{}'", meta.item_id)));
      };
      let lines = state.corpus.instruction_lines(lang, category);
      if id_category != category || ordinal >= lines.len() {
        return Err(ApiError::BadRequest(format!(
          "Item {} not found in {} {} instructions",
          meta.item_id,
          lang.code(),
          category.key()
        )));
      }
    }
    _ => {
      return Err(ApiError::BadRequest(
        "Task type must be 'instruction', 'pair' or 'extra_question'".into(),
      ));
    }
  }
  Ok(())
}

fn require_corpus_item(state: &AppState, lang: Language, item_id: &str) -> Result<(), ApiError> {
  state
    .corpus
    .item_by_id(lang, item_id)
    .map(|_| ())
    .ok_or_else(|| ApiError::BadRequest(format!("Item {} not found in {} data", item_id, lang.code())))
}

/// Write the raw upload to a temp file, convert to canonical WAV, persist
/// the fact, and answer with refreshed progress.
async fn process_upload(
  state: &AppState,
  meta: UploadMeta,
  audio: &[u8],
) -> Result<Json<UploadOut>, ApiError> {
  let filename = recording_filename(&meta.username, &meta.language, &meta.task_type, &meta.role, &meta.item_id);
  let output_path = state.settings.recordings_dir().join(&filename);
  let temp_path = state
    .settings
    .recordings_dir()
    .join(format!("upload-{}.tmp", Uuid::new_v4()));

  tokio::fs::write(&temp_path, audio)
    .await
    .map_err(|e| ApiError::Upload(e.to_string()))?;

  let converted = convert_to_wav(&temp_path, &output_path).await;
  tokio::fs::remove_file(&temp_path).await.ok();
  if let Err(e) = converted {
    // Don't leave a half-written WAV behind.
    tokio::fs::remove_file(&output_path).await.ok();
    return Err(e.into());
  }

  let file_path = output_path.to_string_lossy().into_owned();
  state.store.append_fact(RecordingFact {
    id: Uuid::new_v4().to_string(),
    username: meta.username.clone(),
    language: meta.language,
    task_type: meta.task_type,
    role: meta.role,
    item_id: meta.item_id,
    file_path: file_path.clone(),
    created_at: Utc::now(),
  })?;
  info!(target: "voxrecord_backend", %filename, user = %meta.username, "Saved recording");

  let progress = state.progress_for(&meta.username);
  Ok(Json(UploadOut {
    status: "ok",
    file_path,
    filename,
    progress: progress_out(&progress),
    message: "Recording uploaded successfully",
  }))
}
