//! Application state: corpus, instruction assignments, fact store, and the
//! task engine, all explicitly constructed and shared behind `Arc`.
//!
//! Nothing here is a process-wide global; handlers receive the state from
//! the router and the engine receives its collaborators at construction.

use std::sync::Arc;

use tracing::{info, instrument};

use crate::assign::UserAssignments;
use crate::config::Settings;
use crate::corpus::CorpusStore;
use crate::domain::{InstructionCategory, Language, TaskDescriptor};
use crate::engine::TaskEngine;
use crate::progress::{compute_progress, ProgressSnapshot};
use crate::store::{FactStore, StoreError};

pub struct AppState {
    pub settings: Arc<Settings>,
    pub corpus: Arc<CorpusStore>,
    pub assignments: Arc<UserAssignments>,
    pub store: Arc<FactStore>,
    pub engine: TaskEngine,
    pub ffmpeg_available: bool,
}

impl AppState {
    /// Build state from settings: load the corpus, open the fact store,
    /// wire the engine. Fails only on unreadable persistent state.
    #[instrument(level = "info", skip_all)]
    pub fn new(settings: Settings, ffmpeg_available: bool) -> Result<Self, StoreError> {
        let settings = Arc::new(settings);
        let corpus = Arc::new(CorpusStore::load(&settings));

        // Startup inventory summary, per language and category.
        for lang in Language::ALL {
            info!(
                target: "voxrecord_backend",
                lang = lang.code(),
                items = corpus.items(lang).len(),
                nobody_lines = corpus.instruction_lines(lang, InstructionCategory::Nobody).len(),
                onlyme_lines = corpus.instruction_lines(lang, InstructionCategory::Onlyme).len(),
                "Startup corpus inventory"
            );
        }

        let assignments = Arc::new(UserAssignments::new());
        let store = Arc::new(FactStore::open(&settings)?);
        let engine = TaskEngine::new(corpus.clone(), assignments.clone(), settings.clone());

        Ok(Self { settings, corpus, assignments, store, engine, ffmpeg_available })
    }

    /// Recompute the user's snapshot from their full recorded history.
    pub fn progress_for(&self, username: &str) -> ProgressSnapshot {
        compute_progress(&self.store.facts_for(username))
    }

    /// Ask the engine for the next task against an already-computed
    /// snapshot. Random draws use the thread RNG.
    pub fn next_task_for(&self, username: &str, progress: &ProgressSnapshot) -> Option<TaskDescriptor> {
        self.engine.next_task(username, progress, &mut rand::thread_rng())
    }
}
