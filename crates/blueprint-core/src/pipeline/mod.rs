//! Orchestrator: runs one prompt through reset, planning, extraction, and
//! the per-file generation loop.
//!
//! Every step is awaited before the next starts and files are generated one
//! at a time, in list order. Nothing is retried: the first error ends the
//! run. The output root is not locked, so two runs against the same root
//! race.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::info;
use uuid::Uuid;

use crate::codegen;
use crate::error::PipelineError;
use crate::extract::{self, FileListPolicy};
use crate::gateway::ModelGateway;
use crate::output::{self, PathPolicy};
use crate::plan::{self, PlanObserver};

/// Per-run settings.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Model identifier used for all three steps.
    pub model: String,
    /// Destination of generated files; erased at the start of every run.
    pub output_root: PathBuf,
    /// Directory receiving `plan.md`.
    pub log_dir: PathBuf,
    pub path_policy: PathPolicy,
    pub file_list_policy: FileListPolicy,
}

impl PipelineConfig {
    pub const DEFAULT_MODEL: &str = "gpt-4";
    pub const DEFAULT_OUTPUT_ROOT: &str = "generated";
    pub const DEFAULT_LOG_DIR: &str = "logs";
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            model: Self::DEFAULT_MODEL.to_string(),
            output_root: PathBuf::from(Self::DEFAULT_OUTPUT_ROOT),
            log_dir: PathBuf::from(Self::DEFAULT_LOG_DIR),
            path_policy: PathPolicy::default(),
            file_list_policy: FileListPolicy::default(),
        }
    }
}

/// Summary of a completed run.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Entries removed from the output root during reset.
    pub removed: usize,
    /// Entries (or the listing itself) that reset could not remove.
    pub remove_failed: usize,
    /// Where the plan was logged.
    pub plan_path: PathBuf,
    /// Length of the plan text in bytes.
    pub plan_bytes: usize,
    /// Decoded file list, in generation order.
    pub files: Vec<String>,
    /// Paths written, parallel to `files`.
    pub written: Vec<PathBuf>,
}

impl PipelineReport {
    pub fn elapsed(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

/// Run the full pipeline for `prompt`.
///
/// Plan fragments are handed to `observer` as they stream in.
pub async fn run_pipeline(
    gateway: &dyn ModelGateway,
    config: &PipelineConfig,
    prompt: &str,
    observer: &mut (dyn PlanObserver + Send),
) -> Result<PipelineReport, PipelineError> {
    let run_id = Uuid::new_v4();
    let started_at = Utc::now();

    // 1. Reset.
    info!(run_id = %run_id, root = %config.output_root.display(), "deleting old output");
    let reset = output::reset_output_root(&config.output_root).await?;

    // 2. Planning.
    info!(run_id = %run_id, model = %config.model, gateway = gateway.name(), "generating plan");
    let stream = plan::generate_plan(gateway, prompt, &config.model).await?;
    let plan_text = plan::collect_plan(stream, observer).await?;
    let plan_path = output::save_plan(&config.log_dir, &plan_text).await?;
    info!(run_id = %run_id, path = %plan_path.display(), bytes = plan_text.len(), "plan saved");

    // 3. Extraction.
    info!(run_id = %run_id, "extracting file paths");
    let payload = extract::extract_file_paths(gateway, prompt, &plan_text, &config.model).await?;
    let files = extract::parse_file_list(payload.as_deref(), config.file_list_policy)?;
    info!(run_id = %run_id, count = files.len(), files = ?files, "files to generate");

    if config.path_policy == PathPolicy::Strict {
        for file_path in &files {
            output::check_relative_path(file_path)?;
        }
    }

    // 4. Generation loop.
    let total = files.len();
    let mut written = Vec::with_capacity(total);
    for (index, file_path) in files.iter().enumerate() {
        info!(run_id = %run_id, file_path = %file_path, n = index + 1, total, "generating code");
        let code =
            codegen::generate_code_for_file(gateway, prompt, &plan_text, file_path, &config.model)
                .await?;
        let path =
            output::write_generated_file(&config.output_root, file_path, &code, config.path_policy)
                .await?;
        info!(run_id = %run_id, path = %path.display(), "saved");
        written.push(path);
    }

    Ok(PipelineReport {
        run_id,
        started_at,
        finished_at: Utc::now(),
        removed: reset.removed,
        remove_failed: reset.failed,
        plan_path,
        plan_bytes: plan_text.len(),
        files,
        written,
    })
}

/// Run the pipeline as one background task on the current tokio runtime.
///
/// The run itself stays strictly sequential; this only keeps the caller's
/// scheduler free while it executes. There is no way to cancel it midway
/// short of aborting the handle.
pub fn spawn_pipeline(
    gateway: Arc<dyn ModelGateway>,
    config: PipelineConfig,
    prompt: String,
    mut observer: Box<dyn PlanObserver + Send>,
) -> JoinHandle<Result<PipelineReport, PipelineError>> {
    tokio::spawn(async move {
        run_pipeline(gateway.as_ref(), &config, &prompt, observer.as_mut()).await
    })
}
