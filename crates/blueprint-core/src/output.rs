//! Filesystem side of a run: reset the output root, persist the plan log,
//! write generated files.
//!
//! Writes are plain overwrites with no atomicity: a crash mid-write leaves a
//! partial file behind.

use std::path::{Component, Path, PathBuf};

use tokio::fs;
use tracing::{debug, warn};

use crate::error::PipelineError;

/// File name of the plan log inside the log directory.
pub const PLAN_LOG_FILE: &str = "plan.md";

/// What to do with generated paths that would escape the output root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PathPolicy {
    /// Honour the path as given and log a warning.
    #[default]
    Permissive,
    /// Refuse with [`PipelineError::UnsafePath`] before touching the disk.
    Strict,
}

/// Counts from [`reset_output_root`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResetOutcome {
    /// Top-level entries removed.
    pub removed: usize,
    /// Top-level entries that could not be removed (logged, not fatal).
    pub failed: usize,
}

/// Remove everything inside `root`, then make sure `root` exists.
///
/// A missing root is fine. Failures to list or remove individual entries
/// are logged, counted in [`ResetOutcome::failed`], and skipped; only failing
/// to (re)create the root is fatal.
pub async fn reset_output_root(root: &Path) -> Result<ResetOutcome, PipelineError> {
    reset_output_root_with(root, remove_entry).await
}

async fn remove_entry(path: PathBuf, is_dir: bool) -> std::io::Result<()> {
    if is_dir {
        fs::remove_dir_all(&path).await
    } else {
        fs::remove_file(&path).await
    }
}

/// [`reset_output_root`] with the per-entry removal supplied by the caller.
pub(crate) async fn reset_output_root_with<R, Fut>(
    root: &Path,
    mut remove: R,
) -> Result<ResetOutcome, PipelineError>
where
    R: FnMut(PathBuf, bool) -> Fut,
    Fut: Future<Output = std::io::Result<()>>,
{
    let mut outcome = ResetOutcome::default();

    match fs::read_dir(root).await {
        Ok(mut entries) => loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    warn!(root = %root.display(), error = %e, "failed to read output root entry");
                    outcome.failed += 1;
                    break;
                }
            };

            let path = entry.path();
            // file_type() does not follow symlinks, so a link to a directory
            // is unlinked rather than recursed into.
            let is_dir = matches!(entry.file_type().await, Ok(ft) if ft.is_dir());
            match remove(path.clone(), is_dir).await {
                Ok(()) => outcome.removed += 1,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to remove old output");
                    outcome.failed += 1;
                }
            }
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            warn!(root = %root.display(), error = %e, "could not list output root");
            outcome.failed += 1;
        }
    }

    fs::create_dir_all(root)
        .await
        .map_err(|e| PipelineError::filesystem(root, e))?;

    debug!(root = %root.display(), removed = outcome.removed, failed = outcome.failed, "output root reset");
    Ok(outcome)
}

/// Write the plan verbatim to `<log_dir>/plan.md`, overwriting.
pub async fn save_plan(log_dir: &Path, plan: &str) -> Result<PathBuf, PipelineError> {
    fs::create_dir_all(log_dir)
        .await
        .map_err(|e| PipelineError::filesystem(log_dir, e))?;

    let path = log_dir.join(PLAN_LOG_FILE);
    fs::write(&path, plan)
        .await
        .map_err(|e| PipelineError::filesystem(&path, e))?;
    Ok(path)
}

/// Reject paths that are absolute or climb out through `..`.
pub fn check_relative_path(relative: &str) -> Result<(), PipelineError> {
    let unsafe_path = |reason: &str| PipelineError::UnsafePath {
        path: relative.to_string(),
        reason: reason.to_string(),
    };

    if relative.trim().is_empty() {
        return Err(unsafe_path("empty path"));
    }

    for component in Path::new(relative).components() {
        match component {
            Component::Prefix(_) | Component::RootDir => {
                return Err(unsafe_path("absolute path"));
            }
            Component::ParentDir => return Err(unsafe_path("parent directory segment")),
            Component::CurDir | Component::Normal(_) => {}
        }
    }
    Ok(())
}

/// Write `code` (trimmed) to `root/relative`, creating missing directories.
///
/// Returns the path written.
pub async fn write_generated_file(
    root: &Path,
    relative: &str,
    code: &str,
    policy: PathPolicy,
) -> Result<PathBuf, PipelineError> {
    if let Err(e) = check_relative_path(relative) {
        match policy {
            PathPolicy::Strict => return Err(e),
            PathPolicy::Permissive => {
                warn!(file_path = relative, error = %e, "writing path that may escape the output root");
            }
        }
    }

    let target = root.join(relative);
    if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| PipelineError::filesystem(parent, e))?;
    }

    fs::write(&target, code.trim())
        .await
        .map_err(|e| PipelineError::filesystem(&target, e))?;
    Ok(target)
}
