//! `blueprint run`: resolve the prompt and configuration, then drive one
//! pipeline run with plan fragments echoed to stdout.

use std::io::{BufRead, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tracing::debug;

use blueprint_core::prompts::DEFAULT_PROMPT;
use blueprint_core::{
    FileListPolicy, ModelGateway, OpenAiGateway, PathPolicy, PipelineConfig, PipelineReport,
    PlanObserver, run_pipeline,
};

use crate::config::{BlueprintConfig, CliOverrides};

#[derive(Debug, Args)]
pub struct RunArgs {
    /// App description (defaults to a login/register page)
    #[arg(long, conflicts_with = "interactive")]
    pub prompt: Option<String>,
    /// Read the app description from stdin
    #[arg(long)]
    pub interactive: bool,
    /// Directory for generated files; erased at the start of every run
    #[arg(long)]
    pub output_dir: Option<PathBuf>,
    /// Directory that receives plan.md
    #[arg(long)]
    pub log_dir: Option<PathBuf>,
    /// Model identifier
    #[arg(long)]
    pub model: Option<String>,
    /// OpenAI-compatible API base URL
    #[arg(long)]
    pub base_url: Option<String>,
    /// Refuse absolute paths and `..` segments in the file list
    #[arg(long)]
    pub strict_paths: bool,
    /// Treat a missing or malformed file list as empty instead of failing
    #[arg(long)]
    pub lenient_file_list: bool,
}

impl RunArgs {
    pub fn overrides(&self) -> CliOverrides {
        CliOverrides {
            model: self.model.clone(),
            base_url: self.base_url.clone(),
            output_dir: self.output_dir.clone(),
            log_dir: self.log_dir.clone(),
        }
    }

    fn pipeline_config(&self, resolved: &BlueprintConfig) -> PipelineConfig {
        PipelineConfig {
            model: resolved.model.clone(),
            output_root: resolved.output_dir.clone(),
            log_dir: resolved.log_dir.clone(),
            path_policy: if self.strict_paths {
                PathPolicy::Strict
            } else {
                PathPolicy::Permissive
            },
            file_list_policy: if self.lenient_file_list {
                FileListPolicy::Lenient
            } else {
                FileListPolicy::Strict
            },
        }
    }
}

// -----------------------------------------------------------------------
// Plan echo
// -----------------------------------------------------------------------

/// Writes every plan fragment to `out` as it arrives.
pub struct PrintObserver<W> {
    out: W,
}

impl<W: Write> PrintObserver<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write> PlanObserver for PrintObserver<W> {
    fn on_fragment(&mut self, fragment: &str) {
        // A closed stdout must not abort the run; the plan is still logged.
        if let Err(e) = self
            .out
            .write_all(fragment.as_bytes())
            .and_then(|()| self.out.flush())
        {
            debug!(error = %e, "failed to echo plan fragment");
        }
    }
}

// -----------------------------------------------------------------------
// Prompt
// -----------------------------------------------------------------------

/// Pick the prompt: `--prompt`, else one line from `input` when interactive,
/// else the built-in default. A blank interactive answer also means default.
pub fn resolve_prompt(
    explicit: Option<&str>,
    interactive: bool,
    input: &mut dyn BufRead,
    out: &mut dyn Write,
) -> Result<String> {
    if let Some(prompt) = explicit.map(str::trim).filter(|p| !p.is_empty()) {
        return Ok(prompt.to_string());
    }
    if !interactive {
        return Ok(DEFAULT_PROMPT.to_string());
    }

    write!(out, "Describe the app to generate: ").context("failed to write prompt")?;
    out.flush().context("failed to flush stdout")?;

    let mut line = String::new();
    input
        .read_line(&mut line)
        .context("failed to read prompt from stdin")?;

    let line = line.trim();
    if line.is_empty() {
        Ok(DEFAULT_PROMPT.to_string())
    } else {
        Ok(line.to_string())
    }
}

// -----------------------------------------------------------------------
// Command
// -----------------------------------------------------------------------

/// Execute `blueprint run`.
pub async fn run_run(args: RunArgs) -> Result<()> {
    let resolved = BlueprintConfig::resolve(&args.overrides())?;
    debug!(config = ?resolved, "resolved configuration");

    let prompt = {
        let stdin = std::io::stdin();
        let stdout = std::io::stdout();
        resolve_prompt(
            args.prompt.as_deref(),
            args.interactive,
            &mut stdin.lock(),
            &mut stdout.lock(),
        )?
    };

    let gateway = OpenAiGateway::with_base_url(&resolved.api_key, &resolved.base_url)
        .context("failed to build HTTP client")?;
    let config = args.pipeline_config(&resolved);

    let mut stdout = std::io::stdout();
    execute(&gateway, &config, &prompt, &mut stdout).await?;
    Ok(())
}

/// Run the pipeline, echoing the plan and a closing summary to `out`.
pub async fn execute<W: Write + Send>(
    gateway: &dyn ModelGateway,
    config: &PipelineConfig,
    prompt: &str,
    out: &mut W,
) -> Result<PipelineReport> {
    let report = {
        let mut observer = PrintObserver::new(&mut *out);
        run_pipeline(gateway, config, prompt, &mut observer).await?
    };

    writeln!(out)?;
    writeln!(out)?;
    writeln!(
        out,
        "Generated {} file(s) in {} ({:.1}s)",
        report.files.len(),
        config.output_root.display(),
        report.elapsed().num_milliseconds() as f64 / 1000.0,
    )?;
    for path in &report.written {
        writeln!(out, "  {}", path.display())?;
    }
    if report.remove_failed > 0 {
        writeln!(
            out,
            "Warning: {} old entr{} in {} could not be removed",
            report.remove_failed,
            if report.remove_failed == 1 { "y" } else { "ies" },
            config.output_root.display(),
        )?;
    }
    writeln!(out, "Plan saved to {}", report.plan_path.display())?;

    Ok(report)
}
