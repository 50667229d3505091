mod config;
mod run_cmd;
#[cfg(test)]
mod test_util;

use std::process::ExitCode;

use clap::{Parser, Subcommand};

use blueprint_core::{ErrorKind, PipelineConfig, PipelineError};

use config::{BlueprintConfig, CliOverrides};

#[derive(Parser)]
#[command(
    name = "blueprint",
    version,
    about = "Turn an app description into generated source files"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Plan, list, and generate every file for one app description
    Run(run_cmd::RunArgs),
    /// Write a blueprint config file
    Init {
        /// Model identifier to store
        #[arg(long, default_value = PipelineConfig::DEFAULT_MODEL)]
        model: String,
        /// OpenAI-compatible API base URL to store
        #[arg(long)]
        base_url: Option<String>,
        /// Output directory to store
        #[arg(long)]
        output_dir: Option<std::path::PathBuf>,
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Print the resolved configuration (API key redacted)
    Config,
}

/// Execute the `blueprint init` command: write config file.
fn cmd_init(
    model: &str,
    base_url: Option<&str>,
    output_dir: Option<&std::path::Path>,
    force: bool,
) -> anyhow::Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let cfg = config::ConfigFile {
        model: config::ModelSection {
            name: Some(model.to_string()),
            base_url: base_url.map(str::to_string),
        },
        output: config::OutputSection {
            dir: output_dir.map(std::path::Path::to_path_buf),
            log_dir: None,
        },
        auth: config::AuthSection::default(),
    };

    let path = config::save_config(&cfg)?;

    println!("Config written to {}", path.display());
    println!("  model.name = {model}");
    if let Some(url) = base_url {
        println!("  model.base_url = {url}");
    }
    if let Some(dir) = output_dir {
        println!("  output.dir = {}", dir.display());
    }
    println!();
    println!(
        "Next: export {} or add auth.api_key to the config file.",
        config::ENV_API_KEY
    );

    Ok(())
}

/// Execute the `blueprint config` command: print the resolved configuration.
fn cmd_config() -> anyhow::Result<()> {
    let resolved = BlueprintConfig::resolve(&CliOverrides::default())?;
    let path = config::config_path();

    println!(
        "config file: {}{}",
        path.display(),
        if path.exists() { "" } else { " (not found)" }
    );
    println!("model      = {}", resolved.model);
    println!("base_url   = {}", resolved.base_url);
    println!("output_dir = {}", resolved.output_dir.display());
    println!("log_dir    = {}", resolved.log_dir.display());
    println!("api_key    = {}", config::redact(&resolved.api_key));
    Ok(())
}

/// Map a failed command to the process exit code.
///
/// Pipeline failures get a code per kind; everything else (usage, config,
/// client setup) is 1.
fn exit_code(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<PipelineError>().map(PipelineError::kind) {
        Some(ErrorKind::TransportFailure) => 2,
        Some(ErrorKind::MalformedPayload) => 3,
        Some(ErrorKind::FilesystemFailure) => 4,
        Some(ErrorKind::UnsafePath) => 5,
        None => 1,
    }
}

async fn dispatch(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Run(args) => run_cmd::run_run(args).await,
        Commands::Init {
            model,
            base_url,
            output_dir,
            force,
        } => cmd_init(&model, base_url.as_deref(), output_dir.as_deref(), force),
        Commands::Config => cmd_config(),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match dispatch(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(exit_code(&e))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use anyhow::Context;
    use blueprint_core::gateway::GatewayError;

    #[test]
    fn exit_codes_follow_error_kind() {
        let transport: anyhow::Error = PipelineError::from(GatewayError::Status {
            status: 401,
            body: "bad key".to_string(),
        })
        .into();
        assert_eq!(exit_code(&transport), 2);

        let malformed: anyhow::Error = PipelineError::MalformedPayload {
            reason: "missing field `files`".to_string(),
            payload: Some("{}".to_string()),
        }
        .into();
        assert_eq!(exit_code(&malformed), 3);

        let fs: anyhow::Error = PipelineError::Filesystem {
            path: PathBuf::from("generated"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        }
        .into();
        assert_eq!(exit_code(&fs), 4);

        let unsafe_path: anyhow::Error = PipelineError::UnsafePath {
            path: "../x".to_string(),
            reason: "parent directory segment".to_string(),
        }
        .into();
        assert_eq!(exit_code(&unsafe_path), 5);

        assert_eq!(exit_code(&anyhow::anyhow!("bad config")), 1);
    }

    #[test]
    fn exit_code_sees_through_context() {
        let err = Err::<(), _>(PipelineError::UnsafePath {
            path: "/etc/passwd".to_string(),
            reason: "absolute path".to_string(),
        })
        .context("run failed")
        .unwrap_err();
        assert_eq!(exit_code(&err), 5);
    }

    #[test]
    fn parses_run_flags() {
        let cli = Cli::try_parse_from([
            "blueprint",
            "run",
            "--prompt",
            "a todo app",
            "--output-dir",
            "out",
            "--log-dir",
            "l",
            "--model",
            "gpt-4o",
            "--base-url",
            "http://localhost:8080/v1",
            "--strict-paths",
            "--lenient-file-list",
        ])
        .unwrap();

        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.prompt.as_deref(), Some("a todo app"));
        assert_eq!(args.output_dir, Some(PathBuf::from("out")));
        assert_eq!(args.log_dir, Some(PathBuf::from("l")));
        assert_eq!(args.model.as_deref(), Some("gpt-4o"));
        assert_eq!(args.base_url.as_deref(), Some("http://localhost:8080/v1"));
        assert!(args.strict_paths);
        assert!(args.lenient_file_list);
        assert!(!args.interactive);
    }

    #[test]
    fn prompt_and_interactive_conflict() {
        let result =
            Cli::try_parse_from(["blueprint", "run", "--prompt", "x", "--interactive"]);
        assert!(result.is_err());
    }

    #[test]
    fn init_defaults_model() {
        let cli = Cli::try_parse_from(["blueprint", "init"]).unwrap();
        let Commands::Init { model, force, .. } = cli.command else {
            panic!("expected init");
        };
        assert_eq!(model, "gpt-4");
        assert!(!force);
    }
}
