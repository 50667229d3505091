//! Configuration file management for blueprint.
//!
//! Provides a TOML-based config file at `~/.config/blueprint/config.toml` and a
//! resolution chain: CLI flag > env var > config file > default.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use blueprint_core::{OpenAiGateway, PipelineConfig};

pub const ENV_API_KEY: &str = "OPENAI_API_KEY";
pub const ENV_MODEL: &str = "BLUEPRINT_MODEL";
pub const ENV_BASE_URL: &str = "BLUEPRINT_BASE_URL";
pub const ENV_OUTPUT_DIR: &str = "BLUEPRINT_OUTPUT_DIR";

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub model: ModelSection,
    #[serde(default)]
    pub output: OutputSection,
    #[serde(default)]
    pub auth: AuthSection,
}

#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,
}

#[derive(Default, PartialEq, Serialize, Deserialize)]
pub struct AuthSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl std::fmt::Debug for AuthSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSection")
            .field("api_key", &self.api_key.as_deref().map(redact))
            .finish()
    }
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the blueprint config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/blueprint` or
/// `~/.config/blueprint`, also on macOS.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("blueprint");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("blueprint")
}

/// Return the path to the blueprint config file.
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load and parse the config file. Returns an error if it does not exist.
pub fn load_config() -> Result<ConfigFile> {
    let path = config_path();
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    toml::from_str(&contents)
        .with_context(|| format!("failed to parse config file at {}", path.display()))
}

/// Like [`load_config`], but a missing file is `None` rather than an error.
/// A file that exists but does not parse is still an error.
pub fn load_config_if_present() -> Result<Option<ConfigFile>> {
    if !config_path().exists() {
        return Ok(None);
    }
    load_config().map(Some)
}

/// Serialize and write the config file, creating parent dirs as needed.
/// Sets file permissions to 0600 on Unix.
pub fn save_config(config: &ConfigFile) -> Result<PathBuf> {
    let path = config_path();
    let dir = config_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create config directory {}", dir.display()))?;

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(&path, &contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;

    // Owner read/write only: the file may hold an API key.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(&path, perms)
            .with_context(|| format!("failed to set permissions on {}", path.display()))?;
    }

    Ok(path)
}

/// Mask a secret for display, keeping a short prefix and suffix when the
/// secret is long enough that they reveal nothing useful.
pub fn redact(secret: &str) -> String {
    if secret.is_empty() {
        return "<unset>".to_string();
    }
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() < 12 {
        return "<redacted>".to_string();
    }
    let head: String = chars[..3].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Values given on the command line; `None` means "not given".
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub log_dir: Option<PathBuf>,
}

/// Fully resolved configuration, ready for use.
#[derive(Clone, PartialEq)]
pub struct BlueprintConfig {
    pub model: String,
    pub base_url: String,
    pub output_dir: PathBuf,
    pub log_dir: PathBuf,
    /// Empty when no key was found anywhere.
    pub api_key: String,
}

impl std::fmt::Debug for BlueprintConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlueprintConfig")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("output_dir", &self.output_dir)
            .field("log_dir", &self.log_dir)
            .field("api_key", &redact(&self.api_key))
            .finish()
    }
}

impl BlueprintConfig {
    /// Resolve configuration using the chain: CLI flag > env var > config file > default.
    ///
    /// - model: `--model` > `BLUEPRINT_MODEL` > `model.name` > `gpt-4`
    /// - base URL: `--base-url` > `BLUEPRINT_BASE_URL` > `model.base_url` > OpenAI
    /// - output dir: `--output-dir` > `BLUEPRINT_OUTPUT_DIR` > `output.dir` > `generated`
    /// - log dir: `--log-dir` > `output.log_dir` > `logs`
    /// - API key: `OPENAI_API_KEY` > `auth.api_key` > empty
    pub fn resolve(cli: &CliOverrides) -> Result<Self> {
        let file_config = load_config_if_present()?;
        Ok(Self::resolve_with(cli, file_config.as_ref()))
    }

    /// Resolution against an already loaded (or absent) config file.
    pub fn resolve_with(cli: &CliOverrides, file: Option<&ConfigFile>) -> Self {
        let env = |key: &str| std::env::var(key).ok().filter(|v| !v.is_empty());

        let model = cli
            .model
            .clone()
            .or_else(|| env(ENV_MODEL))
            .or_else(|| file.and_then(|f| f.model.name.clone()))
            .unwrap_or_else(|| PipelineConfig::DEFAULT_MODEL.to_string());

        let base_url = cli
            .base_url
            .clone()
            .or_else(|| env(ENV_BASE_URL))
            .or_else(|| file.and_then(|f| f.model.base_url.clone()))
            .unwrap_or_else(|| OpenAiGateway::DEFAULT_BASE_URL.to_string());

        let output_dir = cli
            .output_dir
            .clone()
            .or_else(|| env(ENV_OUTPUT_DIR).map(PathBuf::from))
            .or_else(|| file.and_then(|f| f.output.dir.clone()))
            .unwrap_or_else(|| PathBuf::from(PipelineConfig::DEFAULT_OUTPUT_ROOT));

        let log_dir = cli
            .log_dir
            .clone()
            .or_else(|| file.and_then(|f| f.output.log_dir.clone()))
            .unwrap_or_else(|| PathBuf::from(PipelineConfig::DEFAULT_LOG_DIR));

        let api_key = env(ENV_API_KEY)
            .or_else(|| file.and_then(|f| f.auth.api_key.clone()))
            .unwrap_or_default();

        Self {
            model,
            base_url,
            output_dir,
            log_dir,
            api_key,
        }
    }
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------
