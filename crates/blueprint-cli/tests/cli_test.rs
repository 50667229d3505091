//! Integration tests for the `blueprint` binary.
//!
//! Every invocation runs with `HOME` and `XDG_CONFIG_HOME` pointed at a temp
//! directory and the blueprint env vars cleared, so the user's real config is
//! never read or written.

use std::net::TcpListener;
use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

fn blueprint(home: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_blueprint"))
        .args(args)
        .env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join(".config"))
        .env_remove("OPENAI_API_KEY")
        .env_remove("BLUEPRINT_MODEL")
        .env_remove("BLUEPRINT_BASE_URL")
        .env_remove("BLUEPRINT_OUTPUT_DIR")
        .env("RUST_LOG", "warn")
        .current_dir(home)
        .output()
        .expect("failed to launch blueprint binary")
}

fn stdout(out: &Output) -> String {
    String::from_utf8_lossy(&out.stdout).into_owned()
}

fn stderr(out: &Output) -> String {
    String::from_utf8_lossy(&out.stderr).into_owned()
}

/// A loopback URL that refuses connections.
fn closed_endpoint() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{port}/v1")
}

#[test]
fn init_writes_config_and_refuses_to_overwrite() {
    let home = TempDir::new().unwrap();
    let config_file = home.path().join(".config/blueprint/config.toml");

    let out = blueprint(home.path(), &["init", "--model", "gpt-4o"]);
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    assert!(stdout(&out).contains("Config written to"));

    let contents = std::fs::read_to_string(&config_file).unwrap();
    assert!(contents.contains("gpt-4o"), "config: {contents}");

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(&config_file).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    let again = blueprint(home.path(), &["init"]);
    assert_eq!(again.status.code(), Some(1));
    assert!(stderr(&again).contains("already exists"));

    let forced = blueprint(home.path(), &["init", "--model", "gpt-4", "--force"]);
    assert!(forced.status.success(), "stderr: {}", stderr(&forced));
    let contents = std::fs::read_to_string(&config_file).unwrap();
    assert!(!contents.contains("gpt-4o"), "config: {contents}");
}

#[test]
fn config_shows_file_values_and_redacts_key() {
    let home = TempDir::new().unwrap();
    let dir = home.path().join(".config/blueprint");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(
        dir.join("config.toml"),
        "[model]\nname = \"file-model\"\n\n[auth]\napi_key = \"sk-super-secret-0123\"\n",
    )
    .unwrap();

    let out = blueprint(home.path(), &["config"]);
    assert!(out.status.success(), "stderr: {}", stderr(&out));

    let printed = stdout(&out);
    assert!(printed.contains("file-model"), "stdout: {printed}");
    assert!(printed.contains("generated"), "stdout: {printed}");
    assert!(!printed.contains("super-secret"), "key leaked: {printed}");
    assert!(printed.contains("sk-...0123"), "stdout: {printed}");
}

#[test]
fn malformed_config_file_is_a_usage_error() {
    let home = TempDir::new().unwrap();
    let dir = home.path().join(".config/blueprint");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("config.toml"), "[model\nname = ").unwrap();

    let out = blueprint(home.path(), &["config"]);
    assert_eq!(out.status.code(), Some(1));
    assert!(stderr(&out).contains("failed to parse config file"));
}

#[test]
fn unreachable_endpoint_exits_with_transport_code() {
    let home = TempDir::new().unwrap();
    let output_dir = home.path().join("out");
    std::fs::create_dir_all(&output_dir).unwrap();
    std::fs::write(output_dir.join("old.txt"), "stale").unwrap();

    let base_url = closed_endpoint();
    let out = blueprint(
        home.path(),
        &[
            "run",
            "--prompt",
            "a todo app",
            "--base-url",
            &base_url,
            "--output-dir",
            output_dir.to_str().unwrap(),
        ],
    );

    assert_eq!(out.status.code(), Some(2), "stderr: {}", stderr(&out));
    assert!(stderr(&out).contains("error: "), "stderr: {}", stderr(&out));
    // Reset runs before the first model call.
    assert!(!output_dir.join("old.txt").exists());
    assert!(output_dir.is_dir());
}

#[test]
fn conflicting_prompt_flags_are_rejected() {
    let home = TempDir::new().unwrap();
    let out = blueprint(home.path(), &["run", "--prompt", "x", "--interactive"]);
    assert!(!out.status.success());
}
