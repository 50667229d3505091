//! File-list extraction: one forced function call, decoded by the caller.

use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use crate::error::PipelineError;
use crate::gateway::{ChatRequest, FunctionSchema, ModelGateway};
use crate::prompts;

/// Sampling temperature for the extraction request.
pub const EXTRACT_TEMPERATURE: f32 = 0.0;

/// How to treat an absent or undecodable file-list payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileListPolicy {
    /// Fail the run with [`PipelineError::MalformedPayload`].
    #[default]
    Strict,
    /// Log a warning and generate zero files.
    Lenient,
}

/// Schema forcing the model to answer with `{"files": [string, ...]}`.
pub fn file_list_schema() -> FunctionSchema {
    FunctionSchema {
        name: prompts::FILE_LIST_FUNCTION.to_string(),
        description: "Extract list of file paths that should be generated for the application."
            .to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "files": {
                    "type": "array",
                    "description": "List of file paths the app will need.",
                    "items": { "type": "string" }
                }
            },
            "required": ["files"]
        }),
    }
}

/// Build the extraction request.
pub fn extract_request(prompt: &str, plan: &str, model: &str) -> ChatRequest {
    ChatRequest::new(model, EXTRACT_TEMPERATURE)
        .system(prompts::EXTRACT_SYSTEM_PROMPT)
        .user(format!("Prompt:\n{prompt}"))
        .user(format!("Plan:\n{plan}"))
}

/// Ask the model for the minimal file list.
///
/// Returns the raw JSON arguments, unvalidated; `None` if the model did not
/// call the function.
pub async fn extract_file_paths(
    gateway: &dyn ModelGateway,
    prompt: &str,
    plan: &str,
    model: &str,
) -> Result<Option<String>, PipelineError> {
    let request = extract_request(prompt, plan, model);
    Ok(gateway.call_function(&request, &file_list_schema()).await?)
}

#[derive(Debug, Deserialize)]
struct FileListPayload {
    files: Vec<String>,
}

/// Decode a raw extraction payload into an ordered list of paths.
///
/// Order is preserved. Duplicates and unsafe paths pass through untouched.
pub fn parse_file_list(
    payload: Option<&str>,
    policy: FileListPolicy,
) -> Result<Vec<String>, PipelineError> {
    let decoded = match payload {
        None => Err("model did not return a file list".to_string()),
        Some(raw) => serde_json::from_str::<FileListPayload>(raw)
            .map(|p| p.files)
            .map_err(|e| e.to_string()),
    };

    match (decoded, policy) {
        (Ok(files), _) => Ok(files),
        (Err(reason), FileListPolicy::Lenient) => {
            warn!(reason = %reason, "treating malformed file-list payload as empty");
            Ok(Vec::new())
        }
        (Err(reason), FileListPolicy::Strict) => Err(PipelineError::MalformedPayload {
            reason,
            payload: payload.map(str::to_string),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_requires_files_array() {
        let schema = file_list_schema();
        assert_eq!(schema.name, "file_paths");
        assert_eq!(schema.parameters["required"], json!(["files"]));
        assert_eq!(schema.parameters["properties"]["files"]["type"], "array");
        assert_eq!(schema.parameters["properties"]["files"]["items"]["type"], "string");
    }

    #[test]
    fn request_has_prompt_then_plan() {
        let req = extract_request("an app", "# Plan", "gpt-4");
        assert_eq!(req.temperature, 0.0);
        assert_eq!(req.messages.len(), 3);
        assert_eq!(req.messages[1].content, "Prompt:\nan app");
        assert_eq!(req.messages[2].content, "Plan:\n# Plan");
    }

    #[test]
    fn parses_files_in_order() {
        let files = parse_file_list(
            Some(r#"{"files": ["a.txt", "sub/b.txt"]}"#),
            FileListPolicy::Strict,
        )
        .unwrap();
        assert_eq!(files, vec!["a.txt", "sub/b.txt"]);
    }

    #[test]
    fn keeps_duplicates_and_unsafe_paths() {
        let files = parse_file_list(
            Some(r#"{"files": ["a", "a", "../escape"]}"#),
            FileListPolicy::Strict,
        )
        .unwrap();
        assert_eq!(files, vec!["a", "a", "../escape"]);
    }

    #[test]
    fn empty_array_is_zero_files() {
        let files = parse_file_list(Some(r#"{"files": []}"#), FileListPolicy::Strict).unwrap();
        assert!(files.is_empty());
    }

    #[test]
    fn strict_rejects_missing_payload() {
        let err = parse_file_list(None, FileListPolicy::Strict).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::MalformedPayload { payload: None, .. }
        ));
    }

    #[test]
    fn strict_rejects_missing_key_and_keeps_raw_payload() {
        let err = parse_file_list(Some(r#"{"paths": ["a"]}"#), FileListPolicy::Strict).unwrap_err();
        match err {
            PipelineError::MalformedPayload { reason, payload } => {
                assert!(reason.contains("files"), "reason: {reason}");
                assert_eq!(payload.as_deref(), Some(r#"{"paths": ["a"]}"#));
            }
            other => panic!("expected MalformedPayload, got {other:?}"),
        }
    }

    #[test]
    fn strict_rejects_invalid_json() {
        let err = parse_file_list(Some("{files: oops"), FileListPolicy::Strict).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::MalformedPayload);
    }

    #[test]
    fn lenient_treats_malformed_as_empty() {
        assert!(parse_file_list(None, FileListPolicy::Lenient).unwrap().is_empty());
        assert!(
            parse_file_list(Some("not json"), FileListPolicy::Lenient)
                .unwrap()
                .is_empty()
        );
    }
}
