//! Per-file code generation.

use crate::error::PipelineError;
use crate::fence::strip_code_fence;
use crate::gateway::{ChatRequest, ModelGateway};
use crate::prompts;

/// Sampling temperature for code generation.
pub const CODE_TEMPERATURE: f32 = 0.7;

/// Build the request that generates `file_path`.
///
/// Message order: scoping system instruction, the plan, the prompt, then the
/// closing constraints.
pub fn code_request(prompt: &str, plan: &str, file_path: &str, model: &str) -> ChatRequest {
    ChatRequest::new(model, CODE_TEMPERATURE)
        .system(prompts::code_system_prompt(file_path))
        .user(format!(" the plan we have agreed on is: {plan} "))
        .user(format!(" the app prompt is: {prompt} "))
        .user(prompts::code_final_instruction(file_path))
}

/// Generate the contents of one file.
///
/// The response is trimmed and, if the model wrapped it in a markdown fence
/// anyway, reduced to the first fenced block.
pub async fn generate_code_for_file(
    gateway: &dyn ModelGateway,
    prompt: &str,
    plan: &str,
    file_path: &str,
    model: &str,
) -> Result<String, PipelineError> {
    let request = code_request(prompt, plan, file_path, model);
    let raw = gateway.complete(&request).await?;
    Ok(strip_code_fence(&raw))
}
