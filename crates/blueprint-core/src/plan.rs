//! Plan generation: one streaming request, observed and folded by the caller.
//!
//! [`generate_plan`] only produces the fragment stream. Printing and
//! accumulation are separate concerns: [`collect_plan`] hands every fragment
//! to a [`PlanObserver`] and appends it to the result.

use futures::StreamExt;
use tracing::debug;

use crate::error::PipelineError;
use crate::gateway::{ChatRequest, FragmentStream, ModelGateway};
use crate::prompts;

/// Sampling temperature for the planning request.
pub const PLAN_TEMPERATURE: f32 = 0.7;

/// Sink that sees each plan fragment as it arrives.
pub trait PlanObserver {
    fn on_fragment(&mut self, fragment: &str);
}

impl<F: FnMut(&str)> PlanObserver for F {
    fn on_fragment(&mut self, fragment: &str) {
        self(fragment)
    }
}

/// Observer that ignores every fragment.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl PlanObserver for NoopObserver {
    fn on_fragment(&mut self, _fragment: &str) {}
}

/// Build the planning request for `prompt`.
pub fn plan_request(prompt: &str, model: &str) -> ChatRequest {
    ChatRequest::new(model, PLAN_TEMPERATURE)
        .system(prompts::PLAN_SYSTEM_PROMPT)
        .user(format!("The app prompt is: {prompt}"))
}

/// Start the streaming planning request.
pub async fn generate_plan(
    gateway: &dyn ModelGateway,
    prompt: &str,
    model: &str,
) -> Result<FragmentStream, PipelineError> {
    let request = plan_request(prompt, model);
    Ok(gateway.stream(&request).await?)
}

/// Drain a plan stream, observing each fragment, and return the full text.
///
/// An empty stream yields an empty plan. The first failed fragment aborts
/// collection.
pub async fn collect_plan(
    mut stream: FragmentStream,
    observer: &mut (dyn PlanObserver + Send),
) -> Result<String, PipelineError> {
    let mut plan = String::new();
    let mut fragments = 0usize;

    while let Some(fragment) = stream.next().await {
        let fragment = fragment?;
        observer.on_fragment(&fragment);
        plan.push_str(&fragment);
        fragments += 1;
    }

    debug!(fragments, bytes = plan.len(), "plan stream finished");
    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{GatewayError, Role};

    fn fragments(parts: &[&str]) -> FragmentStream {
        let items: Vec<Result<String, GatewayError>> =
            parts.iter().map(|p| Ok(p.to_string())).collect();
        Box::pin(futures::stream::iter(items))
    }

    #[test]
    fn request_shape() {
        let req = plan_request("a todo app", "gpt-4");
        assert_eq!(req.model, "gpt-4");
        assert_eq!(req.temperature, PLAN_TEMPERATURE);
        assert_eq!(req.messages.len(), 2);
        assert_eq!(req.messages[0].role, Role::System);
        assert_eq!(req.messages[1].content, "The app prompt is: a todo app");
    }

    #[tokio::test]
    async fn collect_concatenates_in_order_and_observes_each() {
        let mut seen = Vec::new();
        let mut observer = |f: &str| seen.push(f.to_string());

        let plan = collect_plan(fragments(&["Hello", ", ", "world"]), &mut observer)
            .await
            .unwrap();

        assert_eq!(plan, "Hello, world");
        assert_eq!(seen, vec!["Hello", ", ", "world"]);
    }

    #[tokio::test]
    async fn empty_stream_is_empty_plan() {
        let plan = collect_plan(fragments(&[]), &mut NoopObserver).await.unwrap();
        assert_eq!(plan, "");
    }

    #[tokio::test]
    async fn failed_fragment_aborts() {
        let items: Vec<Result<String, GatewayError>> = vec![
            Ok("part".to_string()),
            Err(GatewayError::Decode("connection reset".to_string())),
            Ok("never".to_string()),
        ];
        let mut seen = Vec::new();
        let mut observer = |f: &str| seen.push(f.to_string());

        let err = collect_plan(Box::pin(futures::stream::iter(items)), &mut observer)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), crate::ErrorKind::TransportFailure);
        assert_eq!(seen, vec!["part"]);
    }
}
