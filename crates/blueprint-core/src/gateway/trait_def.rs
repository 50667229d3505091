//! The `ModelGateway` trait -- the adapter interface for model services.
//!
//! The trait is object-safe so a single handle can be constructed at startup
//! and passed around as `&dyn ModelGateway` or `Arc<dyn ModelGateway>`.

use async_trait::async_trait;

use super::types::{ChatRequest, FragmentStream, FunctionSchema, GatewayError};

/// Capability to issue chat-completion requests against a remote model.
///
/// One request shape, three call modes. Implementations never retry: any
/// transport, auth, or rate-limit failure is returned to the caller as-is.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    /// Human-readable name for this gateway (e.g. "openai").
    fn name(&self) -> &str;

    /// Send the request and return the full text of the first choice.
    async fn complete(&self, request: &ChatRequest) -> Result<String, GatewayError>;

    /// Send the request in streaming mode.
    ///
    /// The returned stream yields text fragments in emission order and ends
    /// when the service ends the stream. It cannot be restarted.
    async fn stream(&self, request: &ChatRequest) -> Result<FragmentStream, GatewayError>;

    /// Send the request constrained to `schema` and return the raw JSON
    /// arguments of the function call.
    ///
    /// Returns `Ok(None)` when the model answered without calling the
    /// function.
    async fn call_function(
        &self,
        request: &ChatRequest,
        schema: &FunctionSchema,
    ) -> Result<Option<String>, GatewayError>;
}

// Compile-time assertion: ModelGateway must be object-safe.
const _: () = {
    fn _assert_object_safe(_: &dyn ModelGateway) {}
};

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    /// Echoes the last user message back in every mode.
    struct EchoGateway;

    #[async_trait]
    impl ModelGateway for EchoGateway {
        fn name(&self) -> &str {
            "echo"
        }

        async fn complete(&self, request: &ChatRequest) -> Result<String, GatewayError> {
            Ok(request
                .messages
                .last()
                .map(|m| m.content.clone())
                .unwrap_or_default())
        }

        async fn stream(&self, request: &ChatRequest) -> Result<FragmentStream, GatewayError> {
            let text = self.complete(request).await?;
            let words: Vec<Result<String, GatewayError>> =
                text.split_inclusive(' ').map(|w| Ok(w.to_string())).collect();
            Ok(Box::pin(futures::stream::iter(words)))
        }

        async fn call_function(
            &self,
            _request: &ChatRequest,
            _schema: &FunctionSchema,
        ) -> Result<Option<String>, GatewayError> {
            Ok(None)
        }
    }

    #[test]
    fn gateway_is_object_safe() {
        let gateway: Box<dyn ModelGateway> = Box::new(EchoGateway);
        assert_eq!(gateway.name(), "echo");
    }

    #[tokio::test]
    async fn echo_gateway_streams_words() {
        let gateway: Box<dyn ModelGateway> = Box::new(EchoGateway);
        let req = ChatRequest::new("m", 0.0).user("one two three");

        let fragments: Vec<String> = gateway
            .stream(&req)
            .await
            .unwrap()
            .map(|f| f.unwrap())
            .collect()
            .await;
        assert_eq!(fragments, vec!["one ", "two ", "three"]);
    }

    #[tokio::test]
    async fn echo_gateway_declines_function_call() {
        let gateway = EchoGateway;
        let schema = FunctionSchema {
            name: "f".to_string(),
            description: String::new(),
            parameters: serde_json::json!({}),
        };
        let payload = gateway
            .call_function(&ChatRequest::new("m", 0.0), &schema)
            .await
            .unwrap();
        assert!(payload.is_none());
    }
}
