//! Shared test utilities for blueprint integration tests.
//!
//! Provides [`ScriptedGateway`], an in-memory [`ModelGateway`] that answers
//! from a script and records every call it receives, so pipeline behaviour
//! can be asserted without a network.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use blueprint_core::gateway::{
    ChatRequest, FragmentStream, FunctionSchema, GatewayError, ModelGateway,
};

/// One call received by a [`ScriptedGateway`].
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCall {
    Complete(ChatRequest),
    Stream(ChatRequest),
    CallFunction(ChatRequest, FunctionSchema),
}

/// Scripted stand-in for a remote model.
///
/// - `stream` yields the configured plan fragments.
/// - `call_function` returns the configured file-list payload.
/// - `complete` answers with the code registered for the file path named in
///   the request's system message (longest match wins), or the default code.
#[derive(Debug)]
pub struct ScriptedGateway {
    plan_fragments: Vec<String>,
    stream_failure: Option<u16>,
    file_payload: Option<String>,
    code: HashMap<String, String>,
    failing_files: Vec<String>,
    default_code: String,
    calls: Mutex<Vec<RecordedCall>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl Default for ScriptedGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedGateway {
    /// A gateway with an empty plan, no function call, and `generated` as
    /// the code for every file.
    pub fn new() -> Self {
        Self {
            plan_fragments: Vec::new(),
            stream_failure: None,
            file_payload: None,
            code: HashMap::new(),
            failing_files: Vec::new(),
            default_code: "generated".to_string(),
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_plan_fragments<I, S>(mut self, fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.plan_fragments = fragments.into_iter().map(Into::into).collect();
        self
    }

    /// Make `stream` fail with the given HTTP status.
    pub fn with_stream_failure(mut self, status: u16) -> Self {
        self.stream_failure = Some(status);
        self
    }

    /// Raw JSON returned from `call_function`.
    pub fn with_file_payload(mut self, payload: impl Into<String>) -> Self {
        self.file_payload = Some(payload.into());
        self
    }

    /// Convenience: a well-formed `{"files": [...]}` payload.
    pub fn with_files(self, files: &[&str]) -> Self {
        let quoted: Vec<String> = files.iter().map(|f| format!("{f:?}")).collect();
        self.with_file_payload(format!("{{\"files\": [{}]}}", quoted.join(", ")))
    }

    pub fn with_code_for(mut self, file_path: impl Into<String>, code: impl Into<String>) -> Self {
        self.code.insert(file_path.into(), code.into());
        self
    }

    /// Make `complete` fail with HTTP 500 for `file_path`.
    pub fn with_failure_for(mut self, file_path: impl Into<String>) -> Self {
        self.failing_files.push(file_path.into());
        self
    }

    pub fn with_default_code(mut self, code: impl Into<String>) -> Self {
        self.default_code = code.into();
        self
    }

    /// Every call received, in order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().expect("calls mutex poisoned").clone()
    }

    /// Requests received by `complete`, in order.
    pub fn completion_requests(&self) -> Vec<ChatRequest> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                RecordedCall::Complete(req) => Some(req),
                _ => None,
            })
            .collect()
    }

    /// File path each `complete` call was scoped to, in call order.
    ///
    /// Only paths registered via [`Self::with_code_for`] or
    /// [`Self::with_failure_for`] can be recognised.
    pub fn generated_paths(&self) -> Vec<Option<String>> {
        self.completion_requests()
            .iter()
            .map(|req| self.scoped_path(req))
            .collect()
    }

    /// Highest number of `complete` calls that were ever running at once.
    pub fn max_concurrent_completions(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn record(&self, call: RecordedCall) {
        self.calls.lock().expect("calls mutex poisoned").push(call);
    }

    fn scoped_path(&self, request: &ChatRequest) -> Option<String> {
        let system = request.messages.first()?.content.as_str();
        self.code
            .keys()
            .chain(self.failing_files.iter())
            .filter(|path| system.contains(path.as_str()))
            .max_by_key(|path| path.len())
            .cloned()
    }
}

#[async_trait]
impl ModelGateway for ScriptedGateway {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &ChatRequest) -> Result<String, GatewayError> {
        self.record(RecordedCall::Complete(request.clone()));

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        // Give any concurrently polled call a chance to start.
        tokio::task::yield_now().await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let path = self.scoped_path(request);
        if let Some(ref p) = path {
            if self.failing_files.contains(p) {
                return Err(GatewayError::Status {
                    status: 500,
                    body: format!("scripted failure for {p}"),
                });
            }
        }

        Ok(path
            .and_then(|p| self.code.get(&p).cloned())
            .unwrap_or_else(|| self.default_code.clone()))
    }

    async fn stream(&self, request: &ChatRequest) -> Result<FragmentStream, GatewayError> {
        self.record(RecordedCall::Stream(request.clone()));

        if let Some(status) = self.stream_failure {
            return Err(GatewayError::Status {
                status,
                body: "scripted stream failure".to_string(),
            });
        }

        let items: Vec<Result<String, GatewayError>> =
            self.plan_fragments.iter().cloned().map(Ok).collect();
        Ok(Box::pin(futures::stream::iter(items)))
    }

    async fn call_function(
        &self,
        request: &ChatRequest,
        schema: &FunctionSchema,
    ) -> Result<Option<String>, GatewayError> {
        self.record(RecordedCall::CallFunction(request.clone(), schema.clone()));
        Ok(self.file_payload.clone())
    }
}
