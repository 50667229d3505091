//! Model gateway: the single seam between the pipeline and the remote model.
//!
//! ```text
//! Orchestrator
//!     |
//!     v
//! &dyn ModelGateway
//!     |-- complete(req)             --> String
//!     |-- stream(req)               --> Stream<Result<String>>
//!     `-- call_function(req, fn)    --> Option<String> (raw JSON args)
//! ```
//!
//! [`OpenAiGateway`] is the production implementation; tests substitute a
//! scripted gateway.

pub mod openai;
pub mod trait_def;
pub mod types;

pub use openai::OpenAiGateway;
pub use trait_def::ModelGateway;
pub use types::{ChatMessage, ChatRequest, FragmentStream, FunctionSchema, GatewayError, Role};
