//! Core library for blueprint: turns an application description into a tree
//! of generated source files with three model calls.
//!
//! ```text
//! prompt --> plan (stream) --> logs/plan.md
//!              |
//!              v
//!        file list (function call)
//!              |
//!              v
//!   for each path: code (completion) --> <output root>/<path>
//! ```

pub mod codegen;
pub mod error;
pub mod extract;
pub mod fence;
pub mod gateway;
pub mod output;
pub mod pipeline;
pub mod plan;
pub mod prompts;

pub use error::{ErrorKind, PipelineError};
pub use extract::FileListPolicy;
pub use gateway::{ModelGateway, OpenAiGateway};
pub use output::PathPolicy;
pub use pipeline::{PipelineConfig, PipelineReport, run_pipeline, spawn_pipeline};
pub use plan::{NoopObserver, PlanObserver};
