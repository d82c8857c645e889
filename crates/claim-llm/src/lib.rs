//! LLM capability used by the claim pipeline.
//!
//! Two modes are exposed as traits: single-shot structured calls with a JSON
//! schema contract ([`StructuredModel`]) and long-lived assistant threads
//! ([`AssistantThreads`]). [`OpenAiClient`] implements both against an
//! OpenAI-compatible HTTP endpoint.

mod capability;
mod openai;
mod types;

pub use capability::{AssistantThreads, LlmError, Result, StructuredModel};
pub use openai::OpenAiClient;
pub use types::{ContentBlock, PendingToolCall, RunStatus, SchemaSpec, ThreadRun, ToolOutput};
