use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::types::{ContentBlock, SchemaSpec, ThreadRun, ToolOutput};

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("API error: {0}")]
    Api(String),

    #[error("schema violation: {0}")]
    Schema(String),
}

pub type Result<T> = std::result::Result<T, LlmError>;

/// Single-shot structured calls: one system prompt, one set of user blocks,
/// one JSON document back that matches the supplied schema.
#[async_trait]
pub trait StructuredModel: Send + Sync {
    async fn respond(
        &self,
        system: &str,
        user: Vec<ContentBlock>,
        schema: &SchemaSpec,
    ) -> Result<Value>;
}

/// The assistant-thread protocol: durable conversations driven by named
/// assistants, with run polling and tool-output submission.
#[async_trait]
pub trait AssistantThreads: Send + Sync {
    async fn create_thread(&self) -> Result<String>;
    async fn post_user_message(&self, thread_id: &str, text: &str) -> Result<()>;
    async fn start_run(&self, thread_id: &str, assistant_id: &str) -> Result<ThreadRun>;
    async fn poll_run(&self, thread_id: &str, run_id: &str) -> Result<ThreadRun>;
    async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: Vec<ToolOutput>,
    ) -> Result<()>;
    /// Text of the most recent assistant message on the thread.
    async fn latest_message(&self, thread_id: &str) -> Result<String>;
}
