use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One block of user content for a structured call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    InputText { text: String },
    InputImage { image_url: String },
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        Self::InputText { text: text.into() }
    }

    pub fn image(image_url: impl Into<String>) -> Self {
        Self::InputImage {
            image_url: image_url.into(),
        }
    }
}

/// A named JSON schema the model must answer with, sent strict.
#[derive(Debug, Clone)]
pub struct SchemaSpec {
    pub name: String,
    pub schema: Value,
}

impl SchemaSpec {
    pub fn new(name: impl Into<String>, schema: Value) -> Self {
        Self {
            name: name.into(),
            schema,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    InProgress,
    RequiresAction,
    Completed,
    Failed,
    Cancelled,
    Expired,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, RunStatus::Queued | RunStatus::InProgress)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RunStatus::Queued => "queued",
            RunStatus::InProgress => "in_progress",
            RunStatus::RequiresAction => "requires_action",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
            RunStatus::Cancelled => "cancelled",
            RunStatus::Expired => "expired",
        };
        f.write_str(name)
    }
}

/// A function call the assistant wants answered before its run can finish.
/// `arguments` is the raw JSON string as emitted by the model.
#[derive(Debug, Clone)]
pub struct PendingToolCall {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

/// Snapshot of an assistant run.
#[derive(Debug, Clone)]
pub struct ThreadRun {
    pub id: String,
    pub status: RunStatus,
    pub tool_calls: Vec<PendingToolCall>,
}

/// Reply to one pending tool call.
#[derive(Debug, Clone, Serialize)]
pub struct ToolOutput {
    pub tool_call_id: String,
    pub output: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_blocks_serialize_with_type_tags() {
        let text = serde_json::to_value(ContentBlock::text("hello")).unwrap();
        assert_eq!(text["type"], "input_text");
        assert_eq!(text["text"], "hello");

        let image = serde_json::to_value(ContentBlock::image("data:image/jpeg;base64,AA==")).unwrap();
        assert_eq!(image["type"], "input_image");
    }

    #[test]
    fn run_status_terminality() {
        assert!(!RunStatus::Queued.is_terminal());
        assert!(!RunStatus::InProgress.is_terminal());
        assert!(RunStatus::RequiresAction.is_terminal());
        assert!(RunStatus::Completed.is_terminal());
        assert!(RunStatus::Failed.is_terminal());
    }

    #[test]
    fn run_status_parses_wire_values() {
        let status: RunStatus = serde_json::from_str("\"requires_action\"").unwrap();
        assert_eq!(status, RunStatus::RequiresAction);
    }
}
