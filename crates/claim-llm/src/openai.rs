use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::capability::{AssistantThreads, LlmError, Result, StructuredModel};
use crate::types::{ContentBlock, PendingToolCall, RunStatus, SchemaSpec, ThreadRun, ToolOutput};

/// HTTP client for an OpenAI-compatible endpoint, covering the responses API
/// (structured single-shot) and the assistants thread API.
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4.1".to_string(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .post(format!("{}{}", self.base_url, path))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("OpenAI-Beta", "assistants=v2")
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .get(format!("{}{}", self.base_url, path))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("OpenAI-Beta", "assistants=v2")
    }

    async fn execute(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await?;
            return Err(LlmError::Api(format!("HTTP {status}: {text}")));
        }
        Ok(response)
    }
}

#[derive(Deserialize)]
struct ResponsesReply {
    #[serde(default)]
    output: Vec<ResponsesOutputItem>,
}

#[derive(Deserialize)]
struct ResponsesOutputItem {
    #[serde(default)]
    content: Vec<ResponsesContent>,
}

#[derive(Deserialize)]
struct ResponsesContent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

impl ResponsesReply {
    fn output_text(&self) -> Option<&str> {
        self.output
            .iter()
            .flat_map(|item| item.content.iter())
            .find(|content| content.kind == "output_text")
            .map(|content| content.text.as_str())
    }
}

#[async_trait]
impl StructuredModel for OpenAiClient {
    async fn respond(
        &self,
        system: &str,
        user: Vec<ContentBlock>,
        schema: &SchemaSpec,
    ) -> Result<Value> {
        let body = json!({
            "model": self.model,
            "input": [
                { "role": "system", "content": system },
                { "role": "user", "content": user },
            ],
            "text": {
                "format": {
                    "type": "json_schema",
                    "name": schema.name,
                    "schema": schema.schema,
                    "strict": true,
                }
            },
        });

        let response = self.execute(self.post("/responses").json(&body)).await?;
        let reply: ResponsesReply = response.json().await?;
        let text = reply
            .output_text()
            .ok_or_else(|| LlmError::Schema("response carried no output_text block".to_string()))?;
        serde_json::from_str(text)
            .map_err(|err| LlmError::Schema(format!("structured reply is not valid JSON: {err}")))
    }
}

#[derive(Deserialize)]
struct ThreadCreated {
    id: String,
}

#[derive(Deserialize)]
struct RunReply {
    id: String,
    status: RunStatus,
    #[serde(default)]
    required_action: Option<RequiredAction>,
}

#[derive(Deserialize)]
struct RequiredAction {
    submit_tool_outputs: SubmitToolOutputsAction,
}

#[derive(Deserialize)]
struct SubmitToolOutputsAction {
    #[serde(default)]
    tool_calls: Vec<WireToolCall>,
}

#[derive(Deserialize)]
struct WireToolCall {
    id: String,
    function: WireFunction,
}

#[derive(Deserialize)]
struct WireFunction {
    name: String,
    arguments: String,
}

impl From<RunReply> for ThreadRun {
    fn from(reply: RunReply) -> Self {
        let tool_calls = reply
            .required_action
            .map(|action| {
                action
                    .submit_tool_outputs
                    .tool_calls
                    .into_iter()
                    .map(|call| PendingToolCall {
                        id: call.id,
                        name: call.function.name,
                        arguments: call.function.arguments,
                    })
                    .collect()
            })
            .unwrap_or_default();
        ThreadRun {
            id: reply.id,
            status: reply.status,
            tool_calls,
        }
    }
}

#[derive(Deserialize)]
struct MessagesReply {
    #[serde(default)]
    data: Vec<ThreadMessage>,
}

#[derive(Deserialize)]
struct ThreadMessage {
    #[serde(default)]
    content: Vec<ThreadMessageContent>,
}

#[derive(Deserialize)]
struct ThreadMessageContent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<ThreadMessageText>,
}

#[derive(Deserialize)]
struct ThreadMessageText {
    value: String,
}

#[async_trait]
impl AssistantThreads for OpenAiClient {
    async fn create_thread(&self) -> Result<String> {
        let response = self.execute(self.post("/threads").json(&json!({}))).await?;
        let created: ThreadCreated = response.json().await?;
        Ok(created.id)
    }

    async fn post_user_message(&self, thread_id: &str, text: &str) -> Result<()> {
        let body = json!({ "role": "user", "content": text });
        self.execute(self.post(&format!("/threads/{thread_id}/messages")).json(&body))
            .await?;
        Ok(())
    }

    async fn start_run(&self, thread_id: &str, assistant_id: &str) -> Result<ThreadRun> {
        let body = json!({ "assistant_id": assistant_id });
        let response = self
            .execute(self.post(&format!("/threads/{thread_id}/runs")).json(&body))
            .await?;
        let reply: RunReply = response.json().await?;
        Ok(reply.into())
    }

    async fn poll_run(&self, thread_id: &str, run_id: &str) -> Result<ThreadRun> {
        let response = self
            .execute(self.get(&format!("/threads/{thread_id}/runs/{run_id}")))
            .await?;
        let reply: RunReply = response.json().await?;
        Ok(reply.into())
    }

    async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: Vec<ToolOutput>,
    ) -> Result<()> {
        let body = json!({ "tool_outputs": outputs });
        self.execute(
            self.post(&format!("/threads/{thread_id}/runs/{run_id}/submit_tool_outputs"))
                .json(&body),
        )
        .await?;
        Ok(())
    }

    async fn latest_message(&self, thread_id: &str) -> Result<String> {
        let response = self
            .execute(
                self.get(&format!("/threads/{thread_id}/messages"))
                    .query(&[("order", "desc"), ("limit", "1")]),
            )
            .await?;
        let reply: MessagesReply = response.json().await?;
        reply
            .data
            .first()
            .and_then(|message| {
                message
                    .content
                    .iter()
                    .find(|content| content.kind == "text")
                    .and_then(|content| content.text.as_ref())
            })
            .map(|text| text.value.clone())
            .ok_or_else(|| LlmError::Api(format!("thread {thread_id} has no assistant message")))
    }
}
