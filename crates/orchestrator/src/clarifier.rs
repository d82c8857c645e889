//! First-contact clarifier: one open-ended question, e-mailed to the
//! claimant exactly once per claim.

use serde_json::json;

use claim_core::ClaimContext;
use claim_llm::{ContentBlock, LlmError, SchemaSpec};

use crate::engine::Orchestrator;
use crate::error::{OrchestratorError, Result};

const CLARIFY_SUBJECT: &str = "Quick clarification needed to process your claim";

const CLARIFY_INSTRUCTION: &str = "\
You are the Clarifying Question Assistant for an automotive-insurance claim
system. After reading the user's initial description and any attachment
information, generate ONE well-structured, open-ended question that gathers the
most critical missing context.

Do NOT classify the incident; simply infer likely incident categories and ask
the question accordingly.

- Always include sub-questions, if needed, in a natural flowing manner.
- Always ask about territorial usage, general exceptions, vehicle security and
  administrative matters.

Return exactly one JSON object that matches the provided schema.";

fn clarify_schema() -> SchemaSpec {
    SchemaSpec::new(
        "CLARIFY_INCIDENT",
        json!({
            "type": "object",
            "properties": {
                "clarifying_question": {
                    "type": "string",
                    "description": "A single open-ended question asking for the most critical missing context."
                }
            },
            "required": ["clarifying_question"],
            "additionalProperties": false
        }),
    )
}

impl Orchestrator {
    pub(crate) async fn send_clarifying_question(
        &self,
        claim_id: &str,
        to: &str,
        first_message: &str,
    ) -> Result<()> {
        let mut blocks = vec![ContentBlock::text(first_message)];
        let context = self.store.load_context(claim_id).await?;
        let summary = attachment_summary(&context);
        if !summary.is_empty() {
            blocks.push(ContentBlock::text(format!("Attachment Details:\n{summary}")));
        }

        let reply = self
            .model
            .respond(CLARIFY_INSTRUCTION, blocks, &clarify_schema())
            .await?;
        let question = reply["clarifying_question"].as_str().ok_or_else(|| {
            OrchestratorError::Llm(LlmError::Schema(
                "clarifier reply carried no clarifying_question".to_string(),
            ))
        })?;

        let html = format!(
            "<p>Thanks for reporting your incident. To route your claim correctly, \
please answer the question below:</p><p><b>{question}</b></p>"
        );
        if !self.mailer.send_html(to, CLARIFY_SUBJECT, &html).await {
            return Err(OrchestratorError::MailSend(to.to_string()));
        }

        self.store.write_clarifier_artifact(claim_id, &reply).await?;
        log::info!("[{claim_id}] clarifying question sent to {to}");
        Ok(())
    }
}

fn attachment_summary(context: &ClaimContext) -> String {
    let mut parts: Vec<String> = context
        .attachment_details
        .iter()
        .filter(|(_, details)| !details.is_empty())
        .map(|(name, details)| format!("[{name}]\n{details}"))
        .collect();
    parts.sort();
    parts.join("\n\n")
}
