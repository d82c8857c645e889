//! Aggregates the open questions the specialist agents raised into one
//! deduplicated e-mail. The queue is only drained once the mail has actually
//! gone out.

use serde_json::json;

use claim_llm::{ContentBlock, LlmError, SchemaSpec};

use crate::engine::Orchestrator;
use crate::error::{OrchestratorError, Result};

const FOLLOW_UP_SUBJECT: &str = "Further information required to process your claim";

const FOLLOW_UP_INSTRUCTION: &str = "\
You are the Follow-Up Agent in an AI-powered automotive insurance claim system.

Given a JSON object that aggregates possible open questions from multiple
specialist agents, produce a single professional HTML e-mail body that starts
with:

<b>To help us proceed with your claim, please respond to the following questions:</b><br><br>

Then list each deduplicated, well-phrased question, numbered and separated by
<br> tags.

Return exactly one JSON object matching the provided schema - nothing else.";

fn follow_up_schema() -> SchemaSpec {
    SchemaSpec::new(
        "FOLLOW_UP_EMAIL",
        json!({
            "type": "object",
            "properties": {
                "email_html": {
                    "type": "string",
                    "description": "HTML-formatted list of deduplicated follow-up questions."
                }
            },
            "required": ["email_html"],
            "additionalProperties": false
        }),
    )
}

impl Orchestrator {
    /// Returns whether a follow-up e-mail went out. On a failed send the
    /// queue on disk is left untouched so the next pass retries.
    pub(crate) async fn send_followup_email(&self, claim_id: &str, to: &str) -> Result<bool> {
        let entries = self.store.load_followups(claim_id).await?;
        if entries.is_empty() {
            return Ok(false);
        }

        let aggregate = json!({ "specialist_outputs": &entries });
        let reply = self
            .model
            .respond(
                FOLLOW_UP_INSTRUCTION,
                vec![ContentBlock::text(aggregate.to_string())],
                &follow_up_schema(),
            )
            .await?;
        let html = reply["email_html"]
            .as_str()
            .ok_or_else(|| {
                OrchestratorError::Llm(LlmError::Schema(
                    "follow-up reply carried no email_html".to_string(),
                ))
            })?
            .to_string();

        if !self.mailer.send_html(to, FOLLOW_UP_SUBJECT, &html).await {
            log::warn!("[{claim_id}] follow-up e-mail failed, queue retained");
            return Ok(false);
        }

        self.store.write_followup_email_artifact(claim_id, &reply).await?;
        self.store.take_followups(claim_id).await?;
        log::info!(
            "[{claim_id}] follow-up e-mail sent to {to}, {} question(s) drained",
            entries.len()
        );
        Ok(true)
    }
}
