//! Drives one specialist agent over its LLM thread: post the claim context,
//! start an assistant run, poll to a terminal state, and route the outcome.
//! Tool-call payloads land in the pending queue, open questions in the
//! follow-up queue.

use std::time::Instant;

use serde_json::{json, Value};

use claim_core::{ClaimContext, ClaimStage, Role};
use claim_llm::{RunStatus, ToolOutput};

use crate::engine::Orchestrator;
use crate::error::{OrchestratorError, Result};

impl Orchestrator {
    /// Look up or mint the agent's LLM thread, persisting the handle as soon
    /// as it exists. Called sequentially before fan-out so concurrent agent
    /// workers never race on the claim record. Returns `None` for agents
    /// without a configured assistant id.
    pub(crate) async fn ensure_agent_thread(
        &self,
        claim_id: &str,
        agent: &str,
    ) -> Result<Option<String>> {
        if self.registry.assistant_id(agent).is_none() {
            log::info!("[{claim_id}] skipping agent {agent}: no assistant id configured");
            return Ok(None);
        }
        let mut claim = self.require_claim(claim_id).await?;
        if let Some(thread_id) = claim.agent_threads.get(agent) {
            return Ok(Some(thread_id.clone()));
        }
        let thread_id = self.threads.create_thread().await?;
        claim.agent_threads.insert(agent.to_string(), thread_id.clone());
        claim.touch();
        self.store.save_claim(&claim).await?;
        Ok(Some(thread_id))
    }

    pub(crate) async fn run_agent(&self, claim_id: &str, agent: &str) -> Result<()> {
        let Some(assistant_id) = self.registry.assistant_id(agent).map(str::to_string) else {
            return Ok(());
        };
        let Some(thread_id) = self.ensure_agent_thread(claim_id, agent).await? else {
            return Ok(());
        };

        let context = self.store.load_context(claim_id).await?;
        let context_message = build_context_message(&context);
        self.store
            .append_agent_message(claim_id, agent, Role::User, &context_message)
            .await?;
        self.threads.post_user_message(&thread_id, &context_message).await?;

        let mut run = self.threads.start_run(&thread_id, &assistant_id).await?;
        let deadline = Instant::now() + self.config.run_deadline;
        while !run.status.is_terminal() {
            if Instant::now() >= deadline {
                return Err(OrchestratorError::AgentRun(format!(
                    "agent {agent} run {} exceeded the {}s deadline",
                    run.id,
                    self.config.run_deadline.as_secs()
                )));
            }
            tokio::time::sleep(self.config.run_poll_interval).await;
            run = self.threads.poll_run(&thread_id, &run.id).await?;
        }

        match run.status {
            RunStatus::RequiresAction => {
                let mut outputs = Vec::with_capacity(run.tool_calls.len());
                for call in &run.tool_calls {
                    let payload: Value =
                        serde_json::from_str(&call.arguments).unwrap_or_else(|_| json!({}));
                    self.store.enqueue_pending(claim_id, agent, payload).await?;
                    outputs.push(ToolOutput {
                        tool_call_id: call.id.clone(),
                        output: json!({"status": "saved"}).to_string(),
                    });
                }
                self.threads
                    .submit_tool_outputs(&thread_id, &run.id, outputs)
                    .await?;
                // The agent is not complete yet; completion requires a
                // decision from its evaluator.
                self.transition(claim_id, ClaimStage::Review).await?;
            }
            RunStatus::Completed => {
                let message = self.threads.latest_message(&thread_id).await?;
                self.store
                    .append_agent_message(claim_id, agent, Role::Assistant, &message)
                    .await?;
                // A body that parses as a JSON object is a structured
                // finding; anything else is a question for the claimant.
                let structured = serde_json::from_str::<Value>(&message)
                    .map(|value| value.is_object())
                    .unwrap_or(false);
                if !structured {
                    self.store.append_followup(claim_id, agent, &message).await?;
                }
            }
            status => {
                return Err(OrchestratorError::AgentRun(format!(
                    "agent {agent} run ended with status {status}"
                )));
            }
        }
        Ok(())
    }
}

/// Full conversation as `ROLE: content` lines, followed by the described
/// attachments.
pub(crate) fn build_context_message(context: &ClaimContext) -> String {
    let mut out = String::new();
    for entry in &context.conversation_history {
        let role = entry.role.to_string().to_uppercase();
        out.push_str(&role);
        out.push_str(": ");
        out.push_str(&entry.content);
        out.push('\n');
    }

    let described: Vec<(&String, &String)> = {
        let mut pairs: Vec<_> = context
            .attachment_details
            .iter()
            .filter(|(_, details)| !details.is_empty())
            .collect();
        pairs.sort_by(|a, b| a.0.cmp(b.0));
        pairs
    };
    if !described.is_empty() {
        out.push_str("\nATTACHMENTS:\n");
        for (name, details) in described {
            out.push_str(name);
            out.push_str(": ");
            out.push_str(details);
            out.push('\n');
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use claim_core::ConversationEntry;

    #[test]
    fn context_message_lists_roles_then_attachments() {
        let mut context = ClaimContext::default();
        context
            .conversation_history
            .push(ConversationEntry::user("Rear-ended on Main St"));
        context
            .conversation_history
            .push(ConversationEntry::assistant("Noted."));
        context
            .attachment_details
            .insert("photo.jpg".to_string(), "dented rear bumper".to_string());
        context
            .attachment_details
            .insert("empty.pdf".to_string(), String::new());

        let message = build_context_message(&context);
        assert!(message.starts_with("USER: Rear-ended on Main St\nASSISTANT: Noted.\n"));
        assert!(message.contains("\nATTACHMENTS:\nphoto.jpg: dented rear bumper\n"));
        assert!(!message.contains("empty.pdf"));
    }

    #[test]
    fn context_message_without_attachments_has_no_section() {
        let mut context = ClaimContext::default();
        context.conversation_history.push(ConversationEntry::user("hi"));
        let message = build_context_message(&context);
        assert_eq!(message, "USER: hi\n");
    }
}
