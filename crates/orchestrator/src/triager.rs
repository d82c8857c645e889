//! Incident triage: one structured call over the conversation history that
//! names the incident categories and sketches what happened.

use serde_json::json;

use claim_core::AgentRegistry;
use claim_llm::{ContentBlock, LlmError, SchemaSpec};

use crate::engine::Orchestrator;
use crate::error::{OrchestratorError, Result};

const TRIAGE_INSTRUCTION: &str = "\
You are the Triage Assistant for an automotive-insurance claim system. Read
the conversation between the claimant and the system and identify every
incident category the claim touches, plus a short factual description of the
incident. Only use the category keys offered by the schema. Return exactly one
JSON object that matches the provided schema.";

fn triage_schema() -> SchemaSpec {
    let keys: Vec<&str> = AgentRegistry::incident_type_keys().collect();
    SchemaSpec::new(
        "TRIAGE_INCIDENT",
        json!({
            "type": "object",
            "properties": {
                "incident_types": {
                    "type": "array",
                    "items": { "type": "string", "enum": keys }
                },
                "incident_description": { "type": "string" }
            },
            "required": ["incident_types", "incident_description"],
            "additionalProperties": false
        }),
    )
}

pub(crate) struct TriageOutcome {
    pub incident_types: Vec<String>,
    pub incident_description: String,
}

impl Orchestrator {
    pub(crate) async fn run_triage(&self, claim_id: &str) -> Result<TriageOutcome> {
        let context = self.store.load_context(claim_id).await?;
        let payload = json!({ "conversation_context": context.conversation_history });

        let reply = self
            .model
            .respond(
                TRIAGE_INSTRUCTION,
                vec![ContentBlock::text(payload.to_string())],
                &triage_schema(),
            )
            .await?;

        let raw_types = reply["incident_types"].as_array().ok_or_else(|| {
            OrchestratorError::Llm(LlmError::Schema(
                "triage reply carried no incident_types array".to_string(),
            ))
        })?;

        let mut incident_types = Vec::new();
        for value in raw_types {
            let Some(key) = value.as_str() else { continue };
            if !self.registry.is_incident_type(key) {
                log::warn!("[{claim_id}] triage produced unknown incident type {key:?}, dropped");
                continue;
            }
            if !incident_types.iter().any(|existing| existing == key) {
                incident_types.push(key.to_string());
            }
        }

        let incident_description = reply["incident_description"]
            .as_str()
            .unwrap_or_default()
            .to_string();

        log::info!("[{claim_id}] triaged incident types: {incident_types:?}");
        Ok(TriageOutcome {
            incident_types,
            incident_description,
        })
    }
}
