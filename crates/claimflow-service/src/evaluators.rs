//! Field-presence evaluators for the specialist payload contracts.
//!
//! Each evaluator checks that an agent's tool-call payload carries the inputs
//! its underwriting rules need and records the outcome. Deployments with a
//! full rule pack replace individual entries through the registry.

use std::sync::Arc;

use serde_json::{json, Value};

use claim_core::{AgentRegistry, DecisionEvaluator};

struct FieldCheckEvaluator {
    required: &'static [&'static str],
}

impl DecisionEvaluator for FieldCheckEvaluator {
    fn evaluate(&self, payload: &Value) -> Result<Value, String> {
        let object = payload
            .as_object()
            .ok_or_else(|| "payload is not a JSON object".to_string())?;
        let missing: Vec<&str> = self
            .required
            .iter()
            .copied()
            .filter(|field| !object.contains_key(*field))
            .collect();
        let outcome = if missing.is_empty() { "accepted" } else { "needs_information" };
        Ok(json!({
            "outcome": outcome,
            "missing_fields": missing,
            "payload": payload,
        }))
    }
}

const REQUIRED_FIELDS: [(&str, &[&str]); 15] = [
    ("accidental_and_glass_assistant", &["damage_description"]),
    ("fire_assistant", &["fire_brigade_attended"]),
    ("theft_assistant", &["reported_to_police", "time_lag_hours"]),
    ("ancillary_assistant", &[]),
    ("third_party_injury_assistant", &["injuries_reported"]),
    ("third_party_property_assistant", &["property_damage_description"]),
    ("special_liability_assistant", &[]),
    ("legal_and_statutory_assistant", &[]),
    ("personal_injury_assistant", &["injuries_reported"]),
    ("personal_convenience_assistant", &[]),
    ("personal_property_assistant", &[]),
    ("territorial_and_usage_assistant", &["incident_location"]),
    ("general_exceptions_assistant", &[]),
    ("vehicle_security_assistant", &["vehicle_secured"]),
    ("administrative_assistant", &[]),
];

pub fn register_all(mut registry: AgentRegistry) -> AgentRegistry {
    for (agent, required) in REQUIRED_FIELDS {
        registry = registry.with_evaluator(agent, Arc::new(FieldCheckEvaluator { required }));
    }
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn complete_theft_payload_is_accepted() {
        let registry = register_all(AgentRegistry::new());
        let evaluator = registry.evaluator("theft_assistant").unwrap();
        let decision = evaluator
            .evaluate(&json!({"reported_to_police": true, "time_lag_hours": 2}))
            .unwrap();
        assert_eq!(decision["outcome"], "accepted");
        assert!(decision["missing_fields"].as_array().unwrap().is_empty());
    }

    #[test]
    fn missing_fields_are_reported() {
        let registry = register_all(AgentRegistry::new());
        let evaluator = registry.evaluator("theft_assistant").unwrap();
        let decision = evaluator.evaluate(&json!({"reported_to_police": true})).unwrap();
        assert_eq!(decision["outcome"], "needs_information");
        assert_eq!(decision["missing_fields"], json!(["time_lag_hours"]));
    }

    #[test]
    fn non_object_payload_is_an_error() {
        let registry = register_all(AgentRegistry::new());
        let evaluator = registry.evaluator("fire_assistant").unwrap();
        assert!(evaluator.evaluate(&json!("not an object")).is_err());
    }

    #[test]
    fn every_specialist_has_an_evaluator() {
        let registry = register_all(AgentRegistry::new());
        for key in AgentRegistry::incident_type_keys() {
            let agent = registry.agent_for_incident(key).unwrap();
            assert!(registry.evaluator(agent).is_some(), "missing evaluator for {agent}");
        }
    }
}
