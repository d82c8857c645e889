use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

/// The fixed incident-type → specialist-agent binding. Triage output is
/// validated against the left column; fan-out targets come from the right.
pub const INCIDENT_TYPE_KEYS: [(&str, &str); 15] = [
    ("accidental_and_glass_damage", "accidental_and_glass_assistant"),
    ("fire", "fire_assistant"),
    ("theft", "theft_assistant"),
    ("ancillary_property", "ancillary_assistant"),
    ("third_party_injury", "third_party_injury_assistant"),
    ("third_party_property", "third_party_property_assistant"),
    ("special_liability", "special_liability_assistant"),
    ("legal_and_statutory", "legal_and_statutory_assistant"),
    ("personal_injury", "personal_injury_assistant"),
    ("personal_convenience", "personal_convenience_assistant"),
    ("personal_property", "personal_property_assistant"),
    ("territorial_usage", "territorial_and_usage_assistant"),
    ("general_exceptions", "general_exceptions_assistant"),
    ("vehicle_security", "vehicle_security_assistant"),
    ("administrative", "administrative_assistant"),
];

/// A rule-based decision function. Pure and synchronous: the payload an agent
/// emitted goes in, a decision document comes out. Implementations live
/// outside the orchestration core and are registered at wiring time.
pub trait DecisionEvaluator: Send + Sync {
    fn evaluate(&self, payload: &Value) -> Result<Value, String>;
}

impl<F> DecisionEvaluator for F
where
    F: Fn(&Value) -> Result<Value, String> + Send + Sync,
{
    fn evaluate(&self, payload: &Value) -> Result<Value, String> {
        self(payload)
    }
}

/// Binds incident types to agent names, agent names to LLM assistant ids and
/// decision evaluators. An agent without an assistant id is skipped during
/// fan-out; an agent without an evaluator leaves its payloads parked.
pub struct AgentRegistry {
    agent_by_incident: HashMap<&'static str, &'static str>,
    assistant_ids: HashMap<String, String>,
    evaluators: HashMap<String, Arc<dyn DecisionEvaluator>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self {
            agent_by_incident: INCIDENT_TYPE_KEYS.iter().copied().collect(),
            assistant_ids: HashMap::new(),
            evaluators: HashMap::new(),
        }
    }

    pub fn with_assistant_id(
        mut self,
        agent: impl Into<String>,
        assistant_id: impl Into<String>,
    ) -> Self {
        self.assistant_ids.insert(agent.into(), assistant_id.into());
        self
    }

    pub fn with_evaluator(
        mut self,
        agent: impl Into<String>,
        evaluator: Arc<dyn DecisionEvaluator>,
    ) -> Self {
        self.evaluators.insert(agent.into(), evaluator);
        self
    }

    pub fn is_incident_type(&self, key: &str) -> bool {
        self.agent_by_incident.contains_key(key)
    }

    pub fn agent_for_incident(&self, key: &str) -> Option<&str> {
        self.agent_by_incident.get(key).copied()
    }

    /// Agent names for a set of incident types, in input order, unknown keys
    /// skipped.
    pub fn agents_for(&self, incident_types: &[String]) -> Vec<String> {
        incident_types
            .iter()
            .filter_map(|key| self.agent_for_incident(key))
            .map(str::to_string)
            .collect()
    }

    pub fn assistant_id(&self, agent: &str) -> Option<&str> {
        self.assistant_ids.get(agent).map(String::as_str)
    }

    pub fn evaluator(&self, agent: &str) -> Option<&Arc<dyn DecisionEvaluator>> {
        self.evaluators.get(agent)
    }

    pub fn incident_type_keys() -> impl Iterator<Item = &'static str> {
        INCIDENT_TYPE_KEYS.iter().map(|(key, _)| *key)
    }
}

impl Default for AgentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn registry_maps_all_fifteen_incident_types() {
        let registry = AgentRegistry::new();
        assert_eq!(AgentRegistry::incident_type_keys().count(), 15);
        assert_eq!(registry.agent_for_incident("theft"), Some("theft_assistant"));
        assert_eq!(
            registry.agent_for_incident("territorial_usage"),
            Some("territorial_and_usage_assistant")
        );
        assert_eq!(registry.agent_for_incident("meteor_strike"), None);
    }

    #[test]
    fn agents_for_skips_unknown_keys() {
        let registry = AgentRegistry::new();
        let agents = registry.agents_for(&[
            "fire".to_string(),
            "not_a_category".to_string(),
            "theft".to_string(),
        ]);
        assert_eq!(agents, vec!["fire_assistant", "theft_assistant"]);
    }

    #[test]
    fn closures_act_as_evaluators() {
        let echo = |payload: &Value| -> Result<Value, String> {
            Ok(json!({ "echo": payload.clone() }))
        };
        let registry = AgentRegistry::new().with_evaluator("theft_assistant", Arc::new(echo));
        let evaluator = registry.evaluator("theft_assistant").unwrap();
        let decision = evaluator.evaluate(&json!({"reported_to_police": true})).unwrap();
        assert_eq!(decision["echo"]["reported_to_police"], json!(true));
        assert!(registry.evaluator("fire_assistant").is_none());
    }

    #[test]
    fn assistant_ids_resolve_after_registration() {
        let registry = AgentRegistry::new().with_assistant_id("fire_assistant", "asst_123");
        assert_eq!(registry.assistant_id("fire_assistant"), Some("asst_123"));
        assert_eq!(registry.assistant_id("theft_assistant"), None);
    }
}
