use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Processing stage of a claim. Transitions are restricted to the pairs
/// accepted by [`ClaimStage::can_transition`]; everything else is rejected by
/// the orchestrator as a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClaimStage {
    New,
    Questioned,
    Triaged,
    AgentsRunning,
    Review,
    FollowupRequested,
    AgentsComplete,
    Complete,
}

impl ClaimStage {
    /// Whether moving from `self` to `to` is a legal stage transition.
    pub fn can_transition(self, to: ClaimStage) -> bool {
        use ClaimStage::*;
        matches!(
            (self, to),
            (New, Questioned)
                | (Questioned, Triaged)
                | (Questioned, AgentsRunning)
                | (Triaged, AgentsRunning)
                | (AgentsRunning, Review)
                | (AgentsRunning, FollowupRequested)
                | (AgentsRunning, AgentsComplete)
                | (Review, AgentsRunning)
                | (FollowupRequested, AgentsRunning)
                | (AgentsComplete, Complete)
                | (Complete, Triaged)
        )
    }
}

impl std::fmt::Display for ClaimStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ClaimStage::New => "NEW",
            ClaimStage::Questioned => "QUESTIONED",
            ClaimStage::Triaged => "TRIAGED",
            ClaimStage::AgentsRunning => "AGENTS_RUNNING",
            ClaimStage::Review => "REVIEW",
            ClaimStage::FollowupRequested => "FOLLOWUP_REQUESTED",
            ClaimStage::AgentsComplete => "AGENTS_COMPLETE",
            ClaimStage::Complete => "COMPLETE",
        };
        f.write_str(name)
    }
}

/// The durable per-claim record (`claim.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimRecord {
    pub claim_id: String,
    pub stage: ClaimStage,

    /// Bare e-mail address of the claimant.
    #[serde(default)]
    pub sender_email: String,

    /// Normalized form of the first subject line seen for this claim.
    #[serde(default)]
    pub initial_subject: String,

    /// Fingerprint over (sender, normalized subject). Immutable once set.
    #[serde(default)]
    pub subject_fp: Option<String>,

    /// Incident-type keys assigned by triage.
    #[serde(default)]
    pub incident_types: Vec<String>,

    /// Free-text incident summary from triage.
    #[serde(default)]
    pub incident_description: String,

    /// Per-agent LLM thread handles, persisted as soon as a thread is minted.
    #[serde(default)]
    pub agent_threads: HashMap<String, String>,

    /// Agents that have produced a decision.
    #[serde(default)]
    pub completed_agents: Vec<String>,

    #[serde(default)]
    pub clarifying_sent: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ClaimRecord {
    pub fn new(claim_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            claim_id: claim_id.into(),
            stage: ClaimStage::New,
            sender_email: String::new(),
            initial_subject: String::new(),
            subject_fp: None,
            incident_types: Vec::new(),
            incident_description: String::new(),
            agent_threads: HashMap::new(),
            completed_agents: Vec::new(),
            clarifying_sent: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Record an agent as completed. Returns false if it already was.
    pub fn mark_agent_complete(&mut self, agent: &str) -> bool {
        if self.completed_agents.iter().any(|a| a == agent) {
            return false;
        }
        self.completed_agents.push(agent.to_string());
        self.updated_at = Utc::now();
        true
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => f.write_str("user"),
            Role::Assistant => f.write_str("assistant"),
        }
    }
}

/// One entry of a claim conversation or agent transcript. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationEntry {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Vec<String>>,
}

impl ConversationEntry {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            timestamp: Utc::now(),
            attachments: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            timestamp: Utc::now(),
            attachments: None,
        }
    }

    /// The marker entry appended when a mail carried attachments.
    pub fn user_attachments(filenames: Vec<String>) -> Self {
        Self {
            role: Role::User,
            content: format!("[{} attachment(s)]", filenames.len()),
            timestamp: Utc::now(),
            attachments: Some(filenames),
        }
    }
}

/// Conversation history plus attachment descriptions (`context.json`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClaimContext {
    #[serde(default)]
    pub conversation_history: Vec<ConversationEntry>,
    #[serde(default)]
    pub attachment_details: HashMap<String, String>,
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
}

/// Extracted text for one attachment (`parsed_docs.json` values).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParsedDoc {
    #[serde(default)]
    pub text: String,
}

/// A tool-call payload emitted by a specialist agent, waiting for its
/// evaluator (`pending_payloads/<agent>_pending.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingPayload {
    pub agent: String,
    pub payload: serde_json::Value,
    pub processed: bool,
    pub timestamp: DateTime<Utc>,
}

/// The decision an evaluator produced for one agent. At most one per agent
/// per claim; a re-run replaces the previous record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub agent: String,
    pub decision: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

/// An open question an agent wants relayed to the claimant
/// (`follow_up.json` entries).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowUpEntry {
    pub agent: String,
    pub response: String,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_table_accepts_documented_transitions() {
        use ClaimStage::*;
        assert!(New.can_transition(Questioned));
        assert!(Questioned.can_transition(Triaged));
        assert!(Questioned.can_transition(AgentsRunning));
        assert!(Triaged.can_transition(AgentsRunning));
        assert!(AgentsRunning.can_transition(Review));
        assert!(AgentsRunning.can_transition(FollowupRequested));
        assert!(AgentsRunning.can_transition(AgentsComplete));
        assert!(Review.can_transition(AgentsRunning));
        assert!(FollowupRequested.can_transition(AgentsRunning));
        assert!(AgentsComplete.can_transition(Complete));
        assert!(Complete.can_transition(Triaged));
    }

    #[test]
    fn stage_table_rejects_everything_else() {
        use ClaimStage::*;
        let all = [
            New,
            Questioned,
            Triaged,
            AgentsRunning,
            Review,
            FollowupRequested,
            AgentsComplete,
            Complete,
        ];
        let mut allowed = 0;
        for from in all {
            for to in all {
                if from.can_transition(to) {
                    allowed += 1;
                }
            }
        }
        assert_eq!(allowed, 11);
        assert!(!New.can_transition(New));
        assert!(!Complete.can_transition(AgentsRunning));
        assert!(!Review.can_transition(Complete));
    }

    #[test]
    fn stage_serializes_screaming_snake() {
        let json = serde_json::to_string(&ClaimStage::FollowupRequested).unwrap();
        assert_eq!(json, "\"FOLLOWUP_REQUESTED\"");
        let back: ClaimStage = serde_json::from_str("\"AGENTS_RUNNING\"").unwrap();
        assert_eq!(back, ClaimStage::AgentsRunning);
    }

    #[test]
    fn new_claim_record_defaults() {
        let claim = ClaimRecord::new("CLM-0011223344");
        assert_eq!(claim.stage, ClaimStage::New);
        assert!(!claim.clarifying_sent);
        assert!(claim.subject_fp.is_none());
        assert!(claim.completed_agents.is_empty());
    }

    #[test]
    fn mark_agent_complete_is_idempotent() {
        let mut claim = ClaimRecord::new("CLM-0011223344");
        assert!(claim.mark_agent_complete("theft_assistant"));
        assert!(!claim.mark_agent_complete("theft_assistant"));
        assert_eq!(claim.completed_agents.len(), 1);
    }

    #[test]
    fn attachment_entry_carries_filenames() {
        let entry = ConversationEntry::user_attachments(vec!["photo.jpg".into()]);
        assert_eq!(entry.content, "[1 attachment(s)]");
        assert_eq!(entry.attachments.as_deref(), Some(&["photo.jpg".to_string()][..]));
    }

    #[test]
    fn claim_record_roundtrips_through_json() {
        let mut claim = ClaimRecord::new("CLM-AA11BB22CC");
        claim.sender_email = "alice@example.com".into();
        claim.agent_threads.insert("fire_assistant".into(), "thread_9".into());
        let json = serde_json::to_string_pretty(&claim).unwrap();
        let back: ClaimRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back.claim_id, claim.claim_id);
        assert_eq!(back.agent_threads["fire_assistant"], "thread_9");
    }
}
