//! Domain types shared across the claim pipeline: the claim record and its
//! stage machine, conversation entries, pending tool-call payloads, decisions,
//! follow-up questions, and the specialist agent registry.

pub mod registry;
pub mod types;

pub use registry::{AgentRegistry, DecisionEvaluator, INCIDENT_TYPE_KEYS};
pub use types::{
    ClaimContext, ClaimRecord, ClaimStage, ConversationEntry, DecisionRecord, FollowUpEntry,
    ParsedDoc, PendingPayload, Role,
};
