//! The claim orchestration core: conversation threading from inbound mail,
//! the per-claim stage machine, concurrent specialist-agent fan-out with
//! tool-call review, deduplicated follow-up generation, and the ingress loop
//! that drives all of it.
//!
//! Mail transports, the LLM, the decision evaluators, and the session store
//! are injected capabilities; nothing in here owns a connection or a
//! credential.

mod agent_runner;
mod clarifier;
mod describer;
mod engine;
mod error;
mod extract;
mod followup;
mod ingress;
mod resolver;
mod reviewer;
mod triager;

pub use engine::{Orchestrator, OrchestratorConfig};
pub use error::{OrchestratorError, Result};
pub use extract::{PlainTextExtractor, TextExtractor};
pub use ingress::IngressLoop;
pub use resolver::{
    extract_claim_tag, mint_claim_id, normalize_subject, resolve, subject_fingerprint, Resolution,
};
