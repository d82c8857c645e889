use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;

use claim_core::{AgentRegistry, ClaimRecord, ClaimStage, ConversationEntry, Role};
use claim_llm::{AssistantThreads, StructuredModel};
use mail_channel::MailSender;
use session_store::{SessionStore, StoreError};

use crate::error::Result;
use crate::extract::TextExtractor;
use crate::resolver;

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Ceiling for one assistant run, poll-to-terminal.
    pub run_deadline: Duration,
    /// Sleep between run status polls.
    pub run_poll_interval: Duration,
    /// Bounded pool size for agent fan-out and decision review.
    pub worker_limit: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            run_deadline: Duration::from_secs(120),
            run_poll_interval: Duration::from_secs(1),
            worker_limit: 5,
        }
    }
}

/// Drives one claim through its stages. All collaborators are injected; the
/// orchestrator owns no connection, credential, or storage path itself.
pub struct Orchestrator {
    pub(crate) store: Arc<dyn SessionStore>,
    pub(crate) model: Arc<dyn StructuredModel>,
    pub(crate) threads: Arc<dyn AssistantThreads>,
    pub(crate) mailer: Arc<dyn MailSender>,
    pub(crate) extractor: Arc<dyn TextExtractor>,
    pub(crate) registry: Arc<AgentRegistry>,
    pub(crate) config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn SessionStore>,
        model: Arc<dyn StructuredModel>,
        threads: Arc<dyn AssistantThreads>,
        mailer: Arc<dyn MailSender>,
        extractor: Arc<dyn TextExtractor>,
        registry: Arc<AgentRegistry>,
    ) -> Self {
        Self {
            store,
            model,
            threads,
            mailer,
            extractor,
            registry,
            config: OrchestratorConfig::default(),
        }
    }

    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    /// Entry point for one inbound message. Holds the per-claim lock for the
    /// whole run; runs for distinct claims proceed in parallel.
    pub async fn orchestrate(
        &self,
        claim_id: &str,
        sender: &str,
        subject: &str,
        body: &str,
        attachments: &[String],
    ) -> Result<()> {
        let lock = self.store.claim_lock(claim_id);
        let _run = lock.lock().await;

        log::info!("[{claim_id}] orchestrating message from {sender}");
        let mut claim = self.store.create_claim_if_missing(claim_id).await?;

        if !sender.is_empty() && claim.sender_email != sender {
            claim.sender_email = sender.to_string();
            claim.touch();
            self.store.save_claim(&claim).await?;
        }

        // The fingerprint is written on first contact and immutable after.
        if claim.subject_fp.is_none() {
            let normalized = resolver::normalize_subject(subject);
            if !normalized.is_empty() {
                claim.subject_fp = Some(resolver::subject_fingerprint(sender, &normalized));
                claim.initial_subject = normalized;
                claim.touch();
                self.store.save_claim(&claim).await?;
            }
        }

        if claim.stage == ClaimStage::Review {
            self.run_review(claim_id).await?;
        }

        if !body.trim().is_empty() {
            self.store
                .append_conversation(claim_id, ConversationEntry::user(body))
                .await?;
        }
        if !attachments.is_empty() {
            self.store
                .append_conversation(claim_id, ConversationEntry::user_attachments(attachments.to_vec()))
                .await?;
            self.describe_attachments(claim_id, attachments).await?;
        }

        let claim = self.require_claim(claim_id).await?;
        match claim.stage {
            ClaimStage::New => {
                if !claim.clarifying_sent {
                    self.send_clarifying_question(claim_id, sender, body).await?;
                    let mut claim = self.require_claim(claim_id).await?;
                    claim.clarifying_sent = true;
                    claim.touch();
                    self.store.save_claim(&claim).await?;
                }
                // Guard against repeated first-message arrivals: advance
                // without re-sending.
                self.transition(claim_id, ClaimStage::Questioned).await?;
            }
            ClaimStage::Questioned => match self.run_triage(claim_id).await {
                Ok(triage) => {
                    let mut claim = self.require_claim(claim_id).await?;
                    claim.incident_types = triage.incident_types;
                    claim.incident_description = triage.incident_description;
                    claim.touch();
                    self.store.save_claim(&claim).await?;
                    self.transition(claim_id, ClaimStage::AgentsRunning).await?;
                    self.run_agents_pass(claim_id, sender, body).await?;
                }
                Err(err) => {
                    log::warn!("[{claim_id}] triage failed, staying questioned: {err}");
                }
            },
            ClaimStage::Triaged => {
                self.transition(claim_id, ClaimStage::AgentsRunning).await?;
                self.run_agents_pass(claim_id, sender, body).await?;
            }
            ClaimStage::AgentsRunning => {
                self.run_agents_pass(claim_id, sender, body).await?;
            }
            ClaimStage::FollowupRequested => {
                // The message is the claimant's reply; re-run the open agents
                // like a normal pass, then fall back to AGENTS_RUNNING unless
                // the pass already moved the claim on.
                self.run_agents_pass(claim_id, sender, body).await?;
                let claim = self.require_claim(claim_id).await?;
                if claim.stage == ClaimStage::FollowupRequested {
                    self.transition(claim_id, ClaimStage::AgentsRunning).await?;
                }
            }
            ClaimStage::AgentsComplete => {
                self.transition(claim_id, ClaimStage::Complete).await?;
            }
            ClaimStage::Review | ClaimStage::Complete => {}
        }
        Ok(())
    }

    /// One AGENTS_RUNNING pass: fan out the incomplete agents, review any
    /// pending payloads, then either request follow-up or close out.
    pub(crate) async fn run_agents_pass(
        &self,
        claim_id: &str,
        sender: &str,
        user_msg: &str,
    ) -> Result<()> {
        let claim = self.require_claim(claim_id).await?;
        let agents = self.incomplete_agents(&claim);

        if !user_msg.trim().is_empty() {
            for agent in &agents {
                self.store
                    .append_agent_message(claim_id, agent, Role::User, user_msg)
                    .await?;
            }
        }

        if !agents.is_empty() {
            log::info!("[{claim_id}] running {} agent(s): {agents:?}", agents.len());
            // Threads are minted up front, one claim-record write at a time;
            // the concurrent workers below only read the claim.
            for agent in &agents {
                self.ensure_agent_thread(claim_id, agent).await?;
            }
            let outcomes = futures::stream::iter(agents.iter().cloned())
                .map(|agent| async move {
                    let outcome = self.run_agent(claim_id, &agent).await;
                    (agent, outcome)
                })
                .buffer_unordered(self.config.worker_limit)
                .collect::<Vec<_>>()
                .await;
            for (agent, outcome) in outcomes {
                if let Err(err) = outcome {
                    log::warn!("[{claim_id}] agent {agent} failed: {err}");
                }
            }
        }

        self.run_review(claim_id).await?;

        let followups = self.store.load_followups(claim_id).await?;
        if !followups.is_empty() {
            match self.send_followup_email(claim_id, sender).await {
                Ok(true) => {
                    self.transition(claim_id, ClaimStage::FollowupRequested).await?;
                }
                Ok(false) => {}
                Err(err) => {
                    log::warn!("[{claim_id}] follow-up aggregation failed: {err}");
                }
            }
        } else {
            let claim = self.require_claim(claim_id).await?;
            if self.incomplete_agents(&claim).is_empty() {
                self.transition(claim_id, ClaimStage::AgentsComplete).await?;
            }
        }
        Ok(())
    }

    /// Guarded stage transition. Anything outside the stage table is a
    /// logged no-op; returns the stage the claim ends up in.
    pub(crate) async fn transition(&self, claim_id: &str, to: ClaimStage) -> Result<ClaimStage> {
        let mut claim = self.require_claim(claim_id).await?;
        if claim.stage.can_transition(to) {
            log::info!("[{claim_id}] stage {} -> {to}", claim.stage);
            claim.stage = to;
            claim.touch();
            self.store.save_claim(&claim).await?;
            Ok(to)
        } else {
            log::warn!("[{claim_id}] rejected stage transition {} -> {to}", claim.stage);
            Ok(claim.stage)
        }
    }

    pub(crate) fn incomplete_agents(&self, claim: &ClaimRecord) -> Vec<String> {
        self.registry
            .agents_for(&claim.incident_types)
            .into_iter()
            .filter(|agent| !claim.completed_agents.iter().any(|done| done == agent))
            .collect()
    }

    pub(crate) async fn require_claim(&self, claim_id: &str) -> Result<ClaimRecord> {
        Ok(self
            .store
            .load_claim(claim_id)
            .await?
            .ok_or_else(|| StoreError::ClaimNotFound(claim_id.to_string()))?)
    }
}
