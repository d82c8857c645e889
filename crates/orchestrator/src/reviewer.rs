//! Feeds pending tool-call payloads into the rule-based evaluator bound to
//! each agent. An agent only counts as complete once its evaluator has
//! produced a decision.

use futures::StreamExt;
use serde_json::Value;

use claim_core::ClaimStage;

use crate::engine::Orchestrator;
use crate::error::Result;

impl Orchestrator {
    pub(crate) async fn run_review(&self, claim_id: &str) -> Result<()> {
        let pending = self.store.list_unprocessed_pending(claim_id).await?;
        if pending.is_empty() {
            return Ok(());
        }
        log::info!("[{claim_id}] reviewing {} pending payload(s)", pending.len());

        let evaluated: Vec<(String, Option<Value>)> = futures::stream::iter(pending.into_iter())
            .map(|record| async move {
                let decision = match self.registry.evaluator(&record.agent) {
                    Some(evaluator) => match evaluator.evaluate(&record.payload) {
                        Ok(decision) => Some(decision),
                        Err(err) => {
                            log::warn!(
                                "[{claim_id}] evaluator for {} failed: {err}",
                                record.agent
                            );
                            None
                        }
                    },
                    None => {
                        log::warn!(
                            "[{claim_id}] no evaluator registered for {}, payload left pending",
                            record.agent
                        );
                        None
                    }
                };
                (record.agent, decision)
            })
            .buffer_unordered(self.config.worker_limit)
            .collect()
            .await;

        let mut processed_any = false;
        for (agent, decision) in evaluated {
            let Some(decision) = decision else { continue };
            self.store.put_decision(claim_id, &agent, decision).await?;
            let mut claim = self.require_claim(claim_id).await?;
            if claim.mark_agent_complete(&agent) {
                self.store.save_claim(&claim).await?;
            }
            self.store.mark_pending_processed(claim_id, &agent).await?;
            processed_any = true;
        }

        if processed_any {
            self.transition(claim_id, ClaimStage::AgentsRunning).await?;
        }
        Ok(())
    }
}
