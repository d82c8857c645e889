//! The inbound mail loop: poll the inbox, thread each message onto a claim,
//! persist admissible attachments, hand off to the orchestrator, and record
//! the UID as processed. Per-message failures are isolated; connection
//! failures wait for the next tick.

use std::sync::Arc;
use std::time::Duration;

use mail_channel::{is_admissible, sanitize_filename, InboundMail, MailPoller};
use session_store::SessionStore;

use crate::engine::Orchestrator;
use crate::error::Result;
use crate::resolver;

pub struct IngressLoop {
    poller: Arc<dyn MailPoller>,
    store: Arc<dyn SessionStore>,
    orchestrator: Arc<Orchestrator>,
    poll_interval: Duration,
    max_attachment_size: u64,
}

impl IngressLoop {
    pub fn new(
        poller: Arc<dyn MailPoller>,
        store: Arc<dyn SessionStore>,
        orchestrator: Arc<Orchestrator>,
        poll_interval: Duration,
        max_attachment_size: u64,
    ) -> Self {
        Self {
            poller,
            store,
            orchestrator,
            poll_interval,
            max_attachment_size,
        }
    }

    /// Poll forever. Never returns under normal operation.
    pub async fn run(&self) {
        log::info!(
            "mail ingress started, polling every {}s",
            self.poll_interval.as_secs()
        );
        loop {
            self.tick().await;
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// One poll cycle. Public so tests and one-shot runs can drive it.
    pub async fn tick(&self) {
        let mails = match self.poller.poll_unseen().await {
            Ok(mails) => mails,
            Err(err) => {
                log::warn!("inbox poll failed, retrying next tick: {err}");
                return;
            }
        };
        if !mails.is_empty() {
            log::info!("fetched {} unseen message(s)", mails.len());
        }
        for mail in mails {
            if let Err(err) = self.handle_message(&mail).await {
                log::error!("failed to process message uid={}: {err}", mail.uid);
            }
        }
    }

    async fn handle_message(&self, mail: &InboundMail) -> Result<()> {
        if self.store.is_mail_processed(&mail.uid).await? {
            log::debug!("uid {} already processed, skipping", mail.uid);
            return Ok(());
        }

        let resolution = resolver::resolve(self.store.as_ref(), &mail.sender, &mail.subject).await?;
        let claim_id = resolution.claim_id;
        if resolution.minted {
            log::info!("[{claim_id}] minted new claim for {}", mail.sender);
        } else {
            log::info!("[{claim_id}] threaded message uid={} from {}", mail.uid, mail.sender);
        }
        self.store.create_claim_if_missing(&claim_id).await?;

        let mut stored = Vec::new();
        for attachment in &mail.attachments {
            if !is_admissible(&attachment.filename, attachment.size, self.max_attachment_size) {
                log::debug!(
                    "[{claim_id}] dropping attachment {} ({} bytes)",
                    attachment.filename,
                    attachment.size
                );
                continue;
            }
            let filename = sanitize_filename(&attachment.filename);
            self.store
                .store_attachment(&claim_id, &filename, &attachment.bytes)
                .await?;
            stored.push(filename);
        }

        // Orchestration failures are logged, not retried: the UID is marked
        // processed either way so one poisonous message cannot wedge the
        // inbox.
        if let Err(err) = self
            .orchestrator
            .orchestrate(&claim_id, &mail.sender, &mail.subject, mail.body(), &stored)
            .await
        {
            log::error!("[{claim_id}] orchestration failed for uid={}: {err}", mail.uid);
        }
        self.store.mark_mail_processed(&mail.uid).await?;
        Ok(())
    }
}
