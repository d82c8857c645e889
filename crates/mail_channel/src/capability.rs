use async_trait::async_trait;

use crate::error::Result;
use crate::types::InboundMail;

/// Inbox capability: fetch unseen messages, marking them seen on the server.
#[async_trait]
pub trait MailPoller: Send + Sync {
    async fn poll_unseen(&self) -> Result<Vec<InboundMail>>;
}

/// Outbound capability. Returns whether the mail left the building; the
/// implementation retries once internally before giving up.
#[async_trait]
pub trait MailSender: Send + Sync {
    async fn send_html(&self, to: &str, subject: &str, html: &str) -> bool;
}
