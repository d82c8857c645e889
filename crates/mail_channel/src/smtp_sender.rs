use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::capability::MailSender;
use crate::error::Result;

/// HTML mail over an authenticated STARTTLS relay.
pub struct SmtpSender {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpSender {
    pub fn new(
        host: &str,
        port: u16,
        username: impl Into<String>,
        password: impl Into<String>,
        from: &str,
    ) -> Result<Self> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)?
            .port(port)
            .credentials(Credentials::new(username.into(), password.into()))
            .build();
        Ok(Self {
            transport,
            from: from.parse()?,
        })
    }

    async fn try_send(&self, to: &str, subject: &str, html: &str) -> Result<()> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(to.parse()?)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html.to_string())?;
        self.transport.send(message).await?;
        Ok(())
    }
}

#[async_trait]
impl MailSender for SmtpSender {
    async fn send_html(&self, to: &str, subject: &str, html: &str) -> bool {
        match self.try_send(to, subject, html).await {
            Ok(()) => true,
            Err(first) => {
                log::warn!("mail to {to} failed ({first}), retrying once");
                match self.try_send(to, subject, html).await {
                    Ok(()) => true,
                    Err(second) => {
                        log::error!("mail to {to} failed after retry: {second}");
                        false
                    }
                }
            }
        }
    }
}
