use async_trait::async_trait;

use crate::capability::MailPoller;
use crate::error::Result;
use crate::parse::parse_inbound;
use crate::types::InboundMail;

/// IMAP inbox poller. Each poll opens a fresh authenticated TLS session,
/// fetches everything UNSEEN from INBOX, and marks it seen. The `imap` crate
/// is blocking, so the work runs on the blocking thread pool.
#[derive(Clone)]
pub struct ImapPoller {
    host: String,
    port: u16,
    username: String,
    password: String,
}

impl ImapPoller {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            username: username.into(),
            password: password.into(),
        }
    }

    fn fetch_unseen_blocking(&self) -> Result<Vec<InboundMail>> {
        let tls = native_tls::TlsConnector::builder().build()?;
        let client = imap::connect((self.host.as_str(), self.port), self.host.as_str(), &tls)?;
        let mut session = client
            .login(&self.username, &self.password)
            .map_err(|(err, _client)| err)?;
        session.select("INBOX")?;

        let mut uids: Vec<u32> = session.uid_search("UNSEEN")?.into_iter().collect();
        uids.sort_unstable();

        let mut mails = Vec::new();
        for uid in uids {
            let fetches = session.uid_fetch(uid.to_string(), "RFC822")?;
            for fetch in fetches.iter() {
                let Some(body) = fetch.body() else { continue };
                match parse_inbound(&uid.to_string(), body) {
                    Ok(mail) => mails.push(mail),
                    Err(err) => log::warn!("failed to parse message uid={uid}: {err}"),
                }
            }
            session.uid_store(uid.to_string(), "+FLAGS (\\Seen)")?;
        }

        if let Err(err) = session.logout() {
            log::debug!("IMAP logout failed: {err}");
        }
        Ok(mails)
    }
}

#[async_trait]
impl MailPoller for ImapPoller {
    async fn poll_unseen(&self) -> Result<Vec<InboundMail>> {
        let poller = self.clone();
        tokio::task::spawn_blocking(move || poller.fetch_unseen_blocking()).await?
    }
}
