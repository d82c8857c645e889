/// One normalized inbound message: bare sender address, subject, text/html
/// bodies, and the raw attachments as fetched from the mailbox.
#[derive(Debug, Clone, Default)]
pub struct InboundMail {
    pub uid: String,
    pub sender: String,
    pub subject: String,
    pub text: String,
    pub html: String,
    pub attachments: Vec<MailAttachment>,
}

impl InboundMail {
    /// Preferred body text: plain text when present, HTML otherwise.
    pub fn body(&self) -> &str {
        if self.text.is_empty() {
            &self.html
        } else {
            &self.text
        }
    }
}

#[derive(Debug, Clone)]
pub struct MailAttachment {
    pub filename: String,
    pub size: u64,
    pub bytes: Vec<u8>,
}
