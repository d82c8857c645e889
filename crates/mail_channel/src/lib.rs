//! Mail transports for the claim pipeline: an IMAP inbox poller, an SMTP
//! sender, MIME normalization, and the attachment admission rules.

mod admission;
mod capability;
mod error;
mod imap_poller;
mod parse;
mod smtp_sender;
mod types;

pub use admission::{is_admissible, sanitize_filename, MAX_ATTACHMENT_SIZE};
pub use capability::{MailPoller, MailSender};
pub use error::{MailError, Result};
pub use imap_poller::ImapPoller;
pub use parse::parse_inbound;
pub use smtp_sender::SmtpSender;
pub use types::{InboundMail, MailAttachment};
