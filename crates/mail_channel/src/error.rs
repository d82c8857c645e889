use thiserror::Error;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("IMAP error: {0}")]
    Imap(#[from] imap::error::Error),

    #[error("TLS error: {0}")]
    Tls(#[from] native_tls::Error),

    #[error("MIME parse error: {0}")]
    Mime(#[from] mailparse::MailParseError),

    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    #[error("invalid mail address: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("message build error: {0}")]
    Build(#[from] lettre::error::Error),

    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, MailError>;
