use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("store error: {0}")]
    Store(#[from] session_store::StoreError),

    #[error("LLM error: {0}")]
    Llm(#[from] claim_llm::LlmError),

    #[error("mail send to {0} failed")]
    MailSend(String),

    #[error("agent run failed: {0}")]
    AgentRun(String),
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;
