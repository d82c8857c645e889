use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use claim_core::AgentRegistry;
use claim_llm::OpenAiClient;
use mail_channel::{ImapPoller, SmtpSender, MAX_ATTACHMENT_SIZE};
use orchestrator::{IngressLoop, Orchestrator, OrchestratorConfig, PlainTextExtractor};
use session_store::FileSessionStore;

mod evaluators;

#[derive(Parser, Debug)]
#[command(name = "claimflow-service")]
#[command(about = "Email-driven insurance claim orchestration service")]
#[command(version)]
struct Cli {
    /// Directory holding per-claim session state
    #[arg(long, env = "SESSIONS_DIR", default_value = "sessions")]
    sessions_dir: String,

    /// IMAP server host
    #[arg(long, env = "IMAP_HOST")]
    imap_host: String,

    /// IMAP server port
    #[arg(long, env = "IMAP_PORT", default_value = "993")]
    imap_port: u16,

    /// IMAP login user
    #[arg(long, env = "IMAP_USERNAME")]
    imap_username: String,

    /// IMAP login password
    #[arg(long, env = "IMAP_PASSWORD")]
    imap_password: String,

    /// SMTP relay host
    #[arg(long, env = "SMTP_HOST")]
    smtp_host: String,

    /// SMTP relay port (STARTTLS)
    #[arg(long, env = "SMTP_PORT", default_value = "587")]
    smtp_port: u16,

    /// SMTP login user
    #[arg(long, env = "SMTP_USER")]
    smtp_user: String,

    /// SMTP login password
    #[arg(long, env = "SMTP_PASSWORD")]
    smtp_password: String,

    /// From address for outbound mail; defaults to the SMTP user
    #[arg(long, env = "EMAIL_FROM")]
    email_from: Option<String>,

    /// LLM API base URL
    #[arg(long, env = "LLM_BASE_URL", default_value = "https://api.openai.com/v1")]
    llm_base_url: String,

    /// LLM API key
    #[arg(long, env = "LLM_API_KEY")]
    llm_api_key: String,

    /// Model for the structured single-shot calls
    #[arg(long, env = "LLM_MODEL", default_value = "gpt-4.1")]
    llm_model: String,

    /// Seconds between inbox polls
    #[arg(long, env = "POLL_INTERVAL_SECS", default_value = "10")]
    poll_interval_secs: u64,

    /// Ceiling in seconds for one assistant run, poll-to-terminal
    #[arg(long, env = "RUN_DEADLINE_SECS", default_value = "120")]
    run_deadline_secs: u64,

    /// Maximum accepted attachment size in bytes
    #[arg(long, env = "MAX_ATTACHMENT_SIZE", default_value_t = MAX_ATTACHMENT_SIZE)]
    max_attachment_size: u64,
}

/// Specialist agents resolve their LLM assistant ids from the environment;
/// an unset id means the agent is skipped for every claim.
const ASSISTANT_ID_VARS: [(&str, &str); 15] = [
    ("accidental_and_glass_assistant", "ACCIDENTAL_AND_GLASS_ASSISTANT_ID"),
    ("fire_assistant", "FIRE_ASSISTANT_ID"),
    ("theft_assistant", "THEFT_ASSISTANT_ID"),
    ("ancillary_assistant", "ANCILLARY_ASSISTANT_ID"),
    ("third_party_injury_assistant", "THIRD_PARTY_INJURY_ASSISTANT_ID"),
    ("third_party_property_assistant", "THIRD_PARTY_PROPERTY_ASSISTANT_ID"),
    ("special_liability_assistant", "SPECIAL_LIABILITY_ASSISTANT_ID"),
    ("legal_and_statutory_assistant", "LEGAL_AND_STATUTORY_ASSISTANT_ID"),
    ("personal_injury_assistant", "PERSONAL_INJURY_ASSISTANT_ID"),
    ("personal_convenience_assistant", "PERSONAL_CONVENIENCE_ASSISTANT_ID"),
    ("personal_property_assistant", "PERSONAL_PROPERTY_ASSISTANT_ID"),
    ("territorial_and_usage_assistant", "TERRITORIAL_AND_USAGE_ASSISTANT_ID"),
    ("general_exceptions_assistant", "GENERAL_EXCEPTIONS_ASSISTANT_ID"),
    ("vehicle_security_assistant", "VEHICLE_SECURITY_ASSISTANT_ID"),
    ("administrative_assistant", "ADMINISTRATIVE_ASSISTANT_ID"),
];

fn build_registry() -> AgentRegistry {
    let mut registry = AgentRegistry::new();
    for (agent, var) in ASSISTANT_ID_VARS {
        match std::env::var(var) {
            Ok(id) if !id.is_empty() => {
                registry = registry.with_assistant_id(agent, id);
            }
            _ => log::warn!("{var} is not set; agent {agent} will be skipped"),
        }
    }
    evaluators::register_all(registry)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    log::info!("starting claimflow service");
    log::info!("  sessions dir: {}", cli.sessions_dir);
    log::info!("  IMAP server: {}:{}", cli.imap_host, cli.imap_port);
    log::info!("  SMTP server: {}:{}", cli.smtp_host, cli.smtp_port);
    log::info!("  LLM base URL: {}", cli.llm_base_url);
    log::info!("  polling every {}s", cli.poll_interval_secs);

    let store = Arc::new(FileSessionStore::new(&cli.sessions_dir));
    let llm = Arc::new(
        OpenAiClient::new(cli.llm_api_key.clone())
            .with_base_url(cli.llm_base_url.clone())
            .with_model(cli.llm_model.clone()),
    );
    let from = cli.email_from.clone().unwrap_or_else(|| cli.smtp_user.clone());
    let mailer = Arc::new(SmtpSender::new(
        &cli.smtp_host,
        cli.smtp_port,
        cli.smtp_user.clone(),
        cli.smtp_password.clone(),
        &from,
    )?);
    let poller = Arc::new(ImapPoller::new(
        cli.imap_host.clone(),
        cli.imap_port,
        cli.imap_username.clone(),
        cli.imap_password.clone(),
    ));
    let registry = Arc::new(build_registry());

    let orchestrator = Arc::new(
        Orchestrator::new(
            store.clone(),
            llm.clone(),
            llm,
            mailer,
            Arc::new(PlainTextExtractor),
            registry,
        )
        .with_config(OrchestratorConfig {
            run_deadline: Duration::from_secs(cli.run_deadline_secs),
            ..OrchestratorConfig::default()
        }),
    );

    IngressLoop::new(
        poller,
        store,
        orchestrator,
        Duration::from_secs(cli.poll_interval_secs),
        cli.max_attachment_size,
    )
    .run()
    .await;

    Ok(())
}
