use std::sync::Arc;

use mail_triage::assistant::{AssistantClient, Composer, HttpAssistantClient, QueryScope, Tone};
use mail_triage::config::{AssistantConfig, MailboxConfig, RetrievalConfig};
use mail_triage::error::Result;
use mail_triage::host::{HttpMailHost, MailHost};
use mail_triage::qa::MailboxIndexer;
use mail_triage::retrieval::RetrievalAdapter;
use mail_triage::triage::{ConnectionStatus, TriageOrchestrator};

const USAGE: &str = "usage: mail-triage [triage | digest | compose <prompt> | ask <question>]";

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = args.first().map(String::as_str).unwrap_or("triage");
    let rest = args.get(1..).unwrap_or_default().join(" ");

    let assistant_config = AssistantConfig::from_env();
    let mailbox_config = MailboxConfig::from_env();

    eprintln!("📬 Mail Triage v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Assistant: {}", assistant_config.base_url);
    match &mailbox_config {
        Some(config) => eprintln!(
            "   Mailbox: rest={} ews={}",
            config.rest_url.as_deref().unwrap_or("-"),
            config.ews_url.as_deref().unwrap_or("-"),
        ),
        None => eprintln!("   Mailbox: not configured (set MAILBOX_REST_URL or MAILBOX_EWS_URL)"),
    }

    let assistant: Arc<dyn AssistantClient> = Arc::new(HttpAssistantClient::new(assistant_config)?);
    let host: Arc<dyn MailHost> = Arc::new(HttpMailHost::new(mailbox_config.unwrap_or_default()));

    if let Err(e) = assistant.health().await {
        tracing::warn!(error = %e, "Assistant health check failed");
    }

    match command {
        "triage" => triage(assistant, host, true).await,
        "digest" => triage(assistant, host, false).await,
        "compose" => {
            let draft = Composer::new(assistant, host).draft(&rest, Tone::default()).await;
            println!("Subject: {}\n\n{}", draft.subject, draft.body);
            eprintln!("   ({:?})", draft.provenance);
            Ok(())
        }
        "ask" => {
            let qa = MailboxIndexer::new(host, assistant);
            eprintln!("   Sync: {}", qa.sync().await);
            let answer = qa.ask(&rest, QueryScope::Combined).await?;
            println!("{}", answer.answer);
            Ok(())
        }
        _ => {
            eprintln!("{USAGE}");
            std::process::exit(2);
        }
    }
}

/// Load the unread list, then either enrich the first item or print a digest.
async fn triage(
    assistant: Arc<dyn AssistantClient>,
    host: Arc<dyn MailHost>,
    enrich_first: bool,
) -> Result<()> {
    let retrieval = Arc::new(RetrievalAdapter::new(host.clone(), RetrievalConfig::from_env()));
    let mut orchestrator = TriageOrchestrator::new(retrieval, assistant, host);

    orchestrator.load_list();
    orchestrator.settle().await;

    let session = orchestrator.session();
    if let Some(error) = session.list_state.error() {
        eprintln!("   Could not load unread mail: {error}");
        std::process::exit(1);
    }
    if session.connection == ConnectionStatus::Unavailable {
        eprintln!("   No live mailbox connection.");
    }
    for item in &session.items {
        println!("• {} | {}  {}", item.sender, item.subject, item.received_at);
        println!("    {}", item.preview(120));
    }

    if !enrich_first {
        orchestrator.summarize_unread();
        orchestrator.settle().await;
        let session = orchestrator.session();
        println!("\n{}", session.digest.as_deref().unwrap_or(""));
        if let Some(error) = session.digest_state.error() {
            eprintln!("   Digest failed: {error}");
        }
        return Ok(());
    }

    let Some(first) = session.items.first().cloned() else {
        return Ok(());
    };
    orchestrator.select_item(first);
    orchestrator.settle().await;

    let session = orchestrator.session();
    match (&session.summary, session.summary_state.error()) {
        (Some(summary), _) => println!("\nSummary:\n{summary}"),
        (None, Some(error)) => eprintln!("   Summary failed: {error}"),
        _ => {}
    }
    match (&session.suggested_reply, session.reply_state.error()) {
        (Some(reply), _) => println!("\nSuggested reply:\n{reply}"),
        (None, Some(error)) => eprintln!("   Reply failed: {error}"),
        _ => {}
    }
    Ok(())
}
