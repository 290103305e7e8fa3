// Review autoresponder entry point.
//
// Startup sequence:
// 1. Initialize tracing (stdout)
// 2. Load config and credentials
// 3. Load the ledger of answered reviews
// 4. Build the responder, marketplace sources and account registry
// 5. Spawn the poll loop
// 6. Wait for Ctrl+C, signal shutdown and let the loop drain

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::{error, info, warn};

use autoresponder_app::marketplace;
use autoresponder_app::poll::PollLoop;
use autoresponder_app::processor::ReviewProcessor;
use autoresponder_app::shutdown;
use autoresponder_core::account::AccountRegistry;
use autoresponder_core::config;
use autoresponder_core::ledger::Ledger;
use autoresponder_llm::ResponderClient;

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing()?;
    info!("Review autoresponder starting up");

    let config = config::load_config().context("failed to load configuration")?;
    info!(
        "Config loaded: poll every {}s, ledger at {}",
        config.poll.interval_secs, config.ledger.path
    );

    let ledger = Arc::new(Ledger::load(&config.ledger.path));

    let http = marketplace::http_client(HTTP_TIMEOUT).context("failed to build HTTP client")?;

    let responder = ResponderClient::from_config(&config, http.clone());
    match &responder {
        ResponderClient::Active(_) => info!("Responder initialized (model {})", config.responder.model),
        ResponderClient::Disabled => warn!(
            "Responder disabled (no OpenAI API key); only empty reviews will receive the fallback reply"
        ),
    }

    let accounts = AccountRegistry::from_credentials(&config.credentials);

    let (trigger, shutdown) = shutdown::channel();
    let processor = ReviewProcessor::new(
        ledger,
        Arc::new(responder),
        config.responder.fallback_reply.clone(),
        shutdown.clone(),
    );
    let poll_loop = PollLoop::new(
        accounts,
        marketplace::default_sources(&config, &http),
        processor,
        config.poll.interval(),
        shutdown,
    )
    .with_max_concurrent_accounts(config.poll.max_concurrent_accounts);

    let loop_handle = tokio::spawn(async move { poll_loop.run().await });

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl+C: {}", e);
    }
    info!("Shutdown requested");
    trigger.trigger();

    match tokio::time::timeout(SHUTDOWN_GRACE, loop_handle).await {
        Ok(Ok(cycles)) => info!("Poll loop finished after {} cycle(s)", cycles),
        Ok(Err(e)) => error!("Poll loop task failed: {}", e),
        Err(_) => warn!("Poll loop did not stop within {}s", SHUTDOWN_GRACE.as_secs()),
    }

    info!("Review autoresponder shut down cleanly");
    Ok(())
}

/// Initialize tracing to stdout with per-crate filters.
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(
                "autoresponder=info,autoresponder_app=info,autoresponder_core=info,autoresponder_llm=info,warn",
            )
        }))
        .with_target(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
