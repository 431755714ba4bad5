use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;

use houston::adapters::{self, AppState, CommandAdapter, ModalSessions};
use houston::backend::StatusClient;
use houston::chat::{LoggingNotifier, Notifier};
use houston::config::HoustonConfig;
use houston::telemetry::init_telemetry;
use houston::workflow::{
    CallbackLinks, InMemoryWorkflowStore, MessageRenderer, StatusVocabulary, WorkflowEngine,
};

#[derive(Parser)]
#[command(name = "houston")]
#[command(about = "Chat-driven incident control for a status page backend")]
#[command(long_about = "Houston lets operators declare and progressively describe an incident \
                       through chat commands and callback links, then publish the finished \
                       draft to the status page backend. Start with 'houston check' to verify \
                       the backend connection, then 'houston serve'.")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the callback and command webhook server
    Serve {
        /// Bind address override (defaults to the configured server.bind)
        #[arg(long, help = "Address to listen on, e.g. 0.0.0.0:3000")]
        bind: Option<String>,
    },
    /// Verify the status backend is reachable with the configured credentials
    Check,
}

fn main() -> Result<()> {
    HoustonConfig::load_env_file()?;
    let config = HoustonConfig::load()?;
    init_telemetry(&config.observability)?;

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { bind } => {
            tokio::runtime::Runtime::new()?.block_on(serve(config, bind))
        }
        Commands::Check => tokio::runtime::Runtime::new()?.block_on(check(config)),
    }
}

async fn serve(config: HoustonConfig, bind: Option<String>) -> Result<()> {
    let backend = StatusClient::new(config.backend_base_url(), &config.backend)?;

    // Credentials are validated against the backend up front; a failure is
    // worth knowing about but must not keep the server from coming up.
    if let Err(error) = backend.check().await {
        tracing::warn!(%error, "Status backend connectivity check failed");
    }

    let vocabulary = StatusVocabulary::from(&config.vocabulary);
    let links = CallbackLinks::new(&config.chat.site_url);
    let renderer = MessageRenderer::new(&config.chat.alias, links, &config.backend_base_url());

    let store = Arc::new(InMemoryWorkflowStore::new());
    let notifier: Arc<dyn Notifier> = Arc::new(LoggingNotifier);
    let engine = Arc::new(WorkflowEngine::new(
        store,
        backend.clone(),
        vocabulary.clone(),
        renderer,
    ));
    let modals = Arc::new(ModalSessions::new(
        backend,
        notifier.clone(),
        vocabulary,
        &config.chat.alias,
    ));
    let commands = Arc::new(CommandAdapter::new(
        engine.clone(),
        modals,
        notifier.clone(),
        &config.chat.expected_room_id,
        &config.chat.system_user,
        &config.chat.alias,
    ));

    let state = AppState {
        engine,
        commands,
        notifier,
    };
    let app = adapters::router(state);

    let bind = bind.unwrap_or(config.server.bind);
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;
    tracing::info!(%bind, "Houston callback server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn check(config: HoustonConfig) -> Result<()> {
    let backend = StatusClient::new(config.backend_base_url(), &config.backend)?;
    backend.check().await?;
    println!(
        "Status backend at {} is reachable.",
        config.backend_base_url()
    );
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(%err, "Failed to listen for the shutdown signal");
    }
    tracing::info!("Shutting down");
}
