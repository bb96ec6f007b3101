use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use gamehub_auth::{
    AppWindow, AuthError, AuthFlowCoordinator, AuthorizationUrlBuilder, CallbackExchangeHandler,
    CallbackServer, CallbackServerConfig, FlowConfig, FlowId, GoogleProvider,
    InMemoryOutcomeStore, InMemorySessionStore, ProviderConfig, SessionStore, SystemBrowser,
};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "gamehub-auth",
    about = "Sign in to the game hub with Google and print the session identity as JSON."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the full sign-in flow in the system browser.
    Login {
        /// Give up after this many seconds (0 waits forever).
        #[arg(long, default_value_t = 300)]
        timeout_secs: u64,
        /// How often to check whether the sign-in window is still open.
        #[arg(long, default_value_t = 1000)]
        poll_ms: u64,
    },
    /// Print an authorization URL without starting a flow.
    Url,
}

#[tokio::main]
async fn main() -> Result<(), AuthError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("gamehub_auth=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Login {
            timeout_secs,
            poll_ms,
        } => run_login(timeout_secs, poll_ms).await,
        Command::Url => print_url(),
    }
}

async fn run_login(timeout_secs: u64, poll_ms: u64) -> Result<(), AuthError> {
    let provider = GoogleProvider;
    let provider_config = ProviderConfig::from_env(&provider, GoogleProvider::default_redirect_uri())?;
    let timeout = (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs));
    let flow_config = FlowConfig::from_env(&provider_config)?
        .with_timeout(timeout)
        .with_poll_interval(Duration::from_millis(poll_ms.max(1)));

    let window = AppWindow::new(flow_config.app_origin.clone());
    let outcomes = InMemoryOutcomeStore::shared();
    let session = InMemorySessionStore::global();

    let server_config = CallbackServerConfig::from_redirect_uri(&provider_config.redirect_uri)?;
    let handler = CallbackExchangeHandler::new(&provider, &flow_config)?;
    let server = CallbackServer::new(server_config, handler, window.clone())
        .with_outcome_store(outcomes.clone())
        .spawn()
        .await?;

    let coordinator = AuthFlowCoordinator::new(
        provider,
        provider_config,
        flow_config,
        window,
        Arc::new(SystemBrowser::new()),
        session.clone(),
    )?
    .with_outcome_store(outcomes);

    eprintln!("Complete the sign-in in your browser...");
    let result = coordinator.start().await;
    server.shutdown().await;

    let identity = result?;
    tracing::debug!(authenticated = session.is_authenticated(), "Session updated.");
    let output = serde_json::to_string_pretty(&identity).map_err(std::io::Error::from)?;
    println!("{output}");
    Ok(())
}

fn print_url() -> Result<(), AuthError> {
    let provider = GoogleProvider;
    let provider_config = ProviderConfig::from_env(&provider, GoogleProvider::default_redirect_uri())?;
    let builder = AuthorizationUrlBuilder::new(&provider, provider_config)?;
    let request = builder.build(&FlowId::generate()?);
    println!("{}", request.authorization_url);
    Ok(())
}
