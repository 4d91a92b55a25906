/*
[INPUT]:  CLI arguments, YAML configuration file, OS shutdown signals
[OUTPUT]: Session login, refresh and logout against the configured backend
[POS]:    Binary entry point
[UPDATE]: When changing CLI commands, startup flow, or shutdown handling
*/

use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use tradelink_session::{BrowserLocation, Ed25519WalletSigner, SessionConfig, SessionManager};

#[derive(Parser, Debug)]
#[command(name = "tradelink", version, about = "Tradelink session manager")]
struct Cli {
    #[arg(long = "config", value_name = "PATH")]
    config_path: Option<PathBuf>,
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    log_level: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the persisted session
    Status,
    /// Sign in by signing a challenge with a local key
    LoginWallet {
        /// Base58 secret key (32-byte seed or 64-byte keypair)
        #[arg(long = "private-key", value_name = "BASE58")]
        private_key: String,
    },
    /// Sign in with a handoff link carrying `#<token>-...-<telegramId>`
    LoginLink {
        #[arg(long = "url", value_name = "URL")]
        url: String,
    },
    /// Exchange the refresh token now
    Refresh,
    /// Revoke and forget the session
    Logout,
    /// Keep the session fresh until interrupted
    Watch,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(&args.log_level)?;

    let config = load_config(args.config_path.as_ref())?;
    info!(
        api_base_url = %config.api_base_url,
        storage_dir = %config.storage_dir.display(),
        "configuration loaded"
    );

    let manager = SessionManager::from_config(&config).context("build session manager")?;
    manager.initialize();

    let outcome = run(&manager, args.command).await;
    manager.shutdown();
    outcome
}

async fn run(manager: &SessionManager, command: Command) -> Result<()> {
    match command {
        Command::Status => print_status(manager),
        Command::LoginWallet { private_key } => {
            let signer =
                Ed25519WalletSigner::from_base58(&private_key).context("load wallet key")?;
            let user = manager
                .login_with_wallet(&signer)
                .await
                .context("wallet login")?;
            manager.settle().await;
            let address = manager
                .user()
                .map(|current| current.wallet_address)
                .unwrap_or(user.wallet_address);
            println!("Signed in as {} ({address})", user.username);
        }
        Command::LoginLink { url } => {
            let location = BrowserLocation::parse(&url).context("parse handoff url")?;
            match manager
                .login_with_link(&location)
                .await
                .context("link login")?
            {
                Some(user) => println!("Signed in as {}", user.username),
                None => return Err(anyhow!("url carries no link token")),
            }
        }
        Command::Refresh => {
            manager.refresh().await.context("refresh session")?;
            println!("Session refreshed");
        }
        Command::Logout => {
            manager.logout().await;
            println!("Logged out");
        }
        Command::Watch => {
            if !manager.is_authenticated() {
                return Err(anyhow!("no persisted session to keep alive"));
            }
            let shutdown = CancellationToken::new();
            setup_signal_handlers(shutdown.clone());
            watch_session(manager, shutdown).await;
        }
    }
    Ok(())
}

fn print_status(manager: &SessionManager) {
    let session = manager.state();
    match &session.user {
        Some(user) if session.is_authenticated() => {
            println!("Signed in as {}", user.username);
            println!("  method:  {:?}", user.auth_method());
            println!("  id:      {}", user.id);
            if !user.wallet_address.is_empty() {
                println!("  wallet:  {}", user.wallet_address);
            }
        }
        _ => println!("Not signed in"),
    }
    if let Some(error) = &session.error {
        println!("  error:   {error}");
    }
}

async fn watch_session(manager: &SessionManager, shutdown: CancellationToken) {
    let mut changes = manager.subscribe();
    info!("watching session; press ctrl-c to stop");

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("shutdown signal received");
                break;
            }
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
                let authenticated = changes.borrow_and_update().is_authenticated();
                if !authenticated {
                    warn!("session ended");
                    break;
                }
                info!("session updated");
            }
        }
    }
}

fn init_tracing(log_level: &str) -> Result<()> {
    let filter = EnvFilter::try_new(log_level).context("invalid log level")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|err| anyhow!(err))
        .context("initialize tracing subscriber")?;
    Ok(())
}

fn load_config(path: Option<&PathBuf>) -> Result<SessionConfig> {
    match path {
        Some(path) => SessionConfig::from_file(path).context("load config"),
        None => Ok(SessionConfig::default()),
    }
}

fn setup_signal_handlers(shutdown: CancellationToken) {
    let shutdown_clone = shutdown.clone();
    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to install SIGINT handler");
            return;
        }
        info!("received SIGINT");
        shutdown_clone.cancel();
    });

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let shutdown_clone = shutdown.clone();
        tokio::spawn(async move {
            match signal(SignalKind::terminate()) {
                Ok(mut stream) => {
                    stream.recv().await;
                    info!("received SIGTERM");
                    shutdown_clone.cancel();
                }
                Err(err) => {
                    warn!(error = %err, "failed to install SIGTERM handler");
                }
            }
        });
    }
}
