mod app;
mod session;
mod store;
mod supervisor;
mod ui;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::time::Duration;

use salsa_server::auth::jwt;
use salsa_server::config::{DEFAULT_JWT_SECRET, DEFAULT_PORT};
use store::{CredentialStore, FileCredentialStore};
use supervisor::Supervisor;

/// How long `connect` waits for a freshly started server to accept connections.
const STARTUP_DEADLINE: Duration = Duration::from_secs(5);

/// Salsa terminal chat
#[derive(Parser, Debug)]
#[command(name = "salsa", version, about = "Salsa terminal chat")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the server if needed, then open a chat session
    Connect {
        /// Username whose cached credential is presented (default: OS user)
        #[arg(long, short)]
        user: Option<String>,

        /// Server host
        #[arg(long, default_value = "localhost")]
        host: String,

        /// Server port
        #[arg(long, env = "SALSA_PORT", default_value_t = DEFAULT_PORT)]
        port: u16,
    },
    /// Stop the background server
    Stop,
    /// Issue a credential with the shared secret and cache it locally
    Token {
        username: String,

        /// Credential lifetime in seconds
        #[arg(long, default_value_t = jwt::DEFAULT_TOKEN_TTL_SECS)]
        ttl_secs: i64,

        /// Signing secret shared with the server
        #[arg(long, env = "SALSA_JWT_SECRET", default_value = DEFAULT_JWT_SECRET, hide_env_values = true)]
        secret: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Connect { user, host, port } => connect(user, &host, port).await,
        Command::Stop => stop(),
        Command::Token {
            username,
            ttl_secs,
            secret,
        } => issue(&username, ttl_secs, &secret),
    }
}

async fn connect(user: Option<String>, host: &str, port: u16) -> Result<()> {
    let username = user.unwrap_or_else(whoami::username);
    let store = FileCredentialStore::default_location();
    let token = store.load(&username)?.with_context(|| {
        format!("no cached credential for {username:?}; run `salsa token {username}` first")
    })?;

    let sup = Supervisor::default_location();
    if !sup.is_server_running() {
        println!("Salsa server not running. Starting it in background...");
        let pid = sup.start_server(port)?;
        tracing::debug!(pid, pid_file = %sup.pid_file().display(), "Recorded server PID");
    }
    supervisor::wait_until_ready(host, port, STARTUP_DEADLINE).await?;

    let url = format!("ws://{host}:{port}/ws?token={token}");
    session::run(&url, &username).await
}

fn stop() -> Result<()> {
    let sup = Supervisor::default_location();
    if sup.stop_server()? {
        println!("Salsa server stopped.");
    } else {
        println!("Salsa server not running.");
    }
    Ok(())
}

fn issue(username: &str, ttl_secs: i64, secret: &str) -> Result<()> {
    let store = FileCredentialStore::default_location();
    // Validate before minting so a bad name never yields a token
    let path = store.path_for(username)?;
    let token = jwt::issue_token(secret.as_bytes(), username, ttl_secs)
        .context("can't issue credential")?;
    store.save(username, &token)?;
    println!("Credential for {username} saved to {}", path.display());
    Ok(())
}
