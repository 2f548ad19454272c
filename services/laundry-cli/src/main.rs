//! Laundry API command-line client
//!
//! Thin host around `api_client::ApiClient`:
//! 1. Loads `[api]` and `[storage]` configuration
//! 2. Keeps credentials in a file-backed store between runs
//! 3. Runs one command and prints the payload as JSON on stdout
//!
//! Notifications go to stderr. Logs are JSON on stderr as well.

mod command;
mod config;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use api_client::{ApiClient, Hooks, NormalizedError, Notifier, SessionHandler};
use laundry_auth::{Credentials, FileStore};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use transport::ReqwestTransport;

use crate::command::{Command, USAGE};
use crate::config::Config;

/// Prints user-facing messages on stderr.
struct StderrNotifier;

impl Notifier for StderrNotifier {
    fn notify(&self, message: &str) {
        eprintln!("{message}");
    }
}

/// The CLI's sign-in entry point is the `login` command.
struct LoginHint;

impl SessionHandler for LoginHint {
    fn session_expired(&self) {
        eprintln!("Run `laundry-api login EMAIL PASSWORD` to sign in again.");
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // JSON logs on stderr with LOG_LEVEL / RUST_LOG support; stdout is for payloads
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
        .init();

    let invocation = match command::parse(std::env::args().skip(1)) {
        Ok(invocation) => invocation,
        Err(e) => {
            eprintln!("{e}\n\n{USAGE}");
            return Ok(ExitCode::from(2));
        }
    };

    let config_path = Config::resolve_path(invocation.config_path.as_deref());
    debug!(path = %config_path.display(), "loading configuration");

    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    info!(
        base_url = %config.api.base_url,
        store = %config.storage.path.display(),
        headers = config.api.headers.len(),
        "configuration loaded"
    );

    let store = FileStore::load(config.storage.path.clone())
        .await
        .with_context(|| {
            format!(
                "failed to open credential store {}",
                config.storage.path.display()
            )
        })?;
    let credentials = Credentials::new(Arc::new(store), config.storage.ttl());

    let http = reqwest::Client::builder()
        .build()
        .context("failed to build HTTP client")?;
    let transport = ReqwestTransport::new(http, config.api.timeout());

    let client = ApiClient::new(
        &config.api,
        Arc::new(transport),
        credentials,
        Hooks {
            notifier: Arc::new(StderrNotifier),
            session: Arc::new(LoginHint),
        },
    );

    match run(&client, invocation.command).await? {
        Ok(payload) => {
            print_json(&payload)?;
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            print_json(&err)?;
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Outer error: the CLI itself broke. Inner error: the API call failed and
/// has already been announced.
async fn run(
    client: &ApiClient,
    command: Command,
) -> Result<std::result::Result<serde_json::Value, NormalizedError>> {
    let outcome = match command {
        Command::Login { email, password } => client
            .login(&serde_json::json!({ "email": email, "password": password }))
            .await
            .map(|login| {
                serde_json::json!({
                    "signedIn": true,
                    "user": login.user,
                    "expiresIn": login.expires_in,
                })
            }),
        Command::Logout => {
            client
                .logout()
                .await
                .context("failed to clear stored credentials")?;
            Ok(serde_json::json!({ "signedIn": false }))
        }
        Command::Whoami => Ok(client
            .current_user()
            .await
            .unwrap_or(serde_json::Value::Null)),
        Command::Call { method, path, body } => client.request(method, &path, body).await,
    };
    Ok(outcome)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("failed to render output")?;
    println!("{rendered}");
    Ok(())
}
