// session-recovery - Resilient request execution and idempotent session recovery
// Author: kelexine (https://github.com/kelexine)

use anyhow::Result;
use clap::Parser;
use session_recovery::cli::{Args, Command};
use session_recovery::client::ApiClient;
use session_recovery::config::AppConfig;
use session_recovery::events::AuthEventBus;
use session_recovery::metrics::gather_metrics;
use session_recovery::session::memory::{
    MemoryCookieJar, MemorySessionStore, MemoryStorage, RecordingNavigator,
};
use session_recovery::session::provider::HttpSignOut;
use session_recovery::session::{
    KeyValueStorage, SessionGuard, TeardownCollaborators, TokenInspector,
};
use session_recovery::utils::logging;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Phase 1: Load configuration
    let config = AppConfig::load()?;

    // Phase 2: Initialize logging
    logging::init(&config.logging)?;
    info!("Starting session-recovery v{}", env!("CARGO_PKG_VERSION"));

    match args.command {
        Command::Config => {
            print!("{}", config.to_toml()?);
            Ok(())
        }
        Command::Inspect { token } => inspect(&config, token.as_deref()),
        Command::Fetch {
            path,
            token,
            metrics,
        } => fetch(&config, &path, token, metrics).await,
    }
}

fn inspect(config: &AppConfig, token: Option<&str>) -> Result<()> {
    let inspector = TokenInspector::new();

    match inspector.decode(token) {
        Some(session) => {
            println!("{}", serde_json::to_string_pretty(&session)?);
            if session.is_expired(config.session.expiry_buffer_seconds) {
                warn!(
                    "Session is expired or about to expire ({}s left)",
                    session.expires_in_seconds()
                );
            }
        }
        None => println!("No usable session"),
    }

    Ok(())
}

async fn fetch(config: &AppConfig, path: &str, token: Option<String>, metrics: bool) -> Result<()> {
    let retry = config.retry.to_retry_config()?;
    let inspector = Arc::new(TokenInspector::new());

    // Phase 3: Wire session recovery (bus -> guard)
    let signout_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.http.timeout_seconds))
        .use_rustls_tls()
        .build()?;

    let collaborators = TeardownCollaborators {
        session_store: Arc::new(MemorySessionStore::new()),
        storages: vec![
            Arc::new(MemoryStorage::new("session")) as Arc<dyn KeyValueStorage>,
            Arc::new(MemoryStorage::new("local")) as Arc<dyn KeyValueStorage>,
        ],
        cookie_jar: Arc::new(MemoryCookieJar::new()),
        provider: Arc::new(HttpSignOut::new(
            signout_client,
            &config.http.base_url,
            &config.http.signout_path,
        )),
        navigator: Arc::new(RecordingNavigator::new()),
    };

    let guard = SessionGuard::new(
        config.session.teardown_settings(),
        collaborators,
        Arc::clone(&inspector),
    );
    let bus = Arc::new(AuthEventBus::new());
    guard.attach(&bus);

    // Phase 4: Build the retrying client
    let client = ApiClient::new(&config.http, retry, bus.clone(), inspector)?;
    client.set_bearer_token(token);

    if let Some(session) = client.session_claims() {
        info!(
            subject = %session.subject_id,
            role = session.role_id,
            "Session expires in {}s",
            session.expires_in_seconds()
        );
    }

    // Phase 5: Run the request, then let any teardown finish
    let result = client.get_json::<serde_json::Value>(path).await;
    guard.wait_idle().await;

    if metrics {
        eprintln!("{}", gather_metrics());
    }

    match result {
        Ok(body) => {
            println!("{}", serde_json::to_string_pretty(&body)?);
            Ok(())
        }
        Err(e) => {
            if e.is_auth_failure() {
                error!(
                    "Session invalidated; {} teardown episode(s) completed",
                    guard.completed_episodes()
                );
            }
            Err(e.into())
        }
    }
}
