//! Web server for the PawFeed backend.
//!
//! Wires storage, the MQTT command service, the schedule runner and the REST
//! API together, and owns the shutdown order: drain HTTP first, then tear
//! down the MQTT service so every in-flight feed settles.

pub mod router;
pub mod state;

pub use router::{create_router, MAX_REQUEST_BODY_SIZE};
pub use state::AppState;

use std::net::SocketAddr;
use std::time::Duration;

use chrono_tz::Tz;
use pawfeed_core::config as core_config;
use pawfeed_core::User;
use pawfeed_mqtt::{MqttConfig, MqttService};
use pawfeed_storage::Storage;

use crate::auth::{hash_password, TokenSigner};
use crate::orchestrator::FeedOrchestrator;
use crate::scheduler::ScheduleRunner;

/// Start the server on `bind` and block until shutdown.
pub async fn run(bind: SocketAddr) -> anyhow::Result<()> {
    let storage = Storage::open(core_config::data_dir())?;
    bootstrap_operator(&storage)?;

    let mqtt_config = MqttConfig::from_env().map_err(|e| anyhow::anyhow!(e))?;
    tracing::info!(broker = %mqtt_config, "starting mqtt command service");
    let mqtt = MqttService::start(mqtt_config).await;
    if !mqtt.wait_until_connected(Duration::from_secs(10)).await {
        tracing::warn!("broker not reachable yet, feeds will fail until it is");
    }

    let timezone = load_timezone();
    let orchestrator = FeedOrchestrator::new(mqtt.dispatcher(), storage.clone());

    let runner = ScheduleRunner::new(storage.clone(), orchestrator.clone(), timezone);
    let scheduler_task = tokio::spawn(runner.run());

    let state = AppState::new(storage, orchestrator, token_signer(), timezone);
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!(%bind, "http server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler_task.abort();
    mqtt.shutdown().await;
    tracing::info!("server shutdown complete");
    Ok(())
}

/// Create the default operator account on a fresh database so the device can
/// be used before anyone registers.
fn bootstrap_operator(storage: &Storage) -> anyhow::Result<()> {
    if storage.users().any()? {
        return Ok(());
    }
    let (username, password) = core_config::bootstrap_credentials();
    let user = User::new(&username, hash_password(&password).map_err(|e| anyhow::anyhow!(e.to_string()))?);
    storage.users().create(&user)?;
    tracing::info!(%username, "bootstrapped default operator account");
    Ok(())
}

fn load_timezone() -> Tz {
    let name = core_config::app_timezone();
    name.parse().unwrap_or_else(|_| {
        tracing::warn!(timezone = %name, "unknown timezone, falling back to UTC");
        chrono_tz::UTC
    })
}

fn token_signer() -> TokenSigner {
    match core_config::jwt_secret() {
        Some(secret) => TokenSigner::new(secret.into_bytes()),
        None => {
            // An ephemeral secret keeps development friction low; sessions
            // will not survive a restart.
            tracing::warn!(
                "{} not set, using an ephemeral signing secret",
                core_config::env_vars::JWT_SECRET
            );
            let secret: [u8; 32] = rand::random();
            TokenSigner::new(secret.to_vec())
        }
    }
}

/// Resolve on ctrl-c or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
