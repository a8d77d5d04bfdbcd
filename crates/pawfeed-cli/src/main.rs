//! Command-line interface for the PawFeed backend.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use pawfeed_core::{amount_in_range, config as core_config, MAX_FEED_AMOUNT, MIN_FEED_AMOUNT};
use pawfeed_mqtt::{FeedCommand, MqttConfig, MqttService};

/// PawFeed - IoT pet feeder backend.
#[derive(Parser, Debug)]
#[command(name = "pawfeed")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Action to perform.
    #[command(subcommand)]
    command: Command,

    /// Verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Command {
    /// Start the REST server (MQTT service and schedule runner included).
    Serve {
        /// Host to bind to.
        #[arg(long, default_value = "0.0.0.0")]
        host: String,
        /// Port to bind to. Defaults to the PORT environment variable.
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Dispatch a single manual feed and wait for the device acknowledgment.
    Feed {
        /// Amount to dispense in grams.
        #[arg(short, long, default_value_t = 10)]
        amount: u32,
        /// Seconds to wait for the broker handshake.
        #[arg(long, default_value_t = 10)]
        connect_timeout: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    match args.command {
        Command::Serve { host, port } => run_server(host, port).await,
        Command::Feed {
            amount,
            connect_timeout,
        } => run_feed(amount, connect_timeout).await,
    }
}

fn init_logging(verbose: bool) {
    let default_directive = if verbose { "pawfeed=debug" } else { "pawfeed=info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| {
            tracing_subscriber::EnvFilter::new(default_directive)
                .add_directive(tracing::Level::INFO.into())
        });

    if core_config::log_json() {
        // JSON format for production/container environments
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    } else {
        // Human-readable format for development
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .compact()
            .init();
    }
}

/// Run the web server.
async fn run_server(host: String, port: Option<u16>) -> Result<()> {
    let port = port.unwrap_or_else(core_config::port);
    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .map_err(|_| anyhow::anyhow!("Invalid address: {}:{}", host, port))?;

    pawfeed_api::run(addr).await
}

/// Dispatch one manual feed from the command line.
async fn run_feed(amount: u32, connect_timeout: u64) -> Result<()> {
    if !amount_in_range(amount) {
        anyhow::bail!(
            "Amount must be between {} and {} grams",
            MIN_FEED_AMOUNT,
            MAX_FEED_AMOUNT
        );
    }

    let config = MqttConfig::from_env().map_err(|e| anyhow::anyhow!(e))?;
    println!("Connecting to {}...", config);
    let service = MqttService::start(config).await;

    if !service
        .wait_until_connected(Duration::from_secs(connect_timeout))
        .await
    {
        service.shutdown().await;
        anyhow::bail!("Broker not reachable within {}s", connect_timeout);
    }

    println!("Dispatching manual feed of {} grams...", amount);
    let result = service
        .dispatcher()
        .dispatch(FeedCommand::manual("cli", amount))
        .await;

    let outcome = match result {
        Ok(ack) => {
            println!("Feed acknowledged by device.");
            if !ack.extra.is_empty() {
                println!(
                    "Device reported: {}",
                    serde_json::Value::Object(ack.extra.clone())
                );
            }
            Ok(())
        }
        Err(e) => Err(anyhow::anyhow!("Feed failed: {}", e)),
    };

    service.shutdown().await;
    outcome
}
