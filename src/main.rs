//! MQTT Stream Input CLI
//!
//! Runs the embedded MQTT listener and logs the stream events it produces.

use anyhow::{Context, Result};
use clap::Parser;
use mqtt_stream_input::broker::Broker;
use mqtt_stream_input::{Dispatcher, InputEvent, MqttInputConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

/// MQTT input for data streams
#[derive(Parser, Debug)]
#[command(name = "mqtt-stream-input")]
#[command(version)]
#[command(about = "MQTT input layer for data streams", long_about = None)]
struct Args {
    /// Configuration file path (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen port (overrides the configuration file)
    #[arg(short, long)]
    port: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Enable JSON log format
    #[arg(long)]
    json_logs: bool,
}

fn load_config(args: &Args) -> Result<MqttInputConfig> {
    let mut config = match &args.config {
        Some(path) => {
            info!(path = %path.display(), "Loading configuration from file");
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        }
        None => MqttInputConfig::default(),
    };

    if let Some(port) = args.port {
        config.broker.port = port;
    }

    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    if args.json_logs {
        fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        fmt().with_env_filter(filter).with_target(true).init();
    }

    info!(version = env!("CARGO_PKG_VERSION"), "Starting MQTT stream input");

    let config = load_config(&args)?;
    let broker = Arc::new(Broker::new(&config.broker));
    let dispatcher = Arc::new(Dispatcher::from_config(config, broker.clone())?);

    let mut events = dispatcher.events().subscribe();
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                InputEvent::Data { identity, record } => {
                    info!(identity = %identity, fields = record.len(), "Stream data");
                }
                InputEvent::Clear { identity } => {
                    info!(identity = %identity, "Stream cleared");
                }
                InputEvent::Error(err) => {
                    warn!(error = %err, "Undecodable payload");
                }
            }
        }
    });

    tokio::select! {
        result = broker.run(dispatcher) => result?,
        _ = tokio::signal::ctrl_c() => info!("Shutting down"),
    }

    Ok(())
}
