#![allow(missing_docs)]

//! wa-relay binary.
//!
//! `start` runs the bridge event listener, the inbound dispatch loop, and
//! the HTTP server until Ctrl-C. `status` and `pair` are one-shot bridge
//! queries.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{info, warn};

use wa_relay::config::RelayConfig;
use wa_relay::logging;
use wa_relay::relay::adapter::{MessageAdapter, PairingRenderer, TerminalRenderer};
use wa_relay::relay::webhook::BestEffortDelivery;
use wa_relay::server;
use wa_relay::whatsapp::client::WhatsAppClient;
use wa_relay::whatsapp::events::spawn_event_listener;
use wa_relay::whatsapp::session::SessionHandle;

#[derive(Parser)]
#[command(
    name = "wa-relay",
    version,
    about = "Relay WhatsApp messages to a webhook and send replies over HTTP"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the relay until interrupted.
    Start,
    /// Show the bridge connection status.
    Status,
    /// Show the bridge pairing code as a QR code.
    Pair,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    let config = RelayConfig::load().context("failed to load configuration")?;

    match cli.command {
        Command::Start => start(config).await,
        Command::Status => {
            logging::init_cli(&config.logging.level);
            status(&config).await
        }
        Command::Pair => {
            logging::init_cli(&config.logging.level);
            pair(&config).await
        }
    }
}

async fn start(config: RelayConfig) -> Result<()> {
    let _log_guard = match &config.logging.logs_dir {
        Some(dir) => Some(logging::init_production(dir, &config.logging.level)?),
        None => {
            logging::init_cli(&config.logging.level);
            None
        }
    };
    info!(version = env!("CARGO_PKG_VERSION"), "wa-relay starting");

    let delivery =
        BestEffortDelivery::new(&config.webhook.url).context("invalid webhook URL")?;
    info!(url = delivery.url(), "webhook consumer configured");

    let client = Arc::new(WhatsAppClient::new(config.bridge.base_url.clone()));
    let session = Arc::new(SessionHandle::new(client));

    let (event_tx, event_rx) = mpsc::channel(config.bridge.channel_buffer_size.max(1));
    let listener_task = spawn_event_listener(
        config.bridge.base_url.clone(),
        config.bridge.poll_timeout(),
        event_tx,
    );

    let adapter = MessageAdapter::new(Arc::clone(&session), delivery, Arc::new(TerminalRenderer));
    let adapter_task = tokio::spawn(async move { adapter.run(event_rx).await });

    let listener = TcpListener::bind(&config.server.listen)
        .await
        .with_context(|| format!("failed to bind {}", config.server.listen))?;
    let app = server::router(Arc::clone(&session), config.server.max_upload_bytes);
    server::serve(listener, app, shutdown_signal()).await?;

    listener_task.abort();
    adapter_task.abort();
    info!("wa-relay stopped");
    Ok(())
}

async fn status(config: &RelayConfig) -> Result<()> {
    let client = WhatsAppClient::new(config.bridge.base_url.clone());
    let status = client
        .status()
        .await
        .with_context(|| format!("bridge at {} is not reachable", client.base_url()))?;
    if status.connected {
        let phone = status.phone_number.as_deref().unwrap_or("unknown number");
        println!("connected ({phone})");
    } else {
        println!("not connected: run `wa-relay pair` to link a phone");
    }
    Ok(())
}

async fn pair(config: &RelayConfig) -> Result<()> {
    let client = WhatsAppClient::new(config.bridge.base_url.clone());
    let code = client
        .pairing_code()
        .await
        .context("failed to fetch pairing code")?;
    TerminalRenderer.render(&code);
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("received shutdown signal, initiating graceful shutdown");
}
