//! # CRSF Link
//!
//! Receives RC channels and link statistics from a CRSF receiver and sends
//! battery/GPS telemetry back to the transmitter.
//!
//! Usage: `crsf-link [CONFIG_PATH]` (default `config/default.toml`).

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tokio::time::{interval, Duration};
use tracing::{info, warn};

use crsf_link::config::Config;
use crsf_link::link::{receive_loop, CrsfLink};
use crsf_link::serial::CrsfSerial;
use crsf_link::telemetry::{telemetry_loop, StaticTelemetry, TelemetryIntervals, TelemetrySender};

/// Config file used when no path is given
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Main entry point for CRSF Link
///
/// 1. Set up logging and load configuration
/// 2. Open the serial port and split it into reader and writer halves
/// 3. Run the receive loop and the telemetry loop as separate tasks, logging
///    the latest channels and link statistics periodically
/// 4. On Ctrl+C, signal both tasks to stop and wait for them
#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("CRSF Link v{} starting...", env!("CARGO_PKG_VERSION"));

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = Config::load_or_default(&config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path))?;

    let serial = CrsfSerial::open(&config.serial)?;
    info!("CRSF serial port opened at: {}", serial.device_path());
    let (reader, writer) = serial.split();

    let link = Arc::new(CrsfLink::new());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let receiver = {
        let link = Arc::clone(&link);
        let shutdown = shutdown_rx.clone();
        tokio::spawn(async move { receive_loop(reader, &link, shutdown).await })
    };

    let telemetry = if config.telemetry.enabled {
        let sender = TelemetrySender::new(writer, config.telemetry.destination);
        let source = StaticTelemetry::from_config(&config.telemetry);
        let intervals = TelemetryIntervals::from(&config.telemetry);
        Some(tokio::spawn(telemetry_loop(sender, source, intervals, shutdown_rx.clone())))
    } else {
        info!("Telemetry disabled");
        None
    };

    let mut status_interval = interval(Duration::from_millis(config.link.status_interval_ms));
    info!("Press Ctrl+C to exit");

    loop {
        tokio::select! {
            _ = status_interval.tick() => {
                let channels = link.channels();
                let stats = link.link_statistics();
                info!(
                    "CH1-4 {:?} | LQ {}% RSSI -{}dBm SNR {}dB",
                    &channels[..4], stats.uplink_lq, stats.uplink_rssi_1, stats.uplink_snr
                );
            }

            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
        }

        if receiver.is_finished() {
            warn!("Receive loop ended, shutting down...");
            break;
        }
    }

    // Receivers may already be gone if a task ended first
    let _ = shutdown_tx.send(true);

    if let Some(handle) = telemetry {
        let sender = handle.await?;
        info!("Total telemetry frames sent: {}", sender.frames_sent());
    }
    receiver.await??;

    let stats = link.reassembler_stats();
    info!(
        "Total frames received: {} ({} CRC errors)",
        stats.frames, stats.crc_errors
    );

    Ok(())
}
