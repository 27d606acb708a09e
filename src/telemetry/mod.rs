//! # Telemetry Module
//!
//! Sends battery and GPS telemetry frames back over the transport.
//!
//! This module handles:
//! - Encoding battery/GPS records and writing them to the serial port
//! - Periodic emission from a [`TelemetrySource`] on independent intervals
//!
//! Write failures are reported to the caller and never retried; the next
//! interval simply sends fresher data.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::TelemetryConfig;
use crate::crsf::encoder::{encode_battery_frame, encode_gps_frame};
use crate::crsf::protocol::{BatterySensor, Destination, GpsData};
use crate::error::{CrsfError, Result};
use crate::serial::SerialPortIO;

/// Where periodic telemetry values come from
pub trait TelemetrySource: Send + Sync {
    /// Latest battery reading, if any
    fn battery(&self) -> Option<BatterySensor>;

    /// Latest GPS fix, if any
    fn gps(&self) -> Option<GpsData>;
}

/// Fixed values, typically from the config file
#[derive(Debug, Clone, Default)]
pub struct StaticTelemetry {
    pub battery: Option<BatterySensor>,
    pub gps: Option<GpsData>,
}

impl StaticTelemetry {
    pub fn from_config(config: &TelemetryConfig) -> Self {
        Self {
            battery: config.battery,
            gps: config.gps,
        }
    }
}

impl TelemetrySource for StaticTelemetry {
    fn battery(&self) -> Option<BatterySensor> {
        self.battery
    }

    fn gps(&self) -> Option<GpsData> {
        self.gps
    }
}

/// Encodes telemetry records and writes them to the port
pub struct TelemetrySender<W> {
    port: W,
    destination: Destination,
    frames_sent: u64,
}

impl<W: SerialPortIO> TelemetrySender<W> {
    /// Create a sender addressing every frame to `destination`
    pub fn new(port: W, destination: Destination) -> Self {
        Self {
            port,
            destination,
            frames_sent: 0,
        }
    }

    /// Send battery telemetry to the default destination
    pub async fn send_battery(&mut self, battery: &BatterySensor) -> Result<()> {
        self.send_battery_to(self.destination, battery).await
    }

    /// Send battery telemetry to `dest`
    pub async fn send_battery_to(&mut self, dest: Destination, battery: &BatterySensor) -> Result<()> {
        let frame = encode_battery_frame(dest, battery);
        self.send_frame(&frame).await
    }

    /// Send GPS telemetry to the default destination
    pub async fn send_gps(&mut self, gps: &GpsData) -> Result<()> {
        self.send_gps_to(self.destination, gps).await
    }

    /// Send GPS telemetry to `dest`
    pub async fn send_gps_to(&mut self, dest: Destination, gps: &GpsData) -> Result<()> {
        let frame = encode_gps_frame(dest, gps);
        self.send_frame(&frame).await
    }

    /// Number of frames written successfully
    pub fn frames_sent(&self) -> u64 {
        self.frames_sent
    }

    async fn send_frame(&mut self, frame: &[u8]) -> Result<()> {
        self.port
            .write_all(frame)
            .await
            .map_err(|e| CrsfError::Serial(format!("Failed to write telemetry: {}", e)))?;

        self.port
            .flush()
            .await
            .map_err(|e| CrsfError::Serial(format!("Failed to flush serial port: {}", e)))?;

        self.frames_sent += 1;
        debug!("Sent telemetry frame type 0x{:02X} ({} bytes)", frame[2], frame.len());
        Ok(())
    }
}

/// Emission periods for [`telemetry_loop`]
#[derive(Debug, Clone, Copy)]
pub struct TelemetryIntervals {
    pub battery: Duration,
    pub gps: Duration,
}

impl From<&TelemetryConfig> for TelemetryIntervals {
    fn from(config: &TelemetryConfig) -> Self {
        Self {
            battery: Duration::from_millis(config.battery_interval_ms),
            gps: Duration::from_millis(config.gps_interval_ms),
        }
    }
}

/// Send telemetry from `source` until shutdown
///
/// Returns the sender so callers can inspect or reuse it.
pub async fn telemetry_loop<W: SerialPortIO, S: TelemetrySource>(
    mut sender: TelemetrySender<W>,
    source: S,
    intervals: TelemetryIntervals,
    mut shutdown: watch::Receiver<bool>,
) -> TelemetrySender<W> {
    let mut battery_tick = interval(intervals.battery);
    let mut gps_tick = interval(intervals.gps);
    battery_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    gps_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(
        "Telemetry started (battery every {:?}, GPS every {:?})",
        intervals.battery, intervals.gps
    );

    loop {
        if *shutdown.borrow() {
            break;
        }

        tokio::select! {
            _ = battery_tick.tick() => {
                let reading = source.battery();
                if let Some(battery) = reading {
                    if let Err(e) = sender.send_battery(&battery).await {
                        warn!("Battery telemetry dropped: {}", e);
                    }
                }
            }
            _ = gps_tick.tick() => {
                let fix = source.gps();
                if let Some(gps) = fix {
                    if let Err(e) = sender.send_gps(&gps).await {
                        warn!("GPS telemetry dropped: {}", e);
                    }
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }

    info!("Telemetry stopped after {} frames", sender.frames_sent());
    sender
}
