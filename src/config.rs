//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//!
//! Every field has a default, so an empty file (or no file at all) yields a
//! working setup: 420,000 baud on `/dev/ttyACM0`, telemetry addressed to
//! the flight controller, battery every second and GPS every 200 ms.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::info;

use crate::crsf::protocol::{BatterySensor, Destination, GpsData};
use crate::error::{CrsfError, Result};
use crate::serial::CRSF_BAUD_RATE;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub serial: SerialConfig,

    #[serde(default)]
    pub telemetry: TelemetryConfig,

    #[serde(default)]
    pub link: LinkConfig,
}

/// Serial port configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SerialConfig {
    #[serde(default = "default_serial_port")]
    pub port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// Longest a single read waits before reporting "nothing available"
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,

    /// Try common device paths when `port` cannot be opened
    #[serde(default = "default_fallback")]
    pub fallback: bool,
}

/// Outbound telemetry configuration
#[derive(Debug, Deserialize, Clone)]
pub struct TelemetryConfig {
    #[serde(default = "default_telemetry_enabled")]
    pub enabled: bool,

    #[serde(default = "default_destination")]
    pub destination: Destination,

    #[serde(default = "default_battery_interval_ms")]
    pub battery_interval_ms: u64,

    #[serde(default = "default_gps_interval_ms")]
    pub gps_interval_ms: u64,

    /// Fixed battery values to report (bench testing)
    #[serde(default)]
    pub battery: Option<BatterySensor>,

    /// Fixed GPS values to report (bench testing)
    #[serde(default)]
    pub gps: Option<GpsData>,
}

/// Receive-side configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LinkConfig {
    /// How often the latest channels and link statistics are logged
    #[serde(default = "default_status_interval_ms")]
    pub status_interval_ms: u64,
}

// Default value functions
fn default_serial_port() -> String { "/dev/ttyACM0".to_string() }
fn default_baud_rate() -> u32 { CRSF_BAUD_RATE }
fn default_read_timeout_ms() -> u64 { 20 }
fn default_fallback() -> bool { true }

fn default_telemetry_enabled() -> bool { true }
fn default_destination() -> Destination { Destination::FlightController }
fn default_battery_interval_ms() -> u64 { 1000 }
fn default_gps_interval_ms() -> u64 { 200 }

fn default_status_interval_ms() -> u64 { 1000 }

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: default_serial_port(),
            baud_rate: default_baud_rate(),
            read_timeout_ms: default_read_timeout_ms(),
            fallback: default_fallback(),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: default_telemetry_enabled(),
            destination: default_destination(),
            battery_interval_ms: default_battery_interval_ms(),
            gps_interval_ms: default_gps_interval_ms(),
            battery: None,
            gps: None,
        }
    }
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            status_interval_ms: default_status_interval_ms(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use crsf_link::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Load `path` if it exists, otherwise use defaults
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            info!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        if self.serial.port.is_empty() {
            return Err(invalid("serial port cannot be empty"));
        }

        if ![115200, 400000, 416666, 420000, 921600, 1870000, 3750000].contains(&self.serial.baud_rate) {
            return Err(invalid(
                "baud_rate must be one of: 115200, 400000, 416666, 420000, 921600, 1870000, 3750000",
            ));
        }

        if self.serial.read_timeout_ms == 0 || self.serial.read_timeout_ms > 1000 {
            return Err(invalid("read_timeout_ms must be between 1 and 1000"));
        }

        if self.telemetry.battery_interval_ms == 0 || self.telemetry.battery_interval_ms > 60000 {
            return Err(invalid("battery_interval_ms must be between 1 and 60000"));
        }

        if self.telemetry.gps_interval_ms == 0 || self.telemetry.gps_interval_ms > 60000 {
            return Err(invalid("gps_interval_ms must be between 1 and 60000"));
        }

        if let Some(battery) = &self.telemetry.battery {
            if battery.remaining > 100 {
                return Err(invalid("battery remaining must be between 0 and 100"));
            }
        }

        if let Some(gps) = &self.telemetry.gps {
            if !(-900_000_000..=900_000_000).contains(&gps.latitude) {
                return Err(invalid("gps latitude must be within ±90° (degrees × 10^7)"));
            }
            if !(-1_800_000_000..=1_800_000_000).contains(&gps.longitude) {
                return Err(invalid("gps longitude must be within ±180° (degrees × 10^7)"));
            }
            if gps.heading >= 36000 {
                return Err(invalid("gps heading must be below 36000 (degrees × 100)"));
            }
        }

        if self.link.status_interval_ms == 0 || self.link.status_interval_ms > 60000 {
            return Err(invalid("status_interval_ms must be between 1 and 60000"));
        }

        Ok(())
    }
}

fn invalid(msg: &str) -> CrsfError {
    CrsfError::Config(toml::de::Error::custom(msg))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert!(config.validate().is_ok());
        assert_eq!(config.serial.port, "/dev/ttyACM0");
        assert_eq!(config.serial.baud_rate, CRSF_BAUD_RATE);
        assert_eq!(config.telemetry.destination, Destination::FlightController);
        assert!(config.telemetry.battery.is_none());
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.serial.read_timeout_ms, 20);
        assert_eq!(config.telemetry.gps_interval_ms, 200);
        assert_eq!(config.link.status_interval_ms, 1000);
    }

    #[test]
    fn test_load_config_from_file() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let toml_content = r#"
[serial]
port = "/dev/ttyUSB0"
baud_rate = 921600

[telemetry]
destination = "radio"
battery_interval_ms = 500

[telemetry.battery]
voltage = 168
current = 52
capacity = 1300
remaining = 80

[telemetry.gps]
latitude = 424242000
longitude = 565656000
groundspeed = 420
heading = 9000
altitude = 1005
satellites = 8
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = Config::load(temp_file.path()).unwrap();
        assert_eq!(config.serial.port, "/dev/ttyUSB0");
        assert_eq!(config.serial.baud_rate, 921600);
        assert_eq!(config.telemetry.destination, Destination::Radio);
        assert_eq!(config.telemetry.battery_interval_ms, 500);
        assert_eq!(config.telemetry.battery.unwrap().voltage, 168);
        assert_eq!(config.telemetry.gps.unwrap().satellites, 8);
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_default(dir.path().join("missing.toml")).unwrap();
        assert_eq!(config.serial.port, "/dev/ttyACM0");
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = Config::load(dir.path().join("missing.toml"));
        assert!(matches!(result, Err(CrsfError::Io(_))));
    }

    #[test]
    fn test_unknown_destination_rejected() {
        let result = Config::from_toml("[telemetry]\ndestination = \"ground_station\"\n");
        assert!(matches!(result, Err(CrsfError::Config(_))));
    }

    #[test]
    fn test_empty_serial_port() {
        let mut config = Config::default();
        config.serial.port = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_baud_rate() {
        let mut config = Config::default();
        config.serial.baud_rate = 9600;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_read_timeout_bounds() {
        let mut config = Config::default();
        config.serial.read_timeout_ms = 0;
        assert!(config.validate().is_err());

        config.serial.read_timeout_ms = 1001;
        assert!(config.validate().is_err());

        config.serial.read_timeout_ms = 1000;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_telemetry_interval_zero() {
        let mut config = Config::default();
        config.telemetry.battery_interval_ms = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.telemetry.gps_interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_status_interval_too_high() {
        let mut config = Config::default();
        config.link.status_interval_ms = 60001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_battery_remaining_over_100() {
        let mut config = Config::default();
        config.telemetry.battery = Some(BatterySensor {
            remaining: 101,
            ..BatterySensor::default()
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_gps_out_of_range() {
        let mut config = Config::default();
        config.telemetry.gps = Some(GpsData {
            latitude: 900_000_001,
            ..GpsData::default()
        });
        assert!(config.validate().is_err());

        config.telemetry.gps = Some(GpsData {
            heading: 36000,
            ..GpsData::default()
        });
        assert!(config.validate().is_err());

        config.telemetry.gps = Some(GpsData {
            latitude: -900_000_000,
            longitude: 1_800_000_000,
            heading: 35999,
            ..GpsData::default()
        });
        assert!(config.validate().is_ok());
    }
}
