//! # CRSF Protocol Constants and Types
//!
//! Core protocol definitions for CRSF (Crossfire) communication between a
//! receiver and a flight controller.
//!
//! Wire layout of every frame:
//!
//! ```text
//! [destination] [length] [type] [payload: length - 2 bytes] [crc]
//! ```
//!
//! `length` counts type + payload + crc. The CRC covers type + payload.

use serde::Deserialize;

use crate::error::{CrsfError, Result};

/// Flight controller destination tag (also the usual sync byte)
pub const CRSF_ADDRESS_FLIGHT_CONTROLLER: u8 = 0xC8;

/// Radio transmitter destination tag
pub const CRSF_ADDRESS_RADIO_TRANSMITTER: u8 = 0xEA;

/// GPS packet type
pub const CRSF_FRAMETYPE_GPS: u8 = 0x02;

/// Battery Sensor packet type
pub const CRSF_FRAMETYPE_BATTERY_SENSOR: u8 = 0x08;

/// Barometric altitude packet type
pub const CRSF_FRAMETYPE_BARO_ALTITUDE: u8 = 0x09;

/// Link Statistics packet type
pub const CRSF_FRAMETYPE_LINK_STATISTICS: u8 = 0x14;

/// RC Channels packet type
pub const CRSF_FRAMETYPE_RC_CHANNELS_PACKED: u8 = 0x16;

/// Attitude packet type
pub const CRSF_FRAMETYPE_ATTITUDE: u8 = 0x1E;

/// Maximum CRSF payload size
/// Frame structure: dest(1) + length(1) + type(1) + payload(N) + crc(1)
/// Maximum frame size is 64 bytes, so max payload = 64 - 4 = 60 bytes
pub const CRSF_MAX_PAYLOAD_SIZE: usize = 60;

/// Smallest legal length byte (type + crc, empty payload)
pub const CRSF_FRAME_LENGTH_MIN: u8 = 2;

/// RC channels payload size (22 bytes for 16 channels × 11 bits)
pub const CRSF_RC_CHANNELS_PAYLOAD_SIZE: usize = 22;

/// Largest length byte accepted on receive (type + channels payload + crc)
///
/// Every frame type this crate recognises fits; anything longer is treated
/// as a corrupted length so it cannot hold back the frames behind it.
pub const CRSF_FRAME_LENGTH_MAX: u8 = (CRSF_RC_CHANNELS_PAYLOAD_SIZE + 2) as u8;

/// RC channels frame length (type + payload + crc)
pub const CRSF_RC_CHANNELS_FRAME_LENGTH: u8 = 0x18; // 24 bytes

/// Number of RC channels
pub const CRSF_NUM_CHANNELS: usize = 16;

/// Bits per packed RC channel
pub const CRSF_CHANNEL_BITS: usize = 11;

/// Channel value range (11-bit: 0-2047)
pub const CRSF_CHANNEL_VALUE_MIN: u16 = 0;
pub const CRSF_CHANNEL_VALUE_MAX: u16 = 2047;
pub const CRSF_CHANNEL_VALUE_CENTER: u16 = 1024;

/// Link Statistics payload size
pub const CRSF_LINK_STATS_PAYLOAD_SIZE: usize = 10;

/// Battery Sensor payload size
pub const CRSF_BATTERY_SENSOR_PAYLOAD_SIZE: usize = 8;

/// GPS payload size
pub const CRSF_GPS_PAYLOAD_SIZE: usize = 15;

/// Offset added to GPS altitude on the wire (metres)
pub const CRSF_GPS_ALTITUDE_OFFSET_M: i32 = 1000;

/// Frame routing tag, first byte of every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Destination {
    /// Flight controller (0xC8)
    FlightController,
    /// Radio transmitter (0xEA)
    Radio,
}

impl Destination {
    /// Whether `byte` can start a frame
    pub fn is_sync_byte(byte: u8) -> bool {
        Self::try_from(byte).is_ok()
    }
}

impl From<Destination> for u8 {
    fn from(dest: Destination) -> u8 {
        match dest {
            Destination::FlightController => CRSF_ADDRESS_FLIGHT_CONTROLLER,
            Destination::Radio => CRSF_ADDRESS_RADIO_TRANSMITTER,
        }
    }
}

impl TryFrom<u8> for Destination {
    type Error = CrsfError;

    fn try_from(byte: u8) -> Result<Self> {
        match byte {
            CRSF_ADDRESS_FLIGHT_CONTROLLER => Ok(Destination::FlightController),
            CRSF_ADDRESS_RADIO_TRANSMITTER => Ok(Destination::Radio),
            other => Err(CrsfError::UnknownDestination(other)),
        }
    }
}

/// Payload kinds recognised by this crate.
///
/// Only link statistics and RC channels are decoded on the receive path and
/// only battery and GPS are encoded; altitude and attitude are recognised so
/// that they are not mistaken for garbage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameType {
    Gps,
    BatterySensor,
    BaroAltitude,
    LinkStatistics,
    RcChannelsPacked,
    Attitude,
}

impl From<FrameType> for u8 {
    fn from(frame_type: FrameType) -> u8 {
        match frame_type {
            FrameType::Gps => CRSF_FRAMETYPE_GPS,
            FrameType::BatterySensor => CRSF_FRAMETYPE_BATTERY_SENSOR,
            FrameType::BaroAltitude => CRSF_FRAMETYPE_BARO_ALTITUDE,
            FrameType::LinkStatistics => CRSF_FRAMETYPE_LINK_STATISTICS,
            FrameType::RcChannelsPacked => CRSF_FRAMETYPE_RC_CHANNELS_PACKED,
            FrameType::Attitude => CRSF_FRAMETYPE_ATTITUDE,
        }
    }
}

impl TryFrom<u8> for FrameType {
    type Error = CrsfError;

    fn try_from(byte: u8) -> Result<Self> {
        match byte {
            CRSF_FRAMETYPE_GPS => Ok(FrameType::Gps),
            CRSF_FRAMETYPE_BATTERY_SENSOR => Ok(FrameType::BatterySensor),
            CRSF_FRAMETYPE_BARO_ALTITUDE => Ok(FrameType::BaroAltitude),
            CRSF_FRAMETYPE_LINK_STATISTICS => Ok(FrameType::LinkStatistics),
            CRSF_FRAMETYPE_RC_CHANNELS_PACKED => Ok(FrameType::RcChannelsPacked),
            CRSF_FRAMETYPE_ATTITUDE => Ok(FrameType::Attitude),
            other => Err(CrsfError::UnknownFrameType(other)),
        }
    }
}

/// RC channels array type (16 channels, 11-bit values)
pub type RcChannels = [u16; CRSF_NUM_CHANNELS];

/// Link statistics telemetry data
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkStatistics {
    /// Uplink RSSI (antenna 1) in -dBm
    pub uplink_rssi_1: u8,

    /// Uplink RSSI (antenna 2) in -dBm (diversity)
    pub uplink_rssi_2: u8,

    /// Uplink link quality (0-100%)
    pub uplink_lq: u8,

    /// Uplink SNR in dB
    pub uplink_snr: i8,

    /// Active antenna (0 or 1)
    pub active_antenna: u8,

    /// RF profile (0 = 4fps, 1 = 50fps, 2 = 150fps)
    pub rf_mode: u8,

    /// Uplink TX power enum (0mW, 10mW, 25mW, 100mW, 500mW, 1000mW, 2000mW, 250mW, 50mW)
    pub uplink_tx_power: u8,

    /// Downlink RSSI in -dBm
    pub downlink_rssi: u8,

    /// Downlink link quality (0-100%)
    pub downlink_lq: u8,

    /// Downlink SNR in dB
    pub downlink_snr: i8,
}

/// Battery sensor telemetry data, in wire units
///
/// Encoding truncates each field to its wire width: `capacity` keeps only
/// its low 24 bits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct BatterySensor {
    /// Battery voltage in 0.1 V steps
    pub voltage: u16,

    /// Current draw in 0.1 A steps
    pub current: u16,

    /// Capacity used in mAh (24 bits on the wire)
    pub capacity: u32,

    /// Battery remaining percentage (0-100%)
    pub remaining: u8,
}

/// GPS telemetry data, in wire units
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct GpsData {
    /// Latitude in degrees × 10^7
    pub latitude: i32,

    /// Longitude in degrees × 10^7
    pub longitude: i32,

    /// Ground speed in 0.1 km/h steps
    pub groundspeed: u16,

    /// Heading in 0.01 degree steps
    ///
    /// This scale has not been confirmed against hardware; receivers have
    /// been seen displaying it incorrectly.
    pub heading: u16,

    /// Altitude in metres plus 1000
    pub altitude: u16,

    /// Number of satellites
    pub satellites: u8,
}

impl GpsData {
    /// Altitude in metres with the wire offset removed
    pub fn altitude_meters(&self) -> i32 {
        self.altitude as i32 - CRSF_GPS_ALTITUDE_OFFSET_M
    }
}

/// Validated CRSF frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrsfFrame {
    /// Destination (sync) byte the frame arrived with
    pub destination: Destination,

    /// Frame type
    pub frame_type: u8,

    /// Payload data
    pub payload: Vec<u8>,
}

impl CrsfFrame {
    /// Typed view of the frame type byte
    pub fn kind(&self) -> Result<FrameType> {
        FrameType::try_from(self.frame_type)
    }
}
