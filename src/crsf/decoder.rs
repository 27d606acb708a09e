//! # CRSF Packet Decoder
//!
//! Decodes validated CRSF payloads into typed records: RC channels and link
//! statistics on the receive path, plus battery and GPS for symmetry with
//! the encoder.
//!
//! Every decoder insists on the exact payload size of its type. A mismatch
//! is reported as [`CrsfError::PayloadLength`] so the caller can keep its
//! previous record.

use bytes::Buf;

use super::protocol::*;
use crate::error::{CrsfError, Result};

fn check_len(kind: &'static str, payload: &[u8], expected: usize) -> Result<()> {
    if payload.len() != expected {
        return Err(CrsfError::PayloadLength {
            kind,
            expected,
            actual: payload.len(),
        });
    }
    Ok(())
}

/// Decode a packed RC channels payload (22 bytes)
///
/// Channel *i* occupies bits `[11·i, 11·i + 11)` of the payload bitstream,
/// least-significant bit first within each byte.
///
/// # Examples
///
/// ```
/// use crsf_link::crsf::decoder::decode_rc_channels;
///
/// let channels = decode_rc_channels(&[0xFF; 22])?;
/// assert_eq!(channels, [2047u16; 16]);
/// # Ok::<(), crsf_link::error::CrsfError>(())
/// ```
pub fn decode_rc_channels(payload: &[u8]) -> Result<RcChannels> {
    check_len("RC channels", payload, CRSF_RC_CHANNELS_PAYLOAD_SIZE)?;

    let mut channels = [0u16; CRSF_NUM_CHANNELS];
    let mut acc: u32 = 0;
    let mut bits = 0;
    let mut index = 0;

    for &byte in payload {
        acc |= u32::from(byte) << bits;
        bits += 8;

        if bits >= CRSF_CHANNEL_BITS {
            channels[index] = (acc & u32::from(CRSF_CHANNEL_VALUE_MAX)) as u16;
            acc >>= CRSF_CHANNEL_BITS;
            bits -= CRSF_CHANNEL_BITS;
            index += 1;
        }
    }

    Ok(channels)
}

/// Decode Link Statistics telemetry packet (10 bytes, one field per byte)
pub fn decode_link_statistics(payload: &[u8]) -> Result<LinkStatistics> {
    check_len("Link statistics", payload, CRSF_LINK_STATS_PAYLOAD_SIZE)?;

    Ok(LinkStatistics {
        uplink_rssi_1: payload[0],
        uplink_rssi_2: payload[1],
        uplink_lq: payload[2],
        uplink_snr: payload[3] as i8,
        active_antenna: payload[4],
        rf_mode: payload[5],
        uplink_tx_power: payload[6],
        downlink_rssi: payload[7],
        downlink_lq: payload[8],
        downlink_snr: payload[9] as i8,
    })
}

/// Decode Battery Sensor telemetry packet (8 bytes, big-endian)
pub fn decode_battery_sensor(payload: &[u8]) -> Result<BatterySensor> {
    check_len("Battery sensor", payload, CRSF_BATTERY_SENSOR_PAYLOAD_SIZE)?;

    let mut buf = payload;
    Ok(BatterySensor {
        voltage: buf.get_u16(),
        current: buf.get_u16(),
        capacity: buf.get_uint(3) as u32,
        remaining: buf.get_u8(),
    })
}

/// Decode GPS telemetry packet (15 bytes, big-endian)
pub fn decode_gps(payload: &[u8]) -> Result<GpsData> {
    check_len("GPS", payload, CRSF_GPS_PAYLOAD_SIZE)?;

    let mut buf = payload;
    Ok(GpsData {
        latitude: buf.get_i32(),
        longitude: buf.get_i32(),
        groundspeed: buf.get_u16(),
        heading: buf.get_u16(),
        altitude: buf.get_u16(),
        satellites: buf.get_u8(),
    })
}
