//! # CRSF Packet Encoder
//!
//! Builds outbound CRSF frames: battery and GPS telemetry, plus packed RC
//! channels for simulating a receiver.
//!
//! Multi-byte fields are written big-endian through [`bytes::BufMut`],
//! independent of host byte order. Values are truncated to their wire width
//! without range errors.

use bytes::{BufMut, BytesMut};

use super::crc::frame_crc;
use super::protocol::*;
use crate::error::{CrsfError, Result};

/// Encode a complete frame `[dest][length][type][payload][crc]`
///
/// # Errors
///
/// Returns error if payload exceeds CRSF_MAX_PAYLOAD_SIZE (60 bytes)
///
/// # Examples
///
/// ```
/// use crsf_link::crsf::encoder::encode_frame;
/// use crsf_link::crsf::protocol::{Destination, FrameType};
///
/// let frame = encode_frame(Destination::FlightController, FrameType::Attitude, &[0u8; 6])?;
/// assert_eq!(frame.len(), 10);
/// assert_eq!(frame[1], 8);
/// # Ok::<(), crsf_link::error::CrsfError>(())
/// ```
pub fn encode_frame(dest: Destination, frame_type: FrameType, payload: &[u8]) -> Result<Vec<u8>> {
    if payload.len() > CRSF_MAX_PAYLOAD_SIZE {
        return Err(CrsfError::CrsfProtocol(format!(
            "Payload size {} exceeds maximum {}",
            payload.len(),
            CRSF_MAX_PAYLOAD_SIZE
        )));
    }

    Ok(build_frame(dest, frame_type, payload))
}

/// Frame builder for payloads already known to fit
fn build_frame(dest: Destination, frame_type: FrameType, payload: &[u8]) -> Vec<u8> {
    let type_byte = u8::from(frame_type);

    let mut frame = BytesMut::with_capacity(payload.len() + 4);
    frame.put_u8(dest.into());
    frame.put_u8((payload.len() + 2) as u8);
    frame.put_u8(type_byte);
    frame.put_slice(payload);
    frame.put_u8(frame_crc(type_byte, payload));

    frame.to_vec()
}

/// Encode battery telemetry into its 8-byte payload
///
/// Layout: voltage(2) current(2) capacity(3) remaining(1), big-endian.
pub fn encode_battery_payload(battery: &BatterySensor) -> [u8; CRSF_BATTERY_SENSOR_PAYLOAD_SIZE] {
    let mut payload = [0u8; CRSF_BATTERY_SENSOR_PAYLOAD_SIZE];
    let mut buf = &mut payload[..];

    buf.put_u16(battery.voltage);
    buf.put_u16(battery.current);
    // Only the low 24 bits go on the wire
    buf.put_uint(u64::from(battery.capacity & 0x00FF_FFFF), 3);
    buf.put_u8(battery.remaining);

    payload
}

/// Encode a complete battery telemetry frame (12 bytes)
///
/// # Examples
///
/// ```
/// use crsf_link::crsf::encoder::encode_battery_frame;
/// use crsf_link::crsf::protocol::{BatterySensor, Destination};
///
/// let battery = BatterySensor { voltage: 130, current: 10, capacity: 1000, remaining: 75 };
/// let frame = encode_battery_frame(Destination::FlightController, &battery);
/// assert_eq!(&frame[..5], &[0xC8, 10, 0x08, 0x00, 0x82]);
/// ```
pub fn encode_battery_frame(dest: Destination, battery: &BatterySensor) -> Vec<u8> {
    build_frame(dest, FrameType::BatterySensor, &encode_battery_payload(battery))
}

/// Encode GPS telemetry into its 15-byte payload
///
/// Layout: latitude(4) longitude(4) groundspeed(2) heading(2) altitude(2)
/// satellites(1), big-endian.
pub fn encode_gps_payload(gps: &GpsData) -> [u8; CRSF_GPS_PAYLOAD_SIZE] {
    let mut payload = [0u8; CRSF_GPS_PAYLOAD_SIZE];
    let mut buf = &mut payload[..];

    buf.put_i32(gps.latitude);
    buf.put_i32(gps.longitude);
    buf.put_u16(gps.groundspeed);
    buf.put_u16(gps.heading);
    buf.put_u16(gps.altitude);
    buf.put_u8(gps.satellites);

    payload
}

/// Encode a complete GPS telemetry frame (19 bytes)
pub fn encode_gps_frame(dest: Destination, gps: &GpsData) -> Vec<u8> {
    build_frame(dest, FrameType::Gps, &encode_gps_payload(gps))
}

/// Encode RC channels into a complete CRSF frame (26 bytes)
///
/// # Examples
///
/// ```
/// use crsf_link::crsf::encoder::encode_rc_channels_frame;
/// use crsf_link::crsf::protocol::Destination;
///
/// let channels = [1024u16; 16]; // All channels at center
/// let frame = encode_rc_channels_frame(Destination::FlightController, &channels);
/// assert_eq!(frame.len(), 26);
/// ```
pub fn encode_rc_channels_frame(dest: Destination, channels: &RcChannels) -> Vec<u8> {
    build_frame(
        dest,
        FrameType::RcChannelsPacked,
        &encode_rc_channels_payload(channels),
    )
}

/// Encode RC channels into payload (22 bytes)
///
/// Packs 16 channels (11 bits each) into 22 bytes as one continuous
/// bitstream, LSB first. Values above 2047 are clamped.
///
/// ```text
/// Byte 0: Ch1[0:7]
/// Byte 1: Ch1[8:10] | Ch2[0:4]
/// Byte 2: Ch2[5:10] | Ch3[0:1]
/// ...
/// ```
pub fn encode_rc_channels_payload(channels: &RcChannels) -> [u8; CRSF_RC_CHANNELS_PAYLOAD_SIZE] {
    let mut payload = [0u8; CRSF_RC_CHANNELS_PAYLOAD_SIZE];
    let mut acc: u32 = 0;
    let mut bits = 0;
    let mut index = 0;

    for &channel in channels.iter() {
        acc |= u32::from(clamp_channel_value(channel)) << bits;
        bits += CRSF_CHANNEL_BITS;

        while bits >= 8 {
            payload[index] = (acc & 0xFF) as u8;
            acc >>= 8;
            bits -= 8;
            index += 1;
        }
    }

    payload
}

/// Clamp a channel value to valid CRSF range (0-2047)
pub fn clamp_channel_value(value: u16) -> u16 {
    value.min(CRSF_CHANNEL_VALUE_MAX)
}
