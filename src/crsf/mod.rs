//! # CRSF Protocol Module
//!
//! Implementation of the Crossfire (CRSF) protocol as seen from the receiver.
//!
//! This module handles:
//! - Frame synchronization, length checks and CRC validation
//! - RC channels decoding (16 channels, 11-bit resolution)
//! - Link Statistics decoding
//! - Battery and GPS telemetry encoding
//! - CRC8-DVB-S2 checksum calculation

pub mod protocol;
pub mod reassembler;
pub mod encoder;
pub mod decoder;
pub mod crc;
