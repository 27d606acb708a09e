//! # CRSF Link Library
//!
//! Receiver-side CRSF (Crossfire) protocol handling for a flight controller.
//!
//! This library reassembles CRSF frames from a serial byte stream, decodes
//! RC channels and link statistics into shared records, and encodes battery
//! and GPS telemetry frames to send back to the transmitter.

pub mod config;
pub mod error;
pub mod crsf;
pub mod link;
pub mod serial;
pub mod telemetry;
