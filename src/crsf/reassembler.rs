//! # CRSF Frame Reassembler
//!
//! Turns an unbounded byte stream into validated frames.
//!
//! The reassembler keeps whatever bytes it has not yet been able to judge,
//! so frames split across several reads come out exactly as if they had
//! been delivered in one piece. Anything that fails a check is dropped one
//! byte at a time: after a bad length or CRC the scan restarts at the byte
//! following the rejected sync byte, never at `sync + length`, so a
//! corrupted length byte cannot swallow the frames behind it.

use bytes::{Buf, BytesMut};
use tracing::{debug, trace};

use super::crc::frame_crc;
use super::protocol::*;

/// Destination + length + type + payload + crc
const MAX_FRAME_SIZE: usize = CRSF_FRAME_LENGTH_MAX as usize + 2;

/// Diagnostic counters, never reset except by [`FrameReassembler::reset_stats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReassemblerStats {
    /// Frames that passed the CRC check
    pub frames: u64,

    /// Bytes skipped while hunting for a sync byte
    pub bytes_skipped: u64,

    /// Sync candidates rejected because of their length byte
    pub length_errors: u64,

    /// Sync candidates rejected because of a CRC mismatch
    pub crc_errors: u64,
}

/// Outcome of examining the head of the buffer
enum Scan {
    /// A complete, valid frame was taken off the buffer
    Frame(CrsfFrame),
    /// The head was rejected; try again from the next byte
    Rejected,
    /// Not enough bytes to decide
    NeedMore,
}

/// Stateful frame splitter
///
/// # Examples
///
/// ```
/// use crsf_link::crsf::encoder::encode_rc_channels_frame;
/// use crsf_link::crsf::protocol::Destination;
/// use crsf_link::crsf::reassembler::FrameReassembler;
///
/// let wire = encode_rc_channels_frame(Destination::FlightController, &[1024; 16]);
/// let mut reassembler = FrameReassembler::new();
///
/// assert!(reassembler.feed(&wire[..10]).is_empty());
/// let frames = reassembler.feed(&wire[10..]);
/// assert_eq!(frames.len(), 1);
/// ```
#[derive(Debug)]
pub struct FrameReassembler {
    buf: BytesMut,
    stats: ReassemblerStats,
}

impl Default for FrameReassembler {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameReassembler {
    /// Create an empty reassembler, waiting for a sync byte
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(MAX_FRAME_SIZE * 2),
            stats: ReassemblerStats::default(),
        }
    }

    /// Append `data` and return every frame it completes, in stream order
    ///
    /// Never fails and never blocks: malformed input is silently dropped and
    /// an incomplete trailing frame is kept for the next call.
    pub fn feed(&mut self, data: &[u8]) -> Vec<CrsfFrame> {
        self.buf.extend_from_slice(data);

        let mut frames = Vec::new();
        loop {
            if !self.seek_sync() {
                break;
            }
            match self.scan_head() {
                Scan::Frame(frame) => frames.push(frame),
                Scan::Rejected => self.buf.advance(1),
                Scan::NeedMore => break,
            }
        }

        frames
    }

    /// Number of bytes held while waiting for the rest of a frame
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Drop any partially received frame
    pub fn reset(&mut self) {
        self.buf.clear();
    }

    /// Diagnostic counters
    pub fn stats(&self) -> ReassemblerStats {
        self.stats
    }

    /// Zero the diagnostic counters
    pub fn reset_stats(&mut self) {
        self.stats = ReassemblerStats::default();
    }

    /// Discard bytes up to the first sync byte; false if none is buffered
    fn seek_sync(&mut self) -> bool {
        let skip = self
            .buf
            .iter()
            .position(|&b| Destination::is_sync_byte(b))
            .unwrap_or(self.buf.len());

        if skip > 0 {
            trace!("Skipping {} bytes before sync", skip);
            self.stats.bytes_skipped += skip as u64;
            self.buf.advance(skip);
        }

        !self.buf.is_empty()
    }

    /// Judge the candidate frame starting at `buf[0]`, which is a sync byte
    fn scan_head(&mut self) -> Scan {
        let Some(&length) = self.buf.get(1) else {
            return Scan::NeedMore;
        };

        if !(CRSF_FRAME_LENGTH_MIN..=CRSF_FRAME_LENGTH_MAX).contains(&length) {
            debug!("Rejecting frame with length {}", length);
            self.stats.length_errors += 1;
            return Scan::Rejected;
        }

        let total = length as usize + 2;
        if self.buf.len() < total {
            return Scan::NeedMore;
        }

        let frame_type = self.buf[2];
        let payload = &self.buf[3..total - 1];
        let received_crc = self.buf[total - 1];
        let calculated_crc = frame_crc(frame_type, payload);

        if calculated_crc != received_crc {
            debug!(
                "CRC mismatch on type 0x{:02X}: expected 0x{:02X}, got 0x{:02X}",
                frame_type, calculated_crc, received_crc
            );
            self.stats.crc_errors += 1;
            return Scan::Rejected;
        }

        let destination = match Destination::try_from(self.buf[0]) {
            Ok(dest) => dest,
            // seek_sync only stops on destination bytes
            Err(_) => return Scan::Rejected,
        };

        let raw = self.buf.split_to(total);
        self.stats.frames += 1;
        trace!("Frame type 0x{:02X}, {} payload bytes", frame_type, total - 4);

        Scan::Frame(CrsfFrame {
            destination,
            frame_type,
            payload: raw[3..total - 1].to_vec(),
        })
    }
}
