//! # CRSF Link
//!
//! Owned decoder instance shared between the receive loop and whoever reads
//! the latest RC channels and link statistics.
//!
//! The cached records are stale-until-overwritten: a frame that fails to
//! decode leaves the previous value in place, and readers always get the
//! last good value (all zeros before the first one).

use std::sync::{Mutex, MutexGuard};

use tokio::sync::watch;
use tracing::{debug, info, trace};

use crate::crsf::decoder::{decode_link_statistics, decode_rc_channels};
use crate::crsf::protocol::{CrsfFrame, FrameType, LinkStatistics, RcChannels, CRSF_NUM_CHANNELS};
use crate::crsf::reassembler::{FrameReassembler, ReassemblerStats};
use crate::error::{CrsfError, Result};
use crate::serial::SerialPortRead;

/// Bytes requested from the transport per read
const READ_CHUNK_SIZE: usize = 128;

/// Lock ignoring poisoning; the guarded data is plain old data
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Receive-side state: reassembly buffer plus the two latest records
///
/// Share it between tasks with an `Arc`.
///
/// # Examples
///
/// ```
/// use crsf_link::crsf::encoder::encode_rc_channels_frame;
/// use crsf_link::crsf::protocol::Destination;
/// use crsf_link::link::CrsfLink;
///
/// let link = CrsfLink::new();
/// let mut channels = [992u16; 16];
/// channels[0] = 1000;
///
/// let updated = link.process(&encode_rc_channels_frame(Destination::FlightController, &channels));
/// assert_eq!(updated, 1);
/// assert_eq!(link.channels()[0], 1000);
/// ```
#[derive(Debug, Default)]
pub struct CrsfLink {
    reassembler: Mutex<FrameReassembler>,
    channels: Mutex<RcChannels>,
    link_statistics: Mutex<LinkStatistics>,
}

impl CrsfLink {
    pub fn new() -> Self {
        Self {
            reassembler: Mutex::new(FrameReassembler::new()),
            channels: Mutex::new([0; CRSF_NUM_CHANNELS]),
            link_statistics: Mutex::new(LinkStatistics::default()),
        }
    }

    /// Feed raw transport bytes and update the cached records
    ///
    /// Returns how many records were overwritten.
    pub fn process(&self, data: &[u8]) -> usize {
        let frames = lock(&self.reassembler).feed(data);
        frames.iter().filter(|frame| self.apply(frame)).count()
    }

    /// Decode one validated frame into its cache; false if it was ignored
    fn apply(&self, frame: &CrsfFrame) -> bool {
        let outcome = match frame.kind() {
            Ok(FrameType::RcChannelsPacked) => decode_rc_channels(&frame.payload).map(|channels| {
                *lock(&self.channels) = channels;
            }),
            Ok(FrameType::LinkStatistics) => decode_link_statistics(&frame.payload).map(|stats| {
                *lock(&self.link_statistics) = stats;
            }),
            Ok(other) => {
                trace!("Ignoring {:?} frame", other);
                return false;
            }
            Err(e) => {
                trace!("Ignoring frame: {}", e);
                return false;
            }
        };

        match outcome {
            Ok(()) => true,
            Err(e) => {
                debug!("Keeping previous record: {}", e);
                false
            }
        }
    }

    /// Copy of the latest RC channels
    pub fn channels(&self) -> RcChannels {
        *lock(&self.channels)
    }

    /// Copy of the latest link statistics
    pub fn link_statistics(&self) -> LinkStatistics {
        *lock(&self.link_statistics)
    }

    /// Copy of the reassembler's diagnostic counters
    pub fn reassembler_stats(&self) -> ReassemblerStats {
        lock(&self.reassembler).stats()
    }
}

/// Pump bytes from `reader` into `link` until shutdown or end of stream
///
/// # Errors
///
/// Returns [`CrsfError::Io`] for transport failures other than the stream
/// closing.
pub async fn receive_loop<R: SerialPortRead>(
    mut reader: R,
    link: &CrsfLink,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let mut buf = [0u8; READ_CHUNK_SIZE];

    loop {
        if *shutdown.borrow() {
            break;
        }

        tokio::select! {
            read = reader.read_available(&mut buf) => match read {
                Ok(0) => tokio::task::yield_now().await,
                Ok(n) => {
                    link.process(&buf[..n]);
                }
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    info!("Serial stream closed");
                    break;
                }
                Err(e) => return Err(CrsfError::Io(e)),
            },
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }

    let stats = link.reassembler_stats();
    info!(
        "Receive loop stopped: {} frames, {} CRC errors, {} length errors, {} bytes skipped",
        stats.frames, stats.crc_errors, stats.length_errors, stats.bytes_skipped
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crsf::encoder::{encode_battery_frame, encode_frame, encode_rc_channels_frame};
    use crate::crsf::protocol::{BatterySensor, Destination};
    use crate::serial::port_trait::mocks::{MockSerialReader, ReadStep};
    use std::sync::Arc;

    fn link_stats_frame(lq: u8) -> Vec<u8> {
        encode_frame(
            Destination::FlightController,
            FrameType::LinkStatistics,
            &[100, 98, lq, 5, 0, 2, 3, 90, 99, 7],
        )
        .unwrap()
    }

    fn channels_with(first: u16, last: u16) -> RcChannels {
        let mut channels = [1500u16; CRSF_NUM_CHANNELS];
        channels[0] = first;
        channels[15] = last;
        channels
    }

    #[test]
    fn test_initial_records_are_zero() {
        let link = CrsfLink::new();
        assert_eq!(link.channels(), [0u16; 16]);
        assert_eq!(link.link_statistics(), LinkStatistics::default());
    }

    #[test]
    fn test_process_channels_frame() {
        let link = CrsfLink::new();
        let frame = encode_rc_channels_frame(Destination::FlightController, &channels_with(1000, 500));

        assert_eq!(link.process(&frame), 1);
        assert_eq!(link.channels()[0], 1000);
        assert_eq!(link.channels()[15], 500);
    }

    #[test]
    fn test_process_link_statistics_frame() {
        let link = CrsfLink::new();

        assert_eq!(link.process(&link_stats_frame(87)), 1);
        let stats = link.link_statistics();
        assert_eq!(stats.uplink_lq, 87);
        assert_eq!(stats.downlink_snr, 7);
    }

    #[test]
    fn test_records_stay_stale_until_overwritten() {
        let link = CrsfLink::new();
        link.process(&encode_rc_channels_frame(Destination::FlightController, &channels_with(1000, 500)));

        // Link stats and noise do not touch the channel cache
        link.process(&link_stats_frame(50));
        link.process(&[0x00, 0x13, 0x37]);
        assert_eq!(link.channels()[0], 1000);

        link.process(&encode_rc_channels_frame(Destination::FlightController, &channels_with(1200, 600)));
        assert_eq!(link.channels()[0], 1200);
        assert_eq!(link.link_statistics().uplink_lq, 50);
    }

    #[test]
    fn test_wrong_payload_size_keeps_previous_record() {
        let link = CrsfLink::new();
        link.process(&encode_rc_channels_frame(Destination::FlightController, &channels_with(1000, 500)));

        // Valid CRC, but only 21 payload bytes for a channels frame
        let short = encode_frame(Destination::FlightController, FrameType::RcChannelsPacked, &[0xFF; 21]).unwrap();
        assert_eq!(link.process(&short), 0);
        assert_eq!(link.channels()[0], 1000);
        assert_eq!(link.reassembler_stats().frames, 2);
    }

    #[test]
    fn test_undecoded_types_are_ignored() {
        let link = CrsfLink::new();
        let battery = encode_battery_frame(
            Destination::FlightController,
            &BatterySensor {
                voltage: 130,
                current: 10,
                capacity: 1000,
                remaining: 75,
            },
        );

        assert_eq!(link.process(&battery), 0);
        assert_eq!(link.reassembler_stats().frames, 1);
        assert_eq!(link.channels(), [0u16; 16]);
    }

    #[test]
    fn test_concurrent_reader_sees_whole_records() {
        let link = Arc::new(CrsfLink::new());
        let a = encode_rc_channels_frame(Destination::FlightController, &[100u16; 16]);
        let b = encode_rc_channels_frame(Destination::FlightController, &[1900u16; 16]);

        let writer = {
            let link = Arc::clone(&link);
            std::thread::spawn(move || {
                for i in 0..500 {
                    link.process(if i % 2 == 0 { &a } else { &b });
                }
            })
        };

        for _ in 0..500 {
            let channels = link.channels();
            assert!(
                channels == [0u16; 16] || channels == [100u16; 16] || channels == [1900u16; 16],
                "torn record: {:?}",
                channels
            );
        }
        writer.join().unwrap();
    }

    #[tokio::test]
    async fn test_receive_loop_until_end_of_stream() {
        let frame = encode_rc_channels_frame(Destination::FlightController, &channels_with(1000, 500));
        let reader = MockSerialReader::new(vec![
            ReadStep::Data(frame[..7].to_vec()),
            ReadStep::Idle,
            ReadStep::Data(frame[7..].to_vec()),
            ReadStep::Data(link_stats_frame(99)),
        ]);
        let link = CrsfLink::new();
        let (_tx, rx) = watch::channel(false);

        receive_loop(reader, &link, rx).await.unwrap();

        assert_eq!(link.channels()[15], 500);
        assert_eq!(link.link_statistics().uplink_lq, 99);
        assert_eq!(link.reassembler_stats().frames, 2);
    }

    #[tokio::test]
    async fn test_receive_loop_reassembles_across_reads() {
        let mut wire = encode_rc_channels_frame(Destination::FlightController, &channels_with(1000, 500));
        wire.extend(link_stats_frame(42));
        wire.extend(encode_rc_channels_frame(Destination::FlightController, &channels_with(1200, 700)));

        let reader = MockSerialReader::from_chunks(wire.chunks(5).map(|chunk| chunk.to_vec()));
        let link = CrsfLink::new();
        let (_tx, rx) = watch::channel(false);

        receive_loop(reader, &link, rx).await.unwrap();

        assert_eq!(link.channels()[0], 1200);
        assert_eq!(link.channels()[15], 700);
        assert_eq!(link.link_statistics().uplink_lq, 42);
        assert_eq!(link.reassembler_stats().frames, 3);
    }

    #[tokio::test]
    async fn test_receive_loop_propagates_read_errors() {
        let reader = MockSerialReader::new(vec![ReadStep::Fail(std::io::ErrorKind::BrokenPipe)]);
        let link = CrsfLink::new();
        let (_tx, rx) = watch::channel(false);

        let result = receive_loop(reader, &link, rx).await;
        assert!(matches!(result, Err(CrsfError::Io(_))));
    }

    #[tokio::test]
    async fn test_receive_loop_stops_on_shutdown() {
        let reader = MockSerialReader::new(Vec::new());
        let link = CrsfLink::new();
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();

        receive_loop(reader, &link, rx).await.unwrap();
        assert_eq!(link.reassembler_stats(), ReassemblerStats::default());
    }
}
