//! Per-channel receive state machine
//!
//! The decoder consumes timestamped edge events from one receive pin and
//! recovers the bit clock, byte stream, and frame boundaries from edge
//! spacing alone. Each observed interval is classified by its ratio to the
//! nominal bit duration:
//!
//! - ratio in (0.8, 1.2): a full bit slot elapsed; the edge level is a bit
//! - ratio in (0.4, 0.6): a half slot; two consecutive half slots make a bit
//! - anything else: timing fault, drop the partial frame and resynchronize
//!
//! While unsynchronized, the decoder waits for the preamble's signature: a
//! rising edge one full bit slot after the previous edge. Every anomaly is
//! handled locally by resetting the channel; the sender is never notified.

use bitline_hal::Level;
use heapless::Vec;

use crate::checksum;
use crate::frame::{MAX_FRAME_SIZE, MAX_PAYLOAD_SIZE};

/// A verified payload recovered from the wire
pub type Payload = Vec<u8, MAX_PAYLOAD_SIZE>;

/// Receive faults, all of which reset the channel to unsynchronized
///
/// These are terminal for the in-flight frame only; the decoder is
/// immediately ready for the next preamble.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DecodeError {
    /// Edge interval outside both tolerance windows while synchronized
    TimingViolation,
    /// Completed frame failed checksum verification
    ChecksumMismatch,
    /// Received length byte exceeds the maximum payload size
    LengthOutOfRange,
}

/// Classification of one inter-edge interval
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EdgeClass {
    FullBit,
    HalfBit,
    OutOfTolerance,
}

/// Classify an interval against the nominal bit duration
///
/// Comparisons are done in x10 fixed point to keep the exclusive (0.8, 1.2)
/// and (0.4, 0.6) windows exact without floating point.
fn classify(interval_us: u32, bit_duration_us: u32) -> EdgeClass {
    let interval_x10 = interval_us as u64 * 10;
    let duration = bit_duration_us as u64;

    if interval_x10 > 8 * duration && interval_x10 < 12 * duration {
        EdgeClass::FullBit
    } else if interval_x10 > 4 * duration && interval_x10 < 6 * duration {
        EdgeClass::HalfBit
    } else {
        EdgeClass::OutOfTolerance
    }
}

/// Receive state machine for one channel
///
/// Owned exclusively by that channel's edge stream: edges for one channel
/// must be fed in arrival order and never concurrently.
#[derive(Debug, Clone)]
pub struct ChannelDecoder {
    /// Whether a valid sync pattern has been observed
    synchronized: bool,
    /// True between the first and second half-slot of a Manchester bit
    half_bit_pending: bool,
    /// Timestamp of the previous edge; wraps modulo 2^32 microseconds
    last_edge_tick: u32,
    /// Nominal bit duration used as the timing reference
    bit_duration_us: u32,
    /// Partially assembled byte, first received bit in the MSB
    bit_acc: u8,
    /// Number of bits currently in `bit_acc`
    bit_count: u8,
    /// Partially assembled frame: length byte + payload + checksum byte
    frame: Vec<u8, MAX_FRAME_SIZE>,
}

impl ChannelDecoder {
    /// Create a decoder with the given nominal bit duration
    pub fn new(bit_duration_us: u32) -> Self {
        Self {
            synchronized: false,
            half_bit_pending: false,
            last_edge_tick: 0,
            bit_duration_us,
            bit_acc: 0,
            bit_count: 0,
            frame: Vec::new(),
        }
    }

    /// Reset to unsynchronized with empty accumulators
    ///
    /// Idempotent; the bit duration and last edge timestamp are kept so
    /// resynchronization uses the same timing reference.
    pub fn reset(&mut self) {
        self.synchronized = false;
        self.half_bit_pending = false;
        self.bit_acc = 0;
        self.bit_count = 0;
        self.frame.clear();
    }

    /// Whether the decoder is currently synchronized to a preamble
    pub fn is_synchronized(&self) -> bool {
        self.synchronized
    }

    /// The nominal bit duration this decoder was created with
    pub fn bit_duration_us(&self) -> u32 {
        self.bit_duration_us
    }

    /// Process one edge event
    ///
    /// Returns `Ok(Some(payload))` when the edge completed a frame that
    /// passed checksum verification, `Ok(None)` when more edges are needed,
    /// and `Err` when the edge triggered a channel reset. In every case the
    /// edge timestamp is recorded as the new timing reference.
    pub fn edge(&mut self, level: Level, tick_us: u32) -> Result<Option<Payload>, DecodeError> {
        let interval = tick_us.wrapping_sub(self.last_edge_tick);
        let class = classify(interval, self.bit_duration_us);

        let result = if self.synchronized {
            self.synchronized_edge(class, level)
        } else {
            // Sync signature: a rising edge one full bit slot after the
            // previous edge. Anything else is ignored; nothing has been
            // accumulated yet.
            if class == EdgeClass::FullBit && level.is_high() {
                self.synchronized = true;
            }
            Ok(None)
        };

        self.last_edge_tick = tick_us;
        result
    }

    fn synchronized_edge(
        &mut self,
        class: EdgeClass,
        level: Level,
    ) -> Result<Option<Payload>, DecodeError> {
        match class {
            EdgeClass::FullBit => self.push_bit(level),
            EdgeClass::HalfBit => {
                if self.half_bit_pending {
                    self.half_bit_pending = false;
                    self.push_bit(level)
                } else {
                    self.half_bit_pending = true;
                    Ok(None)
                }
            }
            EdgeClass::OutOfTolerance => {
                self.reset();
                Err(DecodeError::TimingViolation)
            }
        }
    }

    /// Append a completed bit; first received bit ends up most significant
    fn push_bit(&mut self, level: Level) -> Result<Option<Payload>, DecodeError> {
        self.bit_acc = (self.bit_acc << 1) | level.is_high() as u8;
        self.bit_count += 1;

        if self.bit_count < 8 {
            return Ok(None);
        }

        let byte = self.bit_acc;
        self.bit_acc = 0;
        self.bit_count = 0;
        self.push_byte(byte)
    }

    fn push_byte(&mut self, byte: u8) -> Result<Option<Payload>, DecodeError> {
        if self.frame.is_empty() && byte as usize > MAX_PAYLOAD_SIZE {
            self.reset();
            return Err(DecodeError::LengthOutOfRange);
        }

        // Cannot overflow: the length byte was validated above, so the frame
        // completes at length + 2 <= MAX_FRAME_SIZE bytes.
        let _ = self.frame.push(byte);

        let declared_len = self.frame[0] as usize;
        if self.frame.len() < 1 + declared_len + 1 {
            return Ok(None);
        }

        // Frame complete: verify, then reset unconditionally
        let payload = &self.frame[1..1 + declared_len];
        let claimed = self.frame[1 + declared_len];

        let result = if checksum::verify(payload, claimed) {
            let mut delivered = Payload::new();
            // Fits by construction: declared_len <= MAX_PAYLOAD_SIZE
            let _ = delivered.extend_from_slice(payload);
            Ok(Some(delivered))
        } else {
            Err(DecodeError::ChecksumMismatch)
        };

        self.reset();
        result
    }
}
