//! Transmit pulse renderer
//!
//! Turns a logical frame into the Manchester pulse train that
//! [`crate::decoder::ChannelDecoder`] recovers on the far end. The same train
//! drives one pin or a broadcast set; the pin mask is baked into every pulse.
//!
//! Train layout, with T the nominal bit duration:
//!
//! ```text
//! high T | low T | high T/2 | 16 half-pulses per frame byte | low 2T
//! ```
//!
//! The low guard makes the following rising edge arrive one full bit slot
//! after the previous edge, which is exactly the sync signature the decoder
//! looks for. That final high pulse lasts only half a slot so the sync edge
//! sits on the half-bit grid: whichever value the first data bit has, its
//! edges land a half or full slot after the sync edge and classify cleanly.
//! Each data bit is two half-slot pulses, mid-bit transition carrying the
//! value: 1 is low-then-high, 0 is high-then-low, most significant bit first.
//!
//! The trailing low returns the line to idle and lasts two full slots. Two,
//! not one: when the last data bit ended high, the final falling edge sits
//! exactly at the trailing pulse's start, and a one-slot gap would make a
//! back-to-back train's first preamble edge mimic the sync signature. At two
//! slots the gap classifies out of tolerance for either final bit value, so
//! consecutive trains always synchronize on the real sync edge.

use bitline_hal::{PinMask, Pulse};
use heapless::Vec;

use crate::frame::{Frame, MAX_FRAME_SIZE};

/// Pulses per encoded data byte (8 bits, two half-slot pulses each)
pub const PULSES_PER_BYTE: usize = 16;

/// Pulses in the synchronization preamble
pub const PREAMBLE_PULSES: usize = 3;

/// Upper bound on a rendered train: preamble + data + trailing idle pulse
pub const MAX_PULSE_TRAIN: usize = PREAMBLE_PULSES + PULSES_PER_BYTE * MAX_FRAME_SIZE + 1;

/// A rendered pulse train ready for waveform playback
pub type PulseTrain = Vec<Pulse, MAX_PULSE_TRAIN>;

/// Renders frames into Manchester pulse trains
#[derive(Debug, Clone, Copy)]
pub struct FrameEncoder {
    bit_duration_us: u32,
}

impl FrameEncoder {
    /// Create an encoder with the given nominal bit duration
    ///
    /// `bit_duration_us` must be even: a bit renders as two half-slot
    /// pulses, and an odd duration would truncate them to one microsecond
    /// short of a slot, drifting the edge grid a microsecond per bit. Link
    /// configuration validation rejects odd durations upstream.
    pub fn new(bit_duration_us: u32) -> Self {
        Self { bit_duration_us }
    }

    /// The nominal bit duration this encoder renders against
    pub fn bit_duration_us(&self) -> u32 {
        self.bit_duration_us
    }

    /// Render a frame as one pulse train addressed to `mask`
    pub fn render(&self, frame: &Frame, mask: PinMask) -> PulseTrain {
        self.render_bytes(&frame.encode(), mask)
    }

    /// Render raw frame bytes; split out so tests can put malformed frames
    /// on the wire
    pub(crate) fn render_bytes(&self, bytes: &[u8], mask: PinMask) -> PulseTrain {
        let full = self.bit_duration_us;
        let half = self.bit_duration_us / 2;

        let mut train = PulseTrain::new();

        // Sync preamble
        let _ = train.push(Pulse::high(mask, full));
        let _ = train.push(Pulse::low(mask, full));
        let _ = train.push(Pulse::high(mask, half));

        // Data bits, MSB first
        for &byte in bytes {
            for bit in (0..8).rev() {
                if (byte >> bit) & 1 == 1 {
                    let _ = train.push(Pulse::low(mask, half));
                    let _ = train.push(Pulse::high(mask, half));
                } else {
                    let _ = train.push(Pulse::high(mask, half));
                    let _ = train.push(Pulse::low(mask, half));
                }
            }
        }

        // Return the line to idle; see the module docs for why two slots
        let _ = train.push(Pulse::low(mask, 2 * full));

        train
    }
}
