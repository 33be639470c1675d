//! Manchester link protocol engine
//!
//! This crate contains the wire-level core of the bitline link: the framing,
//! the per-channel receive state machine, and the transmit pulse renderer.
//!
//! # Frame format
//!
//! All messages use a simple length-prefixed frame:
//!
//! ```text
//! ┌────────┬─────────────┬──────────┐
//! │ LENGTH │ PAYLOAD     │ CHECKSUM │
//! │ 1B     │ 0–126B      │ 1B       │
//! └────────┴─────────────┴──────────┘
//! ```
//!
//! LENGTH is the payload size, CHECKSUM is the additive sum of the payload
//! bytes modulo 256.
//!
//! # Line code
//!
//! Frames travel as a Manchester pulse train: a sync preamble followed by two
//! half-bit pulses per data bit, most-significant bit first. The receiver
//! recovers the bit clock purely from the spacing of electrical edges; see
//! [`ChannelDecoder`] for the timing windows.

#![no_std]
#![deny(unsafe_code)]

#[cfg(test)]
extern crate std;

pub mod checksum;
pub mod decoder;
pub mod encoder;
pub mod frame;

pub use decoder::{ChannelDecoder, DecodeError, Payload};
pub use encoder::{FrameEncoder, PulseTrain, MAX_PULSE_TRAIN};
pub use frame::{Frame, FrameError, MAX_FRAME_SIZE, MAX_PAYLOAD_SIZE};

/// Default nominal bit duration: 5 ms per bit (200 bit/s)
///
/// Both ends of a link must agree on this value; it is the timing reference
/// every edge interval is classified against.
pub const DEFAULT_BIT_DURATION_US: u32 = 5000;
