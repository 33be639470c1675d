//! Hardware capability traits for the bitline link
//!
//! The link layer never touches hardware registers directly. Everything it
//! needs from the platform is expressed through two traits:
//!
//! - [`GpioBackend`]: pin configuration, level read/write, and registration
//!   of edge-notification handlers that fire on electrical transitions.
//! - [`WaveBackend`]: atomic playback of a timed pulse train across a set of
//!   pins, with an explicit blocking wait for completion.
//!
//! Platform crates (or the in-memory simulator) implement both traits; the
//! protocol and link crates are written purely against them.

#![no_std]
#![deny(unsafe_code)]

pub mod gpio;
pub mod wave;

pub use gpio::{EdgeEvent, EdgeHandler, EdgeKind, GpioBackend, Level, PinDirection, PinId};
pub use wave::{PinMask, Pulse, WaveBackend};
