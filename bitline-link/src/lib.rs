//! Link layer for software-driven Manchester serial over GPIO
//!
//! Runs up to four half-duplex channels on plain GPIO pins with no UART
//! hardware involved. Each channel pairs one transmit and one receive pin;
//! transmit renders a whole frame into a pulse train played by the backend,
//! receive recovers frames purely from the timing of edge notifications.
//!
//! The crate is hardware-agnostic: anything implementing the
//! [`bitline_hal::GpioBackend`] and [`bitline_hal::WaveBackend`] traits can
//! carry a link. See [`LinkLayer`] for the lifecycle.

#![no_std]
#![deny(unsafe_code)]

pub mod config;
pub mod dispatch;
pub mod link;
pub mod registry;

pub use config::{
    ChannelConfig, ChannelId, ChannelSelector, LinkConfig, DEFAULT_BIT_DURATION_US,
    DEFAULT_PIN_TABLE, MAX_CHANNELS,
};
pub use dispatch::MessageHandler;
pub use link::{InitError, LinkLayer, TransmitError};
pub use registry::{ChannelError, ChannelStats, ConfigError};
