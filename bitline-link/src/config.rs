//! Link configuration types
//!
//! A link is a fixed set of channels, each one transmit and one receive pin,
//! sharing a single nominal bit duration. Both ends of a physical link must
//! be configured with the same bit duration.

use bitline_hal::PinId;
use heapless::Vec;

pub use bitline_protocol::DEFAULT_BIT_DURATION_US;

/// Maximum number of channels per link
pub const MAX_CHANNELS: usize = 4;

/// Default pin table: (rx, tx) pairs for four channels
pub const DEFAULT_PIN_TABLE: [(u8, u8); MAX_CHANNELS] = [(26, 27), (24, 25), (22, 23), (20, 21)];

/// Identity of one channel within a link
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelId(u8);

impl ChannelId {
    pub const fn new(index: u8) -> Self {
        Self(index)
    }

    pub const fn index(self) -> u8 {
        self.0
    }
}

/// Destination of a transmission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChannelSelector {
    /// One specific channel
    Channel(ChannelId),
    /// All channels at once, as a single pulse train
    Broadcast,
}

/// Pin pair of one channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelConfig {
    pub rx_pin: PinId,
    pub tx_pin: PinId,
}

/// Configuration of a whole link
#[derive(Debug, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LinkConfig {
    /// Channels in id order; ids are assigned by position
    pub channels: Vec<ChannelConfig, MAX_CHANNELS>,
    /// Nominal bit duration in microseconds; must be even and nonzero so a
    /// bit splits into two equal half-slot pulses
    pub bit_duration_us: u32,
}

const fn pin(number: u8) -> PinId {
    match PinId::new(number) {
        Some(pin) => pin,
        None => panic!("default pin table entry out of mask range"),
    }
}

impl Default for LinkConfig {
    /// Four channels on the default pin table at 200 bit/s
    fn default() -> Self {
        let mut channels = Vec::new();
        for (rx, tx) in DEFAULT_PIN_TABLE {
            // Capacity equals the table length
            let _ = channels.push(ChannelConfig {
                rx_pin: pin(rx),
                tx_pin: pin(tx),
            });
        }
        Self {
            channels,
            bit_duration_us: DEFAULT_BIT_DURATION_US,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LinkConfig::default();
        assert_eq!(config.channels.len(), MAX_CHANNELS);
        assert_eq!(config.bit_duration_us, 5000);
        assert_eq!(config.channels[0].rx_pin.number(), 26);
        assert_eq!(config.channels[0].tx_pin.number(), 27);
        assert_eq!(config.channels[3].rx_pin.number(), 20);
        assert_eq!(config.channels[3].tx_pin.number(), 21);
    }
}
