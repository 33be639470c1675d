//! Channel registry
//!
//! Owns the per-channel decoders behind stable indices, replacing ambient
//! pin-indexed globals. Each decoder lives behind its own mutex so edge
//! notifications for different channels can run concurrently while edges for
//! one channel stay serialized.

use core::cell::RefCell;

use bitline_hal::{PinId, PinMask};
use bitline_protocol::ChannelDecoder;
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;
use heapless::Vec;

use crate::config::{ChannelId, ChannelSelector, LinkConfig, MAX_CHANNELS};

/// Errors detected while building a registry from a configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Configuration names no channels
    NoChannels,
    /// A pin appears more than once across all rx/tx assignments
    DuplicatePin,
    /// Bit duration is zero or does not split into two equal half slots
    InvalidBitDuration,
}

/// Channel lookup failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChannelError {
    /// No channel with the given id exists in this link
    UnknownChannel,
}

/// Per-channel diagnostic counters
///
/// Receive faults never propagate to the sender, so these counters are the
/// only visible trace of dropped frames.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelStats {
    /// Verified frames handed to the message handler
    pub frames_delivered: u32,
    /// Completed frames discarded for checksum mismatch
    pub checksum_errors: u32,
    /// Resets forced by an edge outside both tolerance windows
    pub timing_resets: u32,
    /// Resets forced by an impossible length byte
    pub framing_errors: u32,
}

/// Decoder and counters of one channel, locked as a unit
pub(crate) struct ChannelSlot {
    pub decoder: ChannelDecoder,
    pub stats: ChannelStats,
}

/// One registered channel
pub struct ChannelEntry<M: RawMutex> {
    id: ChannelId,
    rx_pin: PinId,
    tx_pin: PinId,
    slot: Mutex<M, RefCell<ChannelSlot>>,
}

impl<M: RawMutex> ChannelEntry<M> {
    pub fn id(&self) -> ChannelId {
        self.id
    }

    pub fn rx_pin(&self) -> PinId {
        self.rx_pin
    }

    pub fn tx_pin(&self) -> PinId {
        self.tx_pin
    }

    /// Run `f` with exclusive access to this channel's decoder and counters
    pub(crate) fn with_slot<R>(&self, f: impl FnOnce(&mut ChannelSlot) -> R) -> R {
        self.slot.lock(|cell| f(&mut cell.borrow_mut()))
    }

    /// Force the channel back to unsynchronized; idempotent
    pub fn reset(&self) {
        self.with_slot(|slot| slot.decoder.reset());
    }

    /// Whether the channel is currently synchronized to a preamble
    pub fn is_synchronized(&self) -> bool {
        self.with_slot(|slot| slot.decoder.is_synchronized())
    }

    /// Snapshot of this channel's counters
    pub fn stats(&self) -> ChannelStats {
        self.with_slot(|slot| slot.stats)
    }
}

/// Fixed-capacity collection of channels, indexed by id and by receive pin
pub struct ChannelRegistry<M: RawMutex> {
    entries: Vec<ChannelEntry<M>, MAX_CHANNELS>,
}

impl<M: RawMutex> ChannelRegistry<M> {
    /// Build a registry from a configuration
    ///
    /// Channel ids are assigned from position in the config. All rx and tx
    /// pins must be pairwise distinct, and the bit duration must be even and
    /// nonzero so half-slot pulse arithmetic is exact.
    pub fn from_config(config: &LinkConfig) -> Result<Self, ConfigError> {
        if config.channels.is_empty() {
            return Err(ConfigError::NoChannels);
        }

        if config.bit_duration_us == 0 || config.bit_duration_us % 2 != 0 {
            return Err(ConfigError::InvalidBitDuration);
        }

        let mut seen: Vec<PinId, { 2 * MAX_CHANNELS }> = Vec::new();
        for channel in &config.channels {
            for pin in [channel.rx_pin, channel.tx_pin] {
                if seen.contains(&pin) {
                    return Err(ConfigError::DuplicatePin);
                }
                // Capacity is two pins per channel
                let _ = seen.push(pin);
            }
        }

        let mut entries = Vec::new();
        for (index, channel) in config.channels.iter().enumerate() {
            // Capacity matches the config's channel bound
            let _ = entries.push(ChannelEntry {
                id: ChannelId::new(index as u8),
                rx_pin: channel.rx_pin,
                tx_pin: channel.tx_pin,
                slot: Mutex::new(RefCell::new(ChannelSlot {
                    decoder: ChannelDecoder::new(config.bit_duration_us),
                    stats: ChannelStats::default(),
                })),
            });
        }

        Ok(Self { entries })
    }

    /// Number of channels in this link
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over all channels in id order
    pub fn iter(&self) -> impl Iterator<Item = &ChannelEntry<M>> {
        self.entries.iter()
    }

    /// Look up a channel by id
    pub fn entry(&self, id: ChannelId) -> Option<&ChannelEntry<M>> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    /// Look up the channel receiving on `pin`
    pub fn entry_by_rx_pin(&self, pin: PinId) -> Option<&ChannelEntry<M>> {
        self.entries.iter().find(|entry| entry.rx_pin == pin)
    }

    /// Resolve the transmit pins addressed by a selector
    ///
    /// Broadcast is the union of every channel's transmit pin; an unknown
    /// channel id resolves to nothing.
    pub fn tx_mask(&self, selector: ChannelSelector) -> Option<PinMask> {
        match selector {
            ChannelSelector::Channel(id) => self.entry(id).map(|entry| entry.tx_pin.mask()),
            ChannelSelector::Broadcast => Some(
                self.entries
                    .iter()
                    .fold(PinMask::EMPTY, |mask, entry| mask.union(entry.tx_pin.mask())),
            ),
        }
    }
}
