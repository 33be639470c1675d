//! Waveform playback abstractions
//!
//! A transmission is a pulse train: a sequence of (pins-on, pins-off, hold
//! duration) steps handed to the platform as one atomic unit. The platform
//! plays it with hardware or timer-driven pacing while the caller blocks on
//! the returned completion token.

use crate::gpio::PinId;

/// A set of pins addressed together by one pulse
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PinMask(u32);

impl PinMask {
    /// The empty set
    pub const EMPTY: Self = Self(0);

    /// Mask containing a single pin
    pub const fn single(pin: PinId) -> Self {
        Self(1 << pin.number())
    }

    /// Union of two masks
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Check whether a pin is in the set
    pub const fn contains(self, pin: PinId) -> bool {
        self.0 & (1 << pin.number()) != 0
    }

    /// Check whether the set is empty
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// The raw 32-bit mask
    pub const fn bits(self) -> u32 {
        self.0
    }
}

/// One step of a pulse train
///
/// Pins in `on_mask` are driven high and pins in `off_mask` are driven low
/// at the start of the step, then all lines hold for `duration_us`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Pulse {
    /// Pins driven high at the start of this step
    pub on_mask: PinMask,
    /// Pins driven low at the start of this step
    pub off_mask: PinMask,
    /// Hold time in microseconds
    pub duration_us: u32,
}

impl Pulse {
    /// Pulse driving every pin in `mask` high
    pub const fn high(mask: PinMask, duration_us: u32) -> Self {
        Self {
            on_mask: mask,
            off_mask: PinMask::EMPTY,
            duration_us,
        }
    }

    /// Pulse driving every pin in `mask` low
    pub const fn low(mask: PinMask, duration_us: u32) -> Self {
        Self {
            on_mask: PinMask::EMPTY,
            off_mask: mask,
            duration_us,
        }
    }
}

/// Timed waveform playback provided by the platform
///
/// Playback of one train must not interleave with another on the same pins;
/// callers serialize by blocking on [`WaveBackend::wait_complete`] before
/// issuing the next train.
pub trait WaveBackend {
    /// Platform-specific failure type
    type Error: core::fmt::Debug;

    /// Token resolved when a submitted train has finished playing
    ///
    /// The token owns whatever state its wait needs (a flag, a signal, a
    /// hardware handle), so waiting never requires access to the backend.
    type Completion;

    /// Submit a whole pulse train for playback as one atomic operation
    fn play_pulse_train(&mut self, pulses: &[Pulse]) -> Result<Self::Completion, Self::Error>;

    /// Block until the given playback has finished
    ///
    /// Deliberately takes no backend reference: callers park here without
    /// holding any lock, and edge delivery must keep running for the whole
    /// wait.
    fn wait_complete(completion: Self::Completion) -> Result<(), Self::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pin(n: u8) -> PinId {
        PinId::new(n).unwrap()
    }

    #[test]
    fn test_mask_union_and_contains() {
        let mask = PinMask::single(pin(3)).union(PinMask::single(pin(31)));
        assert!(mask.contains(pin(3)));
        assert!(mask.contains(pin(31)));
        assert!(!mask.contains(pin(4)));
        assert_eq!(mask.bits(), (1 << 3) | (1 << 31));
    }

    #[test]
    fn test_empty_mask() {
        assert!(PinMask::EMPTY.is_empty());
        assert!(!PinMask::single(pin(0)).is_empty());
    }

    #[test]
    fn test_pulse_constructors() {
        let mask = PinMask::single(pin(27));
        let high = Pulse::high(mask, 5000);
        assert_eq!(high.on_mask, mask);
        assert!(high.off_mask.is_empty());

        let low = Pulse::low(mask, 2500);
        assert!(low.on_mask.is_empty());
        assert_eq!(low.off_mask, mask);
        assert_eq!(low.duration_us, 2500);
    }
}
