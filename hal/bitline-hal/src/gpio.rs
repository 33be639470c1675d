//! GPIO pin abstractions
//!
//! Provides the pin identity, level, and edge-notification types consumed by
//! the link layer, plus the backend trait a platform must implement.

use crate::wave::PinMask;

/// Highest pin number addressable by a [`PinMask`]
pub const MAX_PIN: u8 = 31;

/// Identity of a single GPIO pin
///
/// Pins are limited to 0..=31 so that any set of them fits a 32-bit wave
/// mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PinId(u8);

impl PinId {
    /// Create a pin identity, rejecting numbers outside the mask range
    pub const fn new(pin: u8) -> Option<Self> {
        if pin <= MAX_PIN {
            Some(Self(pin))
        } else {
            None
        }
    }

    /// The raw pin number
    pub const fn number(self) -> u8 {
        self.0
    }

    /// The single-pin wave mask for this pin
    pub const fn mask(self) -> PinMask {
        PinMask::single(self)
    }
}

/// Electrical level of a pin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Level {
    Low,
    High,
}

impl Level {
    /// Check if this level is high (logic 1)
    pub const fn is_high(self) -> bool {
        matches!(self, Level::High)
    }

    /// Level from a logic value
    pub const fn from_bool(high: bool) -> Self {
        if high {
            Level::High
        } else {
            Level::Low
        }
    }
}

/// Direction a pin is configured for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PinDirection {
    Input,
    Output,
}

/// Which electrical transitions trigger an edge notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EdgeKind {
    Rising,
    Falling,
    Either,
}

impl EdgeKind {
    /// Check whether a transition to `level` matches this edge kind
    pub const fn matches(self, level: Level) -> bool {
        match self {
            EdgeKind::Rising => level.is_high(),
            EdgeKind::Falling => !level.is_high(),
            EdgeKind::Either => true,
        }
    }
}

/// One electrical transition observed on an input pin
///
/// `tick_us` is a free-running microsecond counter that wraps modulo 2^32;
/// consumers must difference timestamps with wrapping subtraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EdgeEvent {
    /// Pin the transition occurred on
    pub pin: PinId,
    /// Level of the pin after the transition
    pub level: Level,
    /// Timestamp of the transition in microseconds
    pub tick_us: u32,
}

/// Sink for edge notifications
///
/// Handlers run in the platform's notification context (interrupt handler or
/// worker thread), possibly concurrently for different pins. They must be
/// `Sync` and must not block.
pub trait EdgeHandler: Sync {
    /// Called once per observed transition, in arrival order per pin
    fn on_edge(&self, event: EdgeEvent);
}

/// Pin-level GPIO access provided by the platform
pub trait GpioBackend {
    /// Platform-specific failure type
    type Error: core::fmt::Debug;

    /// Configure a pin as input or output
    fn configure_pin(&mut self, pin: PinId, direction: PinDirection) -> Result<(), Self::Error>;

    /// Drive an output pin to a level
    fn write_pin(&mut self, pin: PinId, level: Level) -> Result<(), Self::Error>;

    /// Sample the current level of an input pin
    fn read_pin(&mut self, pin: PinId) -> Result<Level, Self::Error>;

    /// Register an edge-notification handler for an input pin
    ///
    /// The handler is invoked for every matching transition until shutdown;
    /// registering a second handler for the same pin replaces the first.
    fn register_edge_handler(
        &mut self,
        pin: PinId,
        edge_kind: EdgeKind,
        handler: &'static dyn EdgeHandler,
    ) -> Result<(), Self::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pin_id_bounds() {
        assert!(PinId::new(0).is_some());
        assert!(PinId::new(MAX_PIN).is_some());
        assert!(PinId::new(MAX_PIN + 1).is_none());
    }

    #[test]
    fn test_edge_kind_matching() {
        assert!(EdgeKind::Rising.matches(Level::High));
        assert!(!EdgeKind::Rising.matches(Level::Low));
        assert!(EdgeKind::Falling.matches(Level::Low));
        assert!(!EdgeKind::Falling.matches(Level::High));
        assert!(EdgeKind::Either.matches(Level::High));
        assert!(EdgeKind::Either.matches(Level::Low));
    }

    #[test]
    fn test_level_conversion() {
        assert!(Level::from_bool(true).is_high());
        assert!(!Level::from_bool(false).is_high());
    }
}
