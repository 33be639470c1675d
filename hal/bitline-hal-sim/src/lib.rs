//! In-memory loopback backend
//!
//! Implements [`GpioBackend`] and [`WaveBackend`] without hardware. Transmit
//! pins are wired to receive pins through a wiring table; playing a pulse
//! train walks the pulses, tracks every wired line's level, and delivers an
//! [`EdgeEvent`] to the handler registered on the receive pin at each level
//! change, stamped from a deterministic microsecond clock.
//!
//! Playback is synchronous: by the time `play_pulse_train` returns, every
//! edge has already been delivered, and the completion token resolves
//! immediately. Raw edge injection and manual clock control are provided for
//! timing-fault tests.

#![no_std]
#![deny(unsafe_code)]

#[cfg(test)]
extern crate std;

use core::sync::atomic::{AtomicU32, Ordering};

use bitline_hal::{
    EdgeEvent, EdgeHandler, EdgeKind, GpioBackend, Level, PinDirection, PinId, PinMask, Pulse,
    WaveBackend,
};
use heapless::Vec;

/// Maximum number of tx-to-rx wires
pub const MAX_WIRES: usize = 8;

/// Maximum number of registered edge handlers
pub const MAX_HANDLERS: usize = 8;

/// Number of pins the simulator models (the full mask range)
const NUM_PINS: usize = 32;

/// Simulator failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SimError {
    /// Pin was used before being configured
    UnconfiguredPin,
    /// Write or playback addressed a pin not configured as output
    NotAnOutput,
    /// Read or handler registration addressed a pin not configured as input
    NotAnInput,
    /// Wiring table is full
    TooManyWires,
    /// Handler table is full
    TooManyHandlers,
}

/// Shared observation point for tests
///
/// Lives outside the backend (which is usually moved into the link layer) so
/// tests can still count playbacks.
#[derive(Debug, Default)]
pub struct SimProbe {
    plays: AtomicU32,
    pulses_played: AtomicU32,
}

impl SimProbe {
    pub const fn new() -> Self {
        Self {
            plays: AtomicU32::new(0),
            pulses_played: AtomicU32::new(0),
        }
    }

    /// Number of pulse trains played so far
    pub fn plays(&self) -> u32 {
        self.plays.load(Ordering::Relaxed)
    }

    /// Total number of pulses across all playbacks
    pub fn pulses_played(&self) -> u32 {
        self.pulses_played.load(Ordering::Relaxed)
    }
}

/// Completion token of a synchronous playback
///
/// Playback already finished when the token was handed out; waiting on it is
/// a no-op that exists to exercise the caller's blocking discipline.
#[derive(Debug)]
pub struct PlaybackComplete(());

#[derive(Debug, Clone, Copy)]
struct Wire {
    tx: PinId,
    rx: PinId,
}

struct Registration {
    pin: PinId,
    edge_kind: EdgeKind,
    handler: &'static dyn EdgeHandler,
}

/// The in-memory backend
pub struct SimBackend {
    directions: [Option<PinDirection>; NUM_PINS],
    levels: [Level; NUM_PINS],
    wires: Vec<Wire, MAX_WIRES>,
    handlers: Vec<Registration, MAX_HANDLERS>,
    clock_us: u32,
    probe: Option<&'static SimProbe>,
}

impl Default for SimBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl SimBackend {
    /// Create a backend with all lines idle low and the clock at zero
    pub fn new() -> Self {
        Self {
            directions: [None; NUM_PINS],
            levels: [Level::Low; NUM_PINS],
            wires: Vec::new(),
            handlers: Vec::new(),
            clock_us: 0,
            probe: None,
        }
    }

    /// Create a backend reporting playback counts to `probe`
    pub fn with_probe(probe: &'static SimProbe) -> Self {
        let mut backend = Self::new();
        backend.probe = Some(probe);
        backend
    }

    /// Connect a transmit pin to a receive pin
    ///
    /// One tx pin may drive several rx pins (and vice versa); every matching
    /// wire propagates on each level change.
    pub fn wire(&mut self, tx: PinId, rx: PinId) -> Result<(), SimError> {
        self.wires
            .push(Wire { tx, rx })
            .map_err(|_| SimError::TooManyWires)
    }

    /// Current simulated time in microseconds
    pub fn now_us(&self) -> u32 {
        self.clock_us
    }

    /// Advance the simulated clock without driving any line
    pub fn advance_clock(&mut self, duration_us: u32) {
        self.clock_us = self.clock_us.wrapping_add(duration_us);
    }

    /// Deliver a raw edge to whatever handler is registered on `pin`
    ///
    /// Bypasses wiring and direction checks; intended for timing-fault tests
    /// that need edges no well-formed transmitter would produce.
    pub fn inject_edge(&mut self, pin: PinId, level: Level, tick_us: u32) {
        self.levels[pin.number() as usize] = level;
        self.deliver(EdgeEvent {
            pin,
            level,
            tick_us,
        });
    }

    /// Drive every output pin named by the masks, propagating edges to wired
    /// receive pins at timestamp `tick`
    fn drive_masks(&mut self, on_mask: PinMask, off_mask: PinMask, tick: u32) {
        // At most one event per wiring table entry: a wire's tx pin changes
        // level at most once per call, so MAX_WIRES bounds the burst.
        let mut events: Vec<EdgeEvent, MAX_WIRES> = Vec::new();

        for number in 0..NUM_PINS as u8 {
            let Some(pin) = PinId::new(number) else {
                continue;
            };
            let target = if on_mask.contains(pin) {
                Level::High
            } else if off_mask.contains(pin) {
                Level::Low
            } else {
                continue;
            };

            let idx = number as usize;
            if self.directions[idx] != Some(PinDirection::Output) {
                continue;
            }
            if self.levels[idx] == target {
                continue;
            }
            self.levels[idx] = target;

            for wire in &self.wires {
                if wire.tx == pin {
                    self.levels[wire.rx.number() as usize] = target;
                    let _ = events.push(EdgeEvent {
                        pin: wire.rx,
                        level: target,
                        tick_us: tick,
                    });
                }
            }
        }

        for event in events {
            self.deliver(event);
        }
    }

    fn deliver(&self, event: EdgeEvent) {
        for registration in &self.handlers {
            if registration.pin == event.pin && registration.edge_kind.matches(event.level) {
                registration.handler.on_edge(event);
            }
        }
    }
}

impl GpioBackend for SimBackend {
    type Error = SimError;

    fn configure_pin(&mut self, pin: PinId, direction: PinDirection) -> Result<(), Self::Error> {
        self.directions[pin.number() as usize] = Some(direction);
        Ok(())
    }

    fn write_pin(&mut self, pin: PinId, level: Level) -> Result<(), Self::Error> {
        if self.directions[pin.number() as usize] != Some(PinDirection::Output) {
            return Err(SimError::NotAnOutput);
        }
        let (on, off) = match level {
            Level::High => (pin.mask(), PinMask::EMPTY),
            Level::Low => (PinMask::EMPTY, pin.mask()),
        };
        let tick = self.clock_us;
        self.drive_masks(on, off, tick);
        Ok(())
    }

    fn read_pin(&mut self, pin: PinId) -> Result<Level, Self::Error> {
        match self.directions[pin.number() as usize] {
            Some(PinDirection::Input) => Ok(self.levels[pin.number() as usize]),
            Some(PinDirection::Output) => Err(SimError::NotAnInput),
            None => Err(SimError::UnconfiguredPin),
        }
    }

    fn register_edge_handler(
        &mut self,
        pin: PinId,
        edge_kind: EdgeKind,
        handler: &'static dyn EdgeHandler,
    ) -> Result<(), Self::Error> {
        if self.directions[pin.number() as usize] != Some(PinDirection::Input) {
            return Err(SimError::NotAnInput);
        }

        // Re-registering a pin replaces its handler
        for registration in self.handlers.iter_mut() {
            if registration.pin == pin {
                registration.edge_kind = edge_kind;
                registration.handler = handler;
                return Ok(());
            }
        }

        self.handlers
            .push(Registration {
                pin,
                edge_kind,
                handler,
            })
            .map_err(|_| SimError::TooManyHandlers)
    }
}

impl WaveBackend for SimBackend {
    type Error = SimError;
    type Completion = PlaybackComplete;

    fn play_pulse_train(&mut self, pulses: &[Pulse]) -> Result<Self::Completion, Self::Error> {
        if let Some(probe) = self.probe {
            probe.plays.fetch_add(1, Ordering::Relaxed);
            probe
                .pulses_played
                .fetch_add(pulses.len() as u32, Ordering::Relaxed);
        }

        for pulse in pulses {
            let tick = self.clock_us;
            self.drive_masks(pulse.on_mask, pulse.off_mask, tick);
            self.clock_us = self.clock_us.wrapping_add(pulse.duration_us);
        }

        Ok(PlaybackComplete(()))
    }

    fn wait_complete(_completion: Self::Completion) -> Result<(), Self::Error> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::boxed::Box;
    use std::sync::Mutex;
    use std::vec::Vec as HostVec;

    struct Capture {
        events: Mutex<HostVec<EdgeEvent>>,
    }

    impl Capture {
        fn leaked() -> &'static Self {
            Box::leak(Box::new(Self {
                events: Mutex::new(HostVec::new()),
            }))
        }

        fn events(&self) -> HostVec<EdgeEvent> {
            self.events.lock().unwrap().clone()
        }
    }

    impl EdgeHandler for Capture {
        fn on_edge(&self, event: EdgeEvent) {
            self.events.lock().unwrap().push(event);
        }
    }

    fn pin(n: u8) -> PinId {
        PinId::new(n).unwrap()
    }

    fn wired_backend(capture: &'static Capture) -> SimBackend {
        let mut sim = SimBackend::new();
        sim.configure_pin(pin(27), PinDirection::Output).unwrap();
        sim.configure_pin(pin(26), PinDirection::Input).unwrap();
        sim.wire(pin(27), pin(26)).unwrap();
        sim.register_edge_handler(pin(26), EdgeKind::Either, capture)
            .unwrap();
        sim
    }

    #[test]
    fn test_write_propagates_edge_to_wired_pin() {
        let capture = Capture::leaked();
        let mut sim = wired_backend(capture);

        sim.advance_clock(100);
        sim.write_pin(pin(27), Level::High).unwrap();
        // No change, no edge
        sim.write_pin(pin(27), Level::High).unwrap();
        sim.advance_clock(50);
        sim.write_pin(pin(27), Level::Low).unwrap();

        let events = capture.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].pin, pin(26));
        assert_eq!(events[0].level, Level::High);
        assert_eq!(events[0].tick_us, 100);
        assert_eq!(events[1].level, Level::Low);
        assert_eq!(events[1].tick_us, 150);
    }

    #[test]
    fn test_playback_delivers_timestamped_edges() {
        let capture = Capture::leaked();
        let mut sim = wired_backend(capture);

        let mask = pin(27).mask();
        let train = [
            Pulse::high(mask, 5000),
            Pulse::low(mask, 2500),
            // Same level again: holds the line, no edge
            Pulse::low(mask, 2500),
            Pulse::high(mask, 1000),
        ];
        let completion = sim.play_pulse_train(&train).unwrap();
        SimBackend::wait_complete(completion).unwrap();

        let events = capture.events();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].tick_us, 0);
        assert_eq!(events[0].level, Level::High);
        assert_eq!(events[1].tick_us, 5000);
        assert_eq!(events[1].level, Level::Low);
        assert_eq!(events[2].tick_us, 10000);
        assert_eq!(events[2].level, Level::High);
        assert_eq!(sim.now_us(), 11000);
    }

    #[test]
    fn test_edge_kind_filters_notifications() {
        let capture = Capture::leaked();
        let mut sim = wired_backend(capture);
        sim.register_edge_handler(pin(26), EdgeKind::Rising, capture)
            .unwrap();

        sim.write_pin(pin(27), Level::High).unwrap();
        sim.write_pin(pin(27), Level::Low).unwrap();
        sim.write_pin(pin(27), Level::High).unwrap();

        let events = capture.events();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.level == Level::High));
    }

    #[test]
    fn test_broadcast_mask_drives_all_wired_pins() {
        let capture = Capture::leaked();
        let mut sim = SimBackend::new();
        for (tx, rx) in [(27, 26), (25, 24)] {
            sim.configure_pin(pin(tx), PinDirection::Output).unwrap();
            sim.configure_pin(pin(rx), PinDirection::Input).unwrap();
            sim.wire(pin(tx), pin(rx)).unwrap();
            sim.register_edge_handler(pin(rx), EdgeKind::Either, capture)
                .unwrap();
        }

        let broadcast = pin(27).mask().union(pin(25).mask());
        sim.play_pulse_train(&[Pulse::high(broadcast, 1000)]).unwrap();

        let events = capture.events();
        assert_eq!(events.len(), 2);
        let pins: HostVec<PinId> = events.iter().map(|e| e.pin).collect();
        assert!(pins.contains(&pin(26)));
        assert!(pins.contains(&pin(24)));
    }

    #[test]
    fn test_full_wiring_table_delivers_every_edge() {
        let capture = Capture::leaked();
        let mut sim = SimBackend::new();
        let mut broadcast = PinMask::EMPTY;

        // Four tx pins fanned out to two rx pins each: all eight wires fire
        // from a single pulse
        for (tx, rxs) in [(27, [26, 18]), (25, [24, 17]), (23, [22, 16]), (21, [20, 15])] {
            sim.configure_pin(pin(tx), PinDirection::Output).unwrap();
            broadcast = broadcast.union(pin(tx).mask());
            for rx in rxs {
                sim.configure_pin(pin(rx), PinDirection::Input).unwrap();
                sim.wire(pin(tx), pin(rx)).unwrap();
                sim.register_edge_handler(pin(rx), EdgeKind::Either, capture)
                    .unwrap();
            }
        }

        sim.play_pulse_train(&[Pulse::high(broadcast, 1000)]).unwrap();
        assert_eq!(capture.events().len(), 8);
    }

    #[test]
    fn test_inject_edge_bypasses_wiring() {
        let capture = Capture::leaked();
        let mut sim = wired_backend(capture);

        // No output pin involved: the edge goes straight to the handler
        sim.inject_edge(pin(26), Level::High, 777);

        let events = capture.events();
        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0],
            EdgeEvent {
                pin: pin(26),
                level: Level::High,
                tick_us: 777,
            }
        );
    }

    #[test]
    fn test_probe_counts_playbacks() {
        static PROBE: SimProbe = SimProbe::new();
        let mut sim = SimBackend::with_probe(&PROBE);
        sim.configure_pin(pin(27), PinDirection::Output).unwrap();

        let mask = pin(27).mask();
        sim.play_pulse_train(&[Pulse::high(mask, 10), Pulse::low(mask, 10)])
            .unwrap();

        assert_eq!(PROBE.plays(), 1);
        assert_eq!(PROBE.pulses_played(), 2);
    }

    #[test]
    fn test_direction_checks() {
        let mut sim = SimBackend::new();
        sim.configure_pin(pin(5), PinDirection::Input).unwrap();

        assert_eq!(sim.write_pin(pin(5), Level::High), Err(SimError::NotAnOutput));
        assert_eq!(sim.read_pin(pin(6)), Err(SimError::UnconfiguredPin));
        assert_eq!(sim.read_pin(pin(5)), Ok(Level::Low));
    }
}
