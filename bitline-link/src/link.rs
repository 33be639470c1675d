//! Link layer surface
//!
//! Ties the registry, dispatcher, and protocol engine to a hardware backend.
//! Receive runs from edge notifications: the backend calls [`EdgeHandler`]
//! on every transition, the event is routed to its channel's decoder under
//! that channel's lock, and verified frames go out through the dispatcher.
//! Transmit is synchronous and serialized: the whole pulse train is handed
//! to the backend atomically and the caller blocks until playback completes,
//! so two waveforms can never overlap electrically. The blocking wait holds
//! no lock, so it never stalls the receive side.

use core::cell::RefCell;
use core::sync::atomic::{AtomicBool, Ordering};

use bitline_hal::{EdgeEvent, EdgeHandler, EdgeKind, GpioBackend, Level, PinDirection, WaveBackend};
use bitline_protocol::{DecodeError, Frame, FrameEncoder};
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;

use crate::config::{ChannelId, ChannelSelector, LinkConfig};
use crate::dispatch::{MessageDispatcher, MessageHandler};
use crate::registry::{ChannelError, ChannelRegistry, ChannelStats, ConfigError};

/// Initialization failures; all fatal for the link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InitError<E> {
    /// The hardware backend rejected pin setup or handler registration
    Backend(E),
}

/// Transmit failures; each aborts that attempt only, with no retry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransmitError<E> {
    /// Payload exceeds the maximum frame payload size
    PayloadTooLarge,
    /// Selector names a channel this link does not have
    UnknownChannel,
    /// Waveform creation or playback failed in the backend
    Backend(E),
}

/// The link layer: up to four half-duplex Manchester channels over one
/// hardware backend
///
/// Generic over the raw mutex so firmware can pick a critical-section mutex
/// while single-threaded hosts use a no-op one. The backend provides both
/// pin access and waveform playback; it is locked only long enough to submit
/// work, never across a blocking wait, so edge delivery and receive
/// processing on every channel keep running while a transmit is in flight.
pub struct LinkLayer<B, M: RawMutex> {
    backend: Mutex<M, RefCell<B>>,
    registry: ChannelRegistry<M>,
    dispatcher: MessageDispatcher<M>,
    encoder: FrameEncoder,
    tx_busy: AtomicBool,
}

/// Releases the transmit claim on drop
struct TxClaim<'a>(&'a AtomicBool);

impl Drop for TxClaim<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<B, M> LinkLayer<B, M>
where
    B: GpioBackend + WaveBackend + Send,
    M: RawMutex + Sync,
{
    /// Build a link from a configuration and a hardware backend
    ///
    /// No hardware is touched yet; call [`LinkLayer::initialize`] to
    /// configure pins and start receiving.
    pub fn new(config: LinkConfig, backend: B) -> Result<Self, ConfigError> {
        let registry = ChannelRegistry::from_config(&config)?;
        Ok(Self {
            backend: Mutex::new(RefCell::new(backend)),
            registry,
            dispatcher: MessageDispatcher::new(),
            encoder: FrameEncoder::new(config.bit_duration_us),
            tx_busy: AtomicBool::new(false),
        })
    }

    /// Claim exclusive use of the transmit path, spinning until it is free
    ///
    /// The claim is a plain atomic, not a mutex: holding it for the length
    /// of a playback must not mask interrupts or stall edge delivery.
    fn claim_tx(&self) -> TxClaim<'_> {
        while self
            .tx_busy
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            core::hint::spin_loop();
        }
        TxClaim(&self.tx_busy)
    }

    /// Configure every channel's pins and register for edge notifications
    ///
    /// Receive pins become inputs with an either-edge handler; transmit pins
    /// become outputs driven to idle low. Requires a `'static` borrow
    /// because the backend keeps notifying this link until shutdown; pin it
    /// with `static_cell` or equivalent. A backend failure here is fatal.
    pub fn initialize(&'static self) -> Result<(), InitError<<B as GpioBackend>::Error>> {
        self.backend.lock(|cell| {
            let mut backend = cell.borrow_mut();
            for entry in self.registry.iter() {
                backend
                    .configure_pin(entry.rx_pin(), PinDirection::Input)
                    .map_err(InitError::Backend)?;
                backend
                    .configure_pin(entry.tx_pin(), PinDirection::Output)
                    .map_err(InitError::Backend)?;
                backend
                    .write_pin(entry.tx_pin(), Level::Low)
                    .map_err(InitError::Backend)?;
                backend
                    .register_edge_handler(entry.rx_pin(), EdgeKind::Either, self)
                    .map_err(InitError::Backend)?;
            }
            Ok(())
        })
    }

    /// Install the upper layer's message handler, replacing the previous one
    pub fn set_message_handler(&self, handler: &'static dyn MessageHandler) {
        self.dispatcher.set_handler(handler);
    }

    /// Frame a payload and play it as one pulse train, blocking until the
    /// waveform has finished
    ///
    /// Broadcast renders a single train whose pin mask is the union of all
    /// transmit pins, never a sequence of per-channel sends. Concurrent
    /// senders are serialized by the transmit claim, held for the whole
    /// operation; the backend mutex covers only the train submission, and
    /// the completion wait runs outside every lock so edges arriving during
    /// playback are delivered and decoded while the sender is parked.
    pub fn transmit(
        &self,
        selector: ChannelSelector,
        payload: &[u8],
    ) -> Result<(), TransmitError<<B as WaveBackend>::Error>> {
        let mask = self
            .registry
            .tx_mask(selector)
            .ok_or(TransmitError::UnknownChannel)?;
        let frame = Frame::new(payload).map_err(|_| TransmitError::PayloadTooLarge)?;
        let train = self.encoder.render(&frame, mask);

        // One waveform at a time on the line
        let _claim = self.claim_tx();

        let completion = self
            .backend
            .lock(|cell| cell.borrow_mut().play_pulse_train(&train))
            .map_err(TransmitError::Backend)?;

        <B as WaveBackend>::wait_complete(completion).map_err(TransmitError::Backend)
    }

    /// Force a channel back to unsynchronized, dropping partial data
    ///
    /// Idempotent: a second reset leaves the channel in the same state.
    pub fn reset_channel(&self, id: ChannelId) -> Result<(), ChannelError> {
        let entry = self.registry.entry(id).ok_or(ChannelError::UnknownChannel)?;
        entry.reset();
        Ok(())
    }

    /// Whether a channel is currently synchronized to a preamble
    pub fn channel_synchronized(&self, id: ChannelId) -> Result<bool, ChannelError> {
        self.registry
            .entry(id)
            .map(|entry| entry.is_synchronized())
            .ok_or(ChannelError::UnknownChannel)
    }

    /// Snapshot of a channel's diagnostic counters
    pub fn channel_stats(&self, id: ChannelId) -> Result<ChannelStats, ChannelError> {
        self.registry
            .entry(id)
            .map(|entry| entry.stats())
            .ok_or(ChannelError::UnknownChannel)
    }

    /// Number of channels in this link
    pub fn channel_count(&self) -> usize {
        self.registry.len()
    }
}

impl<B, M> EdgeHandler for LinkLayer<B, M>
where
    B: GpioBackend + WaveBackend + Send,
    M: RawMutex + Sync,
{
    /// Route one edge to its channel's decoder
    ///
    /// Edges for unknown pins are dropped. The decoder and its counters are
    /// mutated under the channel's own lock; the message handler is invoked
    /// after that lock is released, so a slow handler delays only delivery,
    /// not the fault accounting of later edges on other channels.
    fn on_edge(&self, event: EdgeEvent) {
        let Some(entry) = self.registry.entry_by_rx_pin(event.pin) else {
            return;
        };

        let delivered = entry.with_slot(|slot| {
            match slot.decoder.edge(event.level, event.tick_us) {
                Ok(Some(payload)) => {
                    slot.stats.frames_delivered += 1;
                    Some(payload)
                }
                Ok(None) => None,
                Err(DecodeError::TimingViolation) => {
                    slot.stats.timing_resets += 1;
                    None
                }
                Err(DecodeError::ChecksumMismatch) => {
                    slot.stats.checksum_errors += 1;
                    None
                }
                Err(DecodeError::LengthOutOfRange) => {
                    slot.stats.framing_errors += 1;
                    None
                }
            }
        });

        if let Some(payload) = delivered {
            self.dispatcher.dispatch(&payload, entry.id());
        }
    }
}
