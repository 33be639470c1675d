//! Message dispatch
//!
//! Verified frames leave the link layer through a single pluggable handler,
//! so the upper layer can substitute its own routing logic without this
//! crate depending on it. The handler runs synchronously on the receive path
//! and therefore must not block.

use core::cell::Cell;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;

use crate::config::ChannelId;

/// Receiver of verified messages
///
/// Implementations may be called from several channels' notification
/// contexts concurrently and must be `Sync`. The call happens on the path
/// that must return before the channel can resynchronize: do the minimum and
/// hand off, never block indefinitely, and never transmit from inside the
/// handler.
pub trait MessageHandler: Sync {
    /// Called once per verified frame with the payload and receiving channel
    fn on_message(&self, payload: &[u8], channel: ChannelId);
}

/// Discards every message; the dispatcher's default
struct NullHandler;

impl MessageHandler for NullHandler {
    fn on_message(&self, _payload: &[u8], _channel: ChannelId) {}
}

static NULL_HANDLER: NullHandler = NullHandler;

/// Holds the currently installed message handler
pub struct MessageDispatcher<M: RawMutex> {
    handler: Mutex<M, Cell<&'static dyn MessageHandler>>,
}

impl<M: RawMutex> MessageDispatcher<M> {
    /// Create a dispatcher with the no-op handler installed
    pub fn new() -> Self {
        Self {
            handler: Mutex::new(Cell::new(&NULL_HANDLER)),
        }
    }

    /// Replace the installed handler
    pub fn set_handler(&self, handler: &'static dyn MessageHandler) {
        self.handler.lock(|cell| cell.set(handler));
    }

    /// Deliver one verified message to the installed handler
    ///
    /// The handler reference is taken under the lock but invoked outside it,
    /// so a slow handler cannot stall `set_handler` from another context.
    pub fn dispatch(&self, payload: &[u8], channel: ChannelId) {
        let handler = self.handler.lock(|cell| cell.get());
        handler.on_message(payload, channel);
    }
}

impl<M: RawMutex> Default for MessageDispatcher<M> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::{AtomicU32, Ordering};
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;

    struct Counter {
        calls: AtomicU32,
    }

    impl MessageHandler for Counter {
        fn on_message(&self, payload: &[u8], channel: ChannelId) {
            assert_eq!(payload, b"ping");
            assert_eq!(channel, ChannelId::new(2));
            self.calls.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[test]
    fn test_default_handler_discards() {
        let dispatcher: MessageDispatcher<NoopRawMutex> = MessageDispatcher::new();
        // Must simply not panic
        dispatcher.dispatch(b"anything", ChannelId::new(0));
    }

    #[test]
    fn test_installed_handler_receives_messages() {
        static COUNTER: Counter = Counter {
            calls: AtomicU32::new(0),
        };

        let dispatcher: MessageDispatcher<NoopRawMutex> = MessageDispatcher::new();
        dispatcher.set_handler(&COUNTER);

        dispatcher.dispatch(b"ping", ChannelId::new(2));
        dispatcher.dispatch(b"ping", ChannelId::new(2));
        assert_eq!(COUNTER.calls.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_handler_replacement() {
        static FIRST: Counter = Counter {
            calls: AtomicU32::new(0),
        };

        let dispatcher: MessageDispatcher<NoopRawMutex> = MessageDispatcher::new();
        dispatcher.set_handler(&FIRST);
        dispatcher.dispatch(b"ping", ChannelId::new(2));

        dispatcher.set_handler(&NULL_HANDLER);
        dispatcher.dispatch(b"ignored", ChannelId::new(0));

        assert_eq!(FIRST.calls.load(Ordering::Relaxed), 1);
    }
}
