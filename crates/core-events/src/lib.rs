//! Core event types and sinks shared by the document-state crates.
//!
//! Producers (hint cache, line layout observers, the worker pool) never block
//! on the consumer: every sink is best-effort. A full channel drops the event
//! and bumps a telemetry counter instead of stalling the interactive path.

use crossbeam_channel::{Receiver, Sender, TrySendError};
use std::sync::atomic::{AtomicU64, Ordering};

// -------------------------------------------------------------------------------------------------
// Channel Policy
// -------------------------------------------------------------------------------------------------
// Events are coarse notifications ("something changed, re-render"), so dropping one when the
// consumer is behind loses nothing: the consumer will observe the newer state on its next pass.
// The bound keeps memory flat if the consumer stalls entirely.
// -------------------------------------------------------------------------------------------------
pub const EVENT_CHANNEL_CAP: usize = 1024;

// -------------------------------------------------------------------------------------------------
// Telemetry
// -------------------------------------------------------------------------------------------------
// Simple atomic counters (no locking, fetch_add relaxed). They can be inspected in unit tests or
// periodically logged.
// -------------------------------------------------------------------------------------------------
pub static EVENTS_SENT: AtomicU64 = AtomicU64::new(0);
pub static EVENTS_DROPPED_FULL: AtomicU64 = AtomicU64::new(0);
pub static EVENTS_DROPPED_CLOSED: AtomicU64 = AtomicU64::new(0);

/// Notifications produced by the document core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A batch of lines finished layout on a pool worker.
    LinesReady { count: usize },
    /// A hint collection cycle inserted, replaced or pruned entries.
    HintsChanged { generation: u64 },
    /// Something visible changed; the next frame should not reuse the cache.
    RenderRequested,
    Shutdown,
}

/// Destination for core events. Implementations must not block.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: Event);
}

/// Sink that discards everything.
pub struct NoopEventSink;

impl EventSink for NoopEventSink {
    fn emit(&self, _event: Event) {}
}

/// Bounded channel sink. Full or disconnected channels drop the event.
#[derive(Clone)]
pub struct ChannelSink {
    tx: Sender<Event>,
}

impl ChannelSink {
    pub fn new(tx: Sender<Event>) -> Self {
        Self { tx }
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: Event) {
        match self.tx.try_send(event) {
            Ok(()) => {
                EVENTS_SENT.fetch_add(1, Ordering::Relaxed);
            }
            Err(TrySendError::Full(ev)) => {
                EVENTS_DROPPED_FULL.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(target: "runtime.events", event = ?ev, "event_dropped_full");
            }
            Err(TrySendError::Disconnected(_)) => {
                EVENTS_DROPPED_CLOSED.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

/// Create a bounded event channel of `EVENT_CHANNEL_CAP` and wrap the sender.
pub fn channel() -> (ChannelSink, Receiver<Event>) {
    let (tx, rx) = crossbeam_channel::bounded(EVENT_CHANNEL_CAP);
    (ChannelSink::new(tx), rx)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventTelemetrySnapshot {
    pub sent: u64,
    pub dropped_full: u64,
    pub dropped_closed: u64,
}

pub fn telemetry_snapshot() -> EventTelemetrySnapshot {
    EventTelemetrySnapshot {
        sent: EVENTS_SENT.load(Ordering::Relaxed),
        dropped_full: EVENTS_DROPPED_FULL.load(Ordering::Relaxed),
        dropped_closed: EVENTS_DROPPED_CLOSED.load(Ordering::Relaxed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_sink_delivers_in_order() {
        let (sink, rx) = channel();
        sink.emit(Event::LinesReady { count: 3 });
        sink.emit(Event::RenderRequested);
        assert_eq!(rx.try_recv().unwrap(), Event::LinesReady { count: 3 });
        assert_eq!(rx.try_recv().unwrap(), Event::RenderRequested);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn full_channel_drops_without_blocking() {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let sink = ChannelSink::new(tx);
        let before = EVENTS_DROPPED_FULL.load(Ordering::Relaxed);
        sink.emit(Event::RenderRequested);
        sink.emit(Event::Shutdown);
        assert!(EVENTS_DROPPED_FULL.load(Ordering::Relaxed) > before);
        assert_eq!(rx.len(), 1);
    }

    #[test]
    fn closed_channel_is_counted() {
        let (sink, rx) = channel();
        drop(rx);
        let before = telemetry_snapshot().dropped_closed;
        sink.emit(Event::Shutdown);
        assert!(telemetry_snapshot().dropped_closed > before);
    }

    #[test]
    fn noop_sink_accepts_everything() {
        NoopEventSink.emit(Event::HintsChanged { generation: 1 });
    }
}
