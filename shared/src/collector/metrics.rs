//! Collector counters.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Receives collector counters.
///
/// Increments are fire-and-forget: implementations must not block and must
/// swallow their own failures.
pub trait CollectorMetrics: Send + Sync {
    /// One inbound message (request) was received.
    fn increment_messages(&self);

    /// One inbound message was dropped before reaching the collector.
    fn increment_messages_dropped(&self);

    /// `quantity` spans were decoded.
    fn increment_spans(&self, quantity: usize);

    /// `quantity` decoded spans were not stored.
    fn increment_spans_dropped(&self, quantity: usize);

    /// `quantity` payload bytes were handed to the collector.
    fn increment_bytes(&self, quantity: usize);
}

/// Point-in-time copy of [`InMemoryCollectorMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    /// Messages received.
    pub messages: u64,
    /// Messages dropped.
    pub messages_dropped: u64,
    /// Spans decoded.
    pub spans: u64,
    /// Spans dropped.
    pub spans_dropped: u64,
    /// Payload bytes.
    pub bytes: u64,
}

/// Lock-free counters for one transport.
#[derive(Debug)]
pub struct InMemoryCollectorMetrics {
    transport: String,
    messages: AtomicU64,
    messages_dropped: AtomicU64,
    spans: AtomicU64,
    spans_dropped: AtomicU64,
    bytes: AtomicU64,
}

impl InMemoryCollectorMetrics {
    /// Creates zeroed counters labelled with `transport`.
    #[must_use]
    pub fn for_transport(transport: impl Into<String>) -> Self {
        Self {
            transport: transport.into(),
            messages: AtomicU64::new(0),
            messages_dropped: AtomicU64::new(0),
            spans: AtomicU64::new(0),
            spans_dropped: AtomicU64::new(0),
            bytes: AtomicU64::new(0),
        }
    }

    /// Returns the transport label.
    #[must_use]
    pub fn transport(&self) -> &str {
        &self.transport
    }

    /// Reads all counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            messages: self.messages.load(Ordering::Relaxed),
            messages_dropped: self.messages_dropped.load(Ordering::Relaxed),
            spans: self.spans.load(Ordering::Relaxed),
            spans_dropped: self.spans_dropped.load(Ordering::Relaxed),
            bytes: self.bytes.load(Ordering::Relaxed),
        }
    }
}

impl Default for InMemoryCollectorMetrics {
    fn default() -> Self {
        Self::for_transport("http")
    }
}

fn add(counter: &AtomicU64, quantity: usize) {
    counter.fetch_add(u64::try_from(quantity).unwrap_or(u64::MAX), Ordering::Relaxed);
}

impl CollectorMetrics for InMemoryCollectorMetrics {
    fn increment_messages(&self) {
        add(&self.messages, 1);
    }

    fn increment_messages_dropped(&self) {
        add(&self.messages_dropped, 1);
    }

    fn increment_spans(&self, quantity: usize) {
        add(&self.spans, quantity);
    }

    fn increment_spans_dropped(&self, quantity: usize) {
        add(&self.spans_dropped, quantity);
    }

    fn increment_bytes(&self, quantity: usize) {
        add(&self.bytes, quantity);
    }
}
