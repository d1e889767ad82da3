use std::sync::atomic::{AtomicU64, Ordering};

use super::Opcode;

/// Track packet counters without external dependencies.
pub(crate) struct Metrics;

static SENT_PACKETS: AtomicU64 = AtomicU64::new(0);
static RECEIVED_PACKETS: AtomicU64 = AtomicU64::new(0);
static DROPPED_PACKETS: AtomicU64 = AtomicU64::new(0);
static SEND_FAILURES: AtomicU64 = AtomicU64::new(0);
static REGISTRY_RESETS: AtomicU64 = AtomicU64::new(0);

const OPCODE_SLOTS: usize = 8;

struct OpcodeCounters {
    sent: [AtomicU64; OPCODE_SLOTS],
    received: [AtomicU64; OPCODE_SLOTS],
}

static OPCODE_COUNTERS: OpcodeCounters = OpcodeCounters::new();

impl OpcodeCounters {
    const fn new() -> Self {
        #[allow(clippy::declare_interior_mutable_const)]
        const ZERO: AtomicU64 = AtomicU64::new(0);
        Self {
            sent: [ZERO; OPCODE_SLOTS],
            received: [ZERO; OPCODE_SLOTS],
        }
    }

    fn increment(&self, direction: PacketDirection, opcode: Opcode) {
        let slot = usize::from(opcode.as_u8());
        let table = match direction {
            PacketDirection::Sent => &self.sent,
            PacketDirection::Received => &self.received,
        };
        table[slot].fetch_add(1, Ordering::Relaxed);
    }
}

/// Direction of packet flow for counting.
#[derive(Clone, Copy)]
pub(crate) enum PacketDirection {
    Sent,
    Received,
}

impl Metrics {
    #[inline]
    pub(crate) fn record_packet(direction: PacketDirection, opcode: Opcode) {
        match direction {
            PacketDirection::Sent => {
                SENT_PACKETS.fetch_add(1, Ordering::Relaxed);
            }
            PacketDirection::Received => {
                RECEIVED_PACKETS.fetch_add(1, Ordering::SeqCst);
            }
        }
        OPCODE_COUNTERS.increment(direction, opcode);
    }

    /// Count a received packet that was not applied. Always follows the packet's
    /// `record_packet(Received, ..)`, so drops never outnumber receipts.
    #[inline]
    pub(crate) fn record_dropped() {
        DROPPED_PACKETS.fetch_add(1, Ordering::SeqCst);
    }

    #[inline]
    pub(crate) fn record_send_failure() {
        SEND_FAILURES.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_reset() {
        REGISTRY_RESETS.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn totals() -> MetricsSnapshot {
        // Drops first: a concurrent receive can then only raise the denominator.
        let dropped_packets = DROPPED_PACKETS.load(Ordering::SeqCst);
        MetricsSnapshot {
            sent_packets: SENT_PACKETS.load(Ordering::Relaxed),
            received_packets: RECEIVED_PACKETS.load(Ordering::SeqCst),
            dropped_packets,
            send_failures: SEND_FAILURES.load(Ordering::Relaxed),
            registry_resets: REGISTRY_RESETS.load(Ordering::Relaxed),
        }
    }

    #[inline]
    pub(crate) fn count(direction: PacketDirection, opcode: Opcode) -> u64 {
        let slot = usize::from(opcode.as_u8());
        let table = match direction {
            PacketDirection::Sent => &OPCODE_COUNTERS.sent,
            PacketDirection::Received => &OPCODE_COUNTERS.received,
        };
        table[slot].load(Ordering::Relaxed)
    }
}

/// Process-wide packet counters.
#[derive(Default, Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MetricsSnapshot {
    /// Datagrams handed to the socket
    pub sent_packets: u64,
    /// Inbound datagrams carrying a device opcode
    pub received_packets: u64,
    /// Received datagrams that were malformed or refused by the registry
    pub dropped_packets: u64,
    /// Sends the socket refused
    pub send_failures: u64,
    /// Registry resets
    pub registry_resets: u64,
}

impl MetricsSnapshot {
    /// Fraction of received packets that were dropped, in `0.0..=1.0`.
    #[must_use]
    pub fn drop_ratio(&self) -> Option<f64> {
        if self.received_packets == 0 {
            return None;
        }
        #[allow(clippy::cast_precision_loss)]
        Some(self.dropped_packets as f64 / self.received_packets as f64)
    }
}

/// Current values of the process-wide packet counters.
#[must_use]
pub fn metrics() -> MetricsSnapshot {
    Metrics::totals()
}

/// Packets sent with the given opcode since process start.
#[must_use]
pub fn sent_count(opcode: Opcode) -> u64 {
    Metrics::count(PacketDirection::Sent, opcode)
}

/// Packets received with the given opcode since process start.
#[must_use]
pub fn received_count(opcode: Opcode) -> u64 {
    Metrics::count(PacketDirection::Received, opcode)
}
