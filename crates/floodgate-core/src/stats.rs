//! Per-channel delivery counters.

/// Snapshot of a channel's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelStats {
    /// Commands currently waiting for a permit.
    pub queued: usize,
    /// Commands the sender accepted.
    pub sent: u64,
    /// Commands consumed by a failed send.
    pub send_failures: u64,
    /// Commands evicted by the `drop-oldest` overflow policy.
    pub dropped: u64,
    /// Enqueues refused by the `reject` overflow policy.
    pub rejected: u64,
    /// Timer firings handled.
    pub ticks: u64,
}

impl ChannelStats {
    /// Commands that left the queue, successfully or not.
    pub fn delivered_or_failed(&self) -> u64 {
        self.sent + self.send_failures
    }
}
