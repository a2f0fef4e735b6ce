//! Aggregated delivery progress of a batch.

use std::sync::{PoisonError, RwLock};

use cloudpost_mime::MessageStatus;
use serde::Serialize;

/// Latest status of every batch slot.
///
/// Workers deliver private copies of the batch messages, so the batch
/// itself never changes during a dispatch. Each transition is recorded
/// here instead, indexed by the message's position in the batch.
#[derive(Debug, Default)]
pub struct StatusTracker {
    statuses: RwLock<Vec<MessageStatus>>,
}

/// Number of batch slots in each status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    /// Not dispatched yet.
    pub not_sent: usize,
    /// Queued for a worker.
    pub queued: usize,
    /// Being submitted.
    pub sending: usize,
    /// Accepted by the server.
    pub sent: usize,
    /// Failed.
    pub failed: usize,
}

impl StatusCounts {
    /// Total number of slots.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.not_sent + self.queued + self.sending + self.sent + self.failed
    }

    /// Slots dispatched but not finished.
    #[must_use]
    pub const fn in_flight(&self) -> usize {
        self.queued + self.sending
    }
}

impl StatusTracker {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a slot and returns its index.
    pub(crate) fn register(&self, status: MessageStatus) -> usize {
        let mut statuses = self.statuses.write().unwrap_or_else(PoisonError::into_inner);
        statuses.push(status);
        statuses.len() - 1
    }

    /// Records the latest status of slot `index`. Unknown slots are ignored.
    pub(crate) fn record(&self, index: usize, status: MessageStatus) {
        let mut statuses = self.statuses.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(slot) = statuses.get_mut(index) {
            *slot = status;
        }
    }

    /// Latest status of slot `index`.
    #[must_use]
    pub fn status(&self, index: usize) -> Option<MessageStatus> {
        self.read().get(index).copied()
    }

    /// Copy of every slot's status, in batch order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<MessageStatus> {
        self.read().clone()
    }

    /// Number of slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Returns true if no slot is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Fraction of slots whose message was sent.
    ///
    /// An empty tracker yields `NaN` (0 / 0).
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn ratio(&self) -> f64 {
        let counts = self.counts();
        counts.sent as f64 / counts.total() as f64
    }

    /// Breakdown of slots by status.
    #[must_use]
    pub fn counts(&self) -> StatusCounts {
        self.read()
            .iter()
            .fold(StatusCounts::default(), |mut counts, status| {
                match status {
                    MessageStatus::NotSent => counts.not_sent += 1,
                    MessageStatus::Queued => counts.queued += 1,
                    MessageStatus::Sending => counts.sending += 1,
                    MessageStatus::Sent => counts.sent += 1,
                    MessageStatus::SendError => counts.failed += 1,
                }
                counts
            })
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Vec<MessageStatus>> {
        self.statuses.read().unwrap_or_else(PoisonError::into_inner)
    }
}
