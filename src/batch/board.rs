//! Result entries of the current batch.
//!
//! The board is shared between the batch thread and observers, but only the
//! crate's scheduler writes to it; everyone else reads cloned snapshots.

use chrono::Local;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::events::progress_percent;
use crate::redeem::{AttemptOutcome, RedeemStatus, RedemptionResult};

/// Counts per status.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub pending: usize,
    pub success: usize,
    pub used: usize,
}

impl StatusCounts {
    pub fn total(&self) -> usize {
        self.pending + self.success + self.used
    }

    pub fn terminal(&self) -> usize {
        self.success + self.used
    }

    pub fn progress(&self) -> u8 {
        progress_percent(self.terminal(), self.total())
    }
}

#[derive(Clone, Default)]
pub struct ResultBoard {
    entries: Arc<RwLock<Vec<RedemptionResult>>>,
}

impl ResultBoard {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<RedemptionResult>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<RedemptionResult>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of every entry, in batch order.
    pub fn snapshot(&self) -> Vec<RedemptionResult> {
        self.read().clone()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for entry in self.read().iter() {
            match entry.status {
                RedeemStatus::Pending => counts.pending += 1,
                RedeemStatus::Success => counts.success += 1,
                RedeemStatus::Used => counts.used += 1,
            }
        }
        counts
    }

    /// Indices and codes of the entries still pending.
    pub fn pending(&self) -> Vec<(usize, String)> {
        self.read()
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.status == RedeemStatus::Pending)
            .map(|(index, entry)| (index, entry.code.clone()))
            .collect()
    }

    /// Replaces the whole board with fresh pending entries.
    pub(crate) fn reset_to(&self, codes: &[String]) {
        *self.write() = codes
            .iter()
            .map(|code| RedemptionResult::pending(code.as_str()))
            .collect();
    }

    pub(crate) fn clear(&self) {
        self.write().clear();
    }

    /// Applies an attempt outcome to one entry and returns the updated entry.
    ///
    /// Terminal entries are left untouched (returns None).
    pub(crate) fn apply(&self, index: usize, outcome: &AttemptOutcome) -> Option<RedemptionResult> {
        let mut entries = self.write();
        let entry = entries.get_mut(index)?;
        if entry.status.is_terminal() {
            return None;
        }

        entry.status = outcome.next_status();
        entry.message = outcome.result_message();
        entry.updated_at = Some(Local::now());
        if entry.status == RedeemStatus::Pending {
            entry.retry_count += 1;
        }
        Some(entry.clone())
    }
}
