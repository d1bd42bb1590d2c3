//! Event channel for observers of a running batch.
//!
//! Each subscriber gets its own std::sync::mpsc receiver; the batch thread
//! publishes to all of them. Subscribers that dropped their receiver are
//! pruned on the next publish.

use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::redeem::RedemptionResult;

/// Final tallies of one batch.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BatchSummary {
    pub total: usize,
    pub success: usize,
    pub used: usize,
    pub pending: usize,
    /// Rounds actually started
    pub rounds: u32,
    /// True when the round budget ran out with codes still pending
    pub exhausted: bool,
}

impl BatchSummary {
    pub fn progress(&self) -> u8 {
        progress_percent(self.success + self.used, self.total)
    }
}

/// Percentage of terminal results, rounded to the nearest integer.
///
/// Only a fully settled batch reports 100; anything short of that is capped
/// at 99 even when rounding would reach 100.
pub fn progress_percent(terminal: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    if terminal >= total {
        return 100;
    }
    let percent = (terminal as f64 * 100.0 / total as f64).round() as u8;
    percent.min(99)
}

#[derive(Clone, Debug, PartialEq)]
pub enum BatchEvent {
    /// A batch was accepted with this many unique codes
    Started { total: usize },
    /// A round began (1-based) with this many pending codes
    RoundStarted { round: u32, pending: usize },
    /// A result entry changed
    Updated {
        index: usize,
        result: RedemptionResult,
        progress: u8,
    },
    /// The service throttled us; the engine pauses before the next code
    RateLimited { code: String, cooldown: Duration },
    /// Fired exactly once per batch, whatever the reason it ended
    Completed(BatchSummary),
}

/// Fan-out of batch events to any number of subscribers.
#[derive(Clone, Default)]
pub struct EventBus {
    subscribers: Arc<Mutex<Vec<Sender<BatchEvent>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new observer.
    pub fn subscribe(&self) -> Receiver<BatchEvent> {
        let (sender, receiver) = channel();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(sender);
        receiver
    }

    pub fn publish(&self, event: BatchEvent) {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|sender| sender.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
