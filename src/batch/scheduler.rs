//! Round scheduler - repeated sequential passes over the pending codes.
//!
//! Each round attempts every pending code once, one at a time. Terminal
//! outcomes settle a code for good; everything else waits for the next round.
//! The loop stops when nothing is pending or the round budget is spent.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Duration;

use super::attempt::AttemptRunner;
use super::board::ResultBoard;
use super::config::SchedulerConfig;
use super::events::{BatchEvent, EventBus};
use crate::log;
use crate::redeem::AttemptOutcome;

/// Blocking pause, replaceable in tests.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

/// Sleeps the current thread.
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// What the round loop did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RoundsReport {
    /// Rounds that attempted at least one code
    pub rounds: u32,
    /// Codes were still pending when the loop ended
    pub exhausted: bool,
}

pub struct RoundScheduler<'a> {
    config: SchedulerConfig,
    board: &'a ResultBoard,
    events: &'a EventBus,
    sleeper: &'a dyn Sleeper,
}

impl<'a> RoundScheduler<'a> {
    pub fn new(
        config: SchedulerConfig,
        board: &'a ResultBoard,
        events: &'a EventBus,
        sleeper: &'a dyn Sleeper,
    ) -> Self {
        Self {
            config,
            board,
            events,
            sleeper,
        }
    }

    /// Runs rounds until every code is terminal or `max_rounds` is reached.
    pub fn run(&self, runner: &mut dyn AttemptRunner) -> RoundsReport {
        let max_rounds = self.config.max_rounds;
        let mut report = RoundsReport::default();

        for round in 1..=max_rounds {
            let pending = self.board.pending();
            if pending.is_empty() {
                log(&format!("Round {}: nothing pending, stopping", round));
                break;
            }

            report.rounds = round;
            log(&format!(
                "Round {}/{} started: {} pending",
                round,
                max_rounds,
                pending.len()
            ));
            self.events.publish(BatchEvent::RoundStarted {
                round,
                pending: pending.len(),
            });

            for (index, code) in pending {
                self.process_one(runner, index, &code);
            }

            let counts = self.board.counts();
            if counts.pending == 0 {
                log("All codes resolved");
                break;
            }

            log(&format!(
                "Round {}/{} finished: {} success, {} used, {} pending",
                round, max_rounds, counts.success, counts.used, counts.pending
            ));

            if round < max_rounds {
                log(&format!(
                    "Waiting {:.1}s before round {}",
                    self.config.round_delay.as_secs_f32(),
                    round + 1
                ));
                self.sleeper.sleep(self.config.round_delay);
            }
        }

        report.exhausted = self.board.counts().pending > 0;
        if report.exhausted {
            log(&format!(
                "Round budget exhausted with {} codes pending",
                self.board.counts().pending
            ));
        }
        report
    }

    /// Attempts one code and records the outcome.
    fn process_one(&self, runner: &mut dyn AttemptRunner, index: usize, code: &str) {
        let outcome = catch_unwind(AssertUnwindSafe(|| runner.attempt(code))).unwrap_or_else(
            |payload| {
                AttemptOutcome::NetworkError(format!("attempt panicked: {}", panic_message(&*payload)))
            },
        );

        log(&format!("{}: {}", code, outcome));

        if outcome == AttemptOutcome::RateLimited {
            log(&format!(
                "Rate limited, cooling down {:.1}s",
                self.config.rate_limit_cooldown.as_secs_f32()
            ));
            self.events.publish(BatchEvent::RateLimited {
                code: code.to_string(),
                cooldown: self.config.rate_limit_cooldown,
            });
            self.sleeper.sleep(self.config.rate_limit_cooldown);
        }

        if let Some(result) = self.board.apply(index, &outcome) {
            self.events.publish(BatchEvent::Updated {
                index,
                result,
                progress: self.board.counts().progress(),
            });
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
