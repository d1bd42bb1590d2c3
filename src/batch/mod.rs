//! Batch redemption engine.
//!
//! This module provides:
//! - The single-attempt orchestrator (captcha → OCR → submit)
//! - The round scheduler with retry, cooldown and round budget
//! - The engine facade: background batch thread, snapshots, events
//! - Configuration loading and CSV export of results

pub mod attempt;
pub mod board;
pub mod config;
pub mod csv_writer;
pub mod events;
pub mod runner;
pub mod scheduler;

pub use attempt::{AttemptRunner, Orchestrator};
pub use board::{ResultBoard, StatusCounts};
pub use config::{get_config, init_config, RedeemConfig, SchedulerConfig};
pub use csv_writer::write_results_csv;
pub use events::{BatchEvent, BatchSummary, EventBus};
pub use runner::{BatchEngine, BatchError, BatchSnapshot};
pub use scheduler::{RoundScheduler, Sleeper, ThreadSleeper};
