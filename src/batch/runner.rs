//! Batch engine - main entry point for redeeming a list of codes.
//!
//! Owns the attempt pipeline, the result board and the event bus. A batch
//! runs on its own thread; callers watch it through snapshots or events.

use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use thiserror::Error;

use super::attempt::{AttemptRunner, Orchestrator};
use super::board::ResultBoard;
use super::config::{RedeemConfig, SchedulerConfig};
use super::events::{BatchEvent, BatchSummary, EventBus};
use super::scheduler::{RoundScheduler, RoundsReport, Sleeper, ThreadSleeper};
use crate::client::{HttpRedeemClient, PatternClassifier};
use crate::log;
use crate::ocr::{RecognizerError, TesseractRecognizer};
use crate::redeem::{parse_code_lines, RedemptionResult};

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("a batch is already running")]
    AlreadyRunning,
    #[error(transparent)]
    Recognizer(#[from] RecognizerError),
}

/// Read-only view of the engine for observers.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BatchSnapshot {
    pub results: Vec<RedemptionResult>,
    pub is_processing: bool,
    /// Terminal results as a rounded percentage of all results
    pub progress: u8,
    pub success_count: usize,
    pub used_count: usize,
    pub pending_count: usize,
}

pub struct BatchEngine<R: AttemptRunner + 'static> {
    config: SchedulerConfig,
    runner: Arc<Mutex<R>>,
    sleeper: Arc<dyn Sleeper>,
    board: ResultBoard,
    events: EventBus,
    processing: Arc<AtomicBool>,
}

impl BatchEngine<Orchestrator> {
    /// Builds the production engine: HTTP client, Tesseract, real sleeps.
    pub fn from_config(config: &RedeemConfig) -> Result<Self> {
        config.validate()?;
        let api = HttpRedeemClient::new(config)?;
        let classifier = PatternClassifier::new(&config.classifier)?;
        let recognizer = TesseractRecognizer::new(config.tesseract.clone());
        let orchestrator = Orchestrator::new(
            Arc::new(api),
            Arc::new(classifier),
            Box::new(recognizer),
            config.preprocess.clone(),
        );
        Ok(Self::new(config.scheduler(), orchestrator, Arc::new(ThreadSleeper)))
    }
}

impl<R: AttemptRunner + 'static> BatchEngine<R> {
    pub fn new(config: SchedulerConfig, runner: R, sleeper: Arc<dyn Sleeper>) -> Self {
        Self {
            config,
            runner: Arc::new(Mutex::new(runner)),
            sleeper,
            board: ResultBoard::new(),
            events: EventBus::new(),
            processing: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Registers an observer for batch events.
    pub fn subscribe(&self) -> Receiver<BatchEvent> {
        self.events.subscribe()
    }

    pub fn is_processing(&self) -> bool {
        self.processing.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> BatchSnapshot {
        let results = self.board.snapshot();
        let is_processing = self.is_processing();
        let counts = self.board.counts();
        BatchSnapshot {
            results,
            is_processing,
            progress: counts.progress(),
            success_count: counts.success,
            used_count: counts.used,
            pending_count: counts.pending,
        }
    }

    /// Starts a batch on a background thread and returns immediately.
    ///
    /// Raw lines are normalized, emptied lines dropped and duplicates
    /// removed. The previous batch's results are replaced. While a batch is
    /// running this does nothing and returns `AlreadyRunning`.
    pub fn start_batch<I, S>(&self, lines: I) -> Result<JoinHandle<BatchSummary>, BatchError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let job = self.begin(lines)?;
        Ok(thread::spawn(move || job.run()))
    }

    /// Same as `start_batch`, but runs on the calling thread.
    pub fn run_batch<I, S>(&self, lines: I) -> Result<BatchSummary, BatchError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Ok(self.begin(lines)?.run())
    }

    /// Clears all results. Rejected while a batch is running.
    pub fn reset(&self) -> Result<(), BatchError> {
        let _claim = self.claim()?;
        self.board.clear();
        Ok(())
    }

    /// Releases the recognizer. The next batch initializes it again.
    pub fn shutdown(&self) -> Result<(), BatchError> {
        let _claim = self.claim()?;
        self.runner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .release();
        Ok(())
    }

    /// Holds the in-flight flag for the duration of a short exclusive
    /// operation, so no batch can start underneath it.
    fn claim(&self) -> Result<FlagClaim<'_>, BatchError> {
        self.processing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| BatchError::AlreadyRunning)?;
        Ok(FlagClaim(&self.processing))
    }

    /// Claims the in-flight flag, prepares the runner and seeds the board.
    fn begin<I, S>(&self, lines: I) -> Result<BatchJob<R>, BatchError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if self
            .processing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            log("Batch already running, ignoring start request");
            return Err(BatchError::AlreadyRunning);
        }

        let prepared = self
            .runner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .prepare();
        if let Err(e) = prepared {
            self.processing.store(false, Ordering::SeqCst);
            log(&format!("Cannot start batch: {}", e));
            return Err(e.into());
        }

        let codes = parse_code_lines(lines);
        self.board.reset_to(&codes);

        log(&format!("Starting batch: {} unique codes", codes.len()));
        self.events.publish(BatchEvent::Started { total: codes.len() });

        Ok(BatchJob {
            config: self.config,
            runner: self.runner.clone(),
            sleeper: self.sleeper.clone(),
            board: self.board.clone(),
            events: self.events.clone(),
            processing: self.processing.clone(),
        })
    }
}

/// Releases the in-flight flag when dropped.
struct FlagClaim<'a>(&'a AtomicBool);

impl Drop for FlagClaim<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Everything the batch thread needs.
struct BatchJob<R: AttemptRunner> {
    config: SchedulerConfig,
    runner: Arc<Mutex<R>>,
    sleeper: Arc<dyn Sleeper>,
    board: ResultBoard,
    events: EventBus,
    processing: Arc<AtomicBool>,
}

impl<R: AttemptRunner> BatchJob<R> {
    fn run(self) -> BatchSummary {
        let mut guard = CompletionGuard {
            board: self.board.clone(),
            events: self.events.clone(),
            processing: self.processing.clone(),
            report: RoundsReport::default(),
        };

        let mut runner = self.runner.lock().unwrap_or_else(PoisonError::into_inner);
        let scheduler =
            RoundScheduler::new(self.config, &self.board, &self.events, self.sleeper.as_ref());
        guard.report = scheduler.run(&mut *runner);
        drop(runner);

        guard.summary()
    }
}

/// Clears the in-flight flag and announces completion when dropped, so both
/// happen even if the batch thread unwinds.
struct CompletionGuard {
    board: ResultBoard,
    events: EventBus,
    processing: Arc<AtomicBool>,
    report: RoundsReport,
}

impl CompletionGuard {
    fn summary(&self) -> BatchSummary {
        let counts = self.board.counts();
        BatchSummary {
            total: counts.total(),
            success: counts.success,
            used: counts.used,
            pending: counts.pending,
            rounds: self.report.rounds,
            exhausted: counts.pending > 0,
        }
    }
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        let summary = self.summary();
        self.processing.store(false, Ordering::SeqCst);
        log(&format!(
            "Batch complete: {} success, {} used, {} pending after {} rounds",
            summary.success, summary.used, summary.pending, summary.rounds
        ));
        self.events.publish(BatchEvent::Completed(summary));
    }
}
