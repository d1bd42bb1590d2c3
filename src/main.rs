//! Redeem Batch
//!
//! Reads redemption codes (one per line) from a file or stdin, redeems them
//! against the configured service, and writes a results CSV.
//!
//! Usage: `redeem-batch [codes.txt]`

use anyhow::{anyhow, Context, Result};
use chrono::Local;
use std::fs;
use std::io::{self, BufRead};

use redeem_batch::batch::{self, BatchEngine, BatchEvent, BatchSummary};
use redeem_batch::redeem::parse_code_lines;
use redeem_batch::{log, paths};

fn main() -> Result<()> {
    // Set up panic hook to log panics
    std::panic::set_hook(Box::new(|panic_info| {
        let msg = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };
        let location = if let Some(loc) = panic_info.location() {
            format!(" at {}:{}:{}", loc.file(), loc.line(), loc.column())
        } else {
            String::new()
        };
        log(&format!("[PANIC]{} {}", location, msg));
    }));

    paths::ensure_directories()?;
    batch::init_config();
    let config = batch::get_config();

    let lines = read_input_lines()?;
    if parse_code_lines(&lines).is_empty() {
        log("No redemption codes in input, nothing to do");
        return Ok(());
    }

    let engine = BatchEngine::from_config(config)?;
    let events = engine.subscribe();
    let handle = engine.start_batch(&lines)?;

    for event in events.iter() {
        match event {
            BatchEvent::Started { total } => log(&format!("Redeeming {} codes", total)),
            BatchEvent::RoundStarted { round, pending } => {
                log(&format!("Round {}: {} pending", round, pending))
            }
            BatchEvent::Updated {
                result, progress, ..
            } => log(&format!(
                "[{:>3}%] {} -> {} ({})",
                progress, result.code, result.status, result.message
            )),
            BatchEvent::RateLimited { .. } => {}
            BatchEvent::Completed(_) => break,
        }
    }

    let summary = handle
        .join()
        .map_err(|_| anyhow!("Batch thread panicked"))?;

    let snapshot = engine.snapshot();
    let session_dir = paths::get_output_dir().join(Local::now().format("%Y%m%d_%H%M%S").to_string());
    fs::create_dir_all(&session_dir).context("Failed to create session directory")?;
    let csv_path = session_dir.join("results.csv");
    batch::write_results_csv(&csv_path, &snapshot.results)?;
    log(&format!("Results CSV: {}", csv_path.display()));

    engine.shutdown()?;
    print_summary(&summary);
    Ok(())
}

/// Reads code lines from the file named by the first argument, or stdin.
fn read_input_lines() -> Result<Vec<String>> {
    match std::env::args().nth(1) {
        Some(path) => {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read codes from {}", path))?;
            Ok(contents.lines().map(str::to_string).collect())
        }
        None => io::stdin()
            .lock()
            .lines()
            .collect::<io::Result<Vec<_>>>()
            .context("Failed to read codes from stdin"),
    }
}

fn print_summary(summary: &BatchSummary) {
    log(&format!(
        "Done: {} total, {} redeemed, {} used/invalid, {} unresolved ({} rounds)",
        summary.total, summary.success, summary.used, summary.pending, summary.rounds
    ));
    if summary.exhausted {
        log("Some codes are still pending; run again to retry them");
    }
}
