//! Redeem Batch
//!
//! Resolves a list of redemption codes against a captcha-protected remote
//! service: every attempt fetches a captcha, cleans and recognizes it with
//! Tesseract, submits the code, and retries transient failures across rounds.

pub mod batch;
pub mod client;
pub mod ocr;
pub mod paths;
pub mod redeem;

use chrono::Local;
use std::fs::OpenOptions;
use std::io::Write;

/// Logs a message to both console and log file with timestamp.
pub fn log(msg: &str) {
    let timestamp = Local::now().format("%H:%M:%S%.3f");
    let line = format!("[{}] {}\n", timestamp, msg);
    print!("{}", line);
    let log_path = paths::get_logs_dir().join("redeem_batch.log");
    if let Ok(mut file) = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        let _ = file.write_all(line.as_bytes());
    }
}
