//! CSV export of batch results.
//!
//! Each row contains: code, status, message, last update time and retry count.

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::redeem::RedemptionResult;

/// CSV header row.
const CSV_HEADER: &str = "code,status,message,updated_at,retry_count";

/// Quotes a field if it contains a separator, quote or line break.
fn escape_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Formats one result as a CSV row (without line terminator).
pub fn format_row(result: &RedemptionResult) -> String {
    let updated_at = result
        .updated_at
        .map(|t| t.format("%Y-%m-%dT%H:%M:%S").to_string())
        .unwrap_or_default();
    format!(
        "{},{},{},{},{}",
        escape_field(&result.code),
        result.status,
        escape_field(&result.message),
        updated_at,
        result.retry_count
    )
}

/// Writes all results to `path`, replacing any existing file.
pub fn write_results_csv(path: &Path, results: &[RedemptionResult]) -> Result<()> {
    let file = File::create(path).context("Failed to create results CSV")?;
    let mut writer = BufWriter::new(file);
    writeln!(writer, "{}", CSV_HEADER).context("Failed to write CSV header")?;
    for result in results {
        writeln!(writer, "{}", format_row(result)).context("Failed to write CSV row")?;
    }
    writer.flush().context("Failed to flush results CSV")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::redeem::RedeemStatus;
    use chrono::{Local, TimeZone};
    use tempfile::tempdir;

    #[test]
    fn test_write_results_csv() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("results.csv");

        let mut used = RedemptionResult::pending("ABCD-EFGH-IJKL");
        used.status = RedeemStatus::Used;
        used.message = "兑换码已被使用".to_string();
        used.updated_at = Some(Local.with_ymd_and_hms(2025, 3, 1, 12, 30, 5).unwrap());
        used.retry_count = 2;

        write_results_csv(&path, &[used, RedemptionResult::pending("WXYZ")]).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], CSV_HEADER);
        assert_eq!(
            lines[1],
            "ABCD-EFGH-IJKL,used,兑换码已被使用,2025-03-01T12:30:05,2"
        );
        assert_eq!(lines[2], "WXYZ,pending,waiting,,0");
    }

    #[test]
    fn test_message_with_comma_is_quoted() {
        let mut result = RedemptionResult::pending("ABCD");
        result.message = "retry next round (HTTP 502, \"bad gateway\")".to_string();
        assert_eq!(
            format_row(&result),
            "ABCD,pending,\"retry next round (HTTP 502, \"\"bad gateway\"\")\",,0"
        );
    }

    #[test]
    fn test_overwrites_existing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("results.csv");
        std::fs::write(&path, "old content\nmore\n").unwrap();

        write_results_csv(&path, &[]).unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), format!("{}\n", CSV_HEADER));
    }
}
