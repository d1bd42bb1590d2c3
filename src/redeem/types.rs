use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Processing status of one code within a batch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RedeemStatus {
    /// Not resolved yet; attempted again next round
    Pending,
    /// Redeemed by this batch
    Success,
    /// Rejected by the service (unknown, expired, consumed or malformed)
    Used,
}

impl RedeemStatus {
    /// Success and Used are never revisited.
    pub fn is_terminal(self) -> bool {
        matches!(self, RedeemStatus::Success | RedeemStatus::Used)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RedeemStatus::Pending => "pending",
            RedeemStatus::Success => "success",
            RedeemStatus::Used => "used",
        }
    }
}

impl std::fmt::Display for RedeemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Message shown for a code that has not been attempted yet.
pub const WAITING_MESSAGE: &str = "waiting";

/// Per-code result tracked for the lifetime of one batch.
#[derive(Clone, Debug, PartialEq)]
pub struct RedemptionResult {
    /// Normalized redemption code
    pub code: String,
    /// Current status
    pub status: RedeemStatus,
    /// Human-readable description of the last attempt
    pub message: String,
    /// Time of the last status update (None until first attempted)
    pub updated_at: Option<DateTime<Local>>,
    /// Number of attempts that left this code pending
    pub retry_count: u32,
}

impl RedemptionResult {
    /// Creates a fresh pending entry.
    pub fn pending(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            status: RedeemStatus::Pending,
            message: WAITING_MESSAGE.to_string(),
            updated_at: None,
            retry_count: 0,
        }
    }
}

/// Outcome of a single end-to-end redemption attempt.
///
/// Every failure path of an attempt collapses into exactly one of these
/// cases; the scheduler maps each case to a status transition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// The service accepted the code
    Success,
    /// The code itself was rejected (not found, expired, consumed, malformed)
    CodeInvalid(String),
    /// The captcha image could not be turned into 4 digits
    OcrFailed(String),
    /// The service rejected the solved captcha
    CaptchaError(String),
    /// Transport failure or unusable captcha response
    NetworkError(String),
    /// The service asked us to slow down
    RateLimited,
}

impl AttemptOutcome {
    /// Status the code moves to after this outcome.
    pub fn next_status(&self) -> RedeemStatus {
        match self {
            AttemptOutcome::Success => RedeemStatus::Success,
            AttemptOutcome::CodeInvalid(_) => RedeemStatus::Used,
            AttemptOutcome::OcrFailed(_)
            | AttemptOutcome::CaptchaError(_)
            | AttemptOutcome::NetworkError(_)
            | AttemptOutcome::RateLimited => RedeemStatus::Pending,
        }
    }

    /// Short machine-friendly name of the outcome kind.
    pub fn kind(&self) -> &'static str {
        match self {
            AttemptOutcome::Success => "success",
            AttemptOutcome::CodeInvalid(_) => "code_invalid",
            AttemptOutcome::OcrFailed(_) => "ocr_failed",
            AttemptOutcome::CaptchaError(_) => "captcha_error",
            AttemptOutcome::NetworkError(_) => "network_error",
            AttemptOutcome::RateLimited => "rate_limited",
        }
    }

    /// Message recorded on the result entry.
    pub fn result_message(&self) -> String {
        match self {
            AttemptOutcome::Success => "redeemed".to_string(),
            AttemptOutcome::CodeInvalid(msg) => msg.clone(),
            AttemptOutcome::RateLimited => "retry next round (rate limited)".to_string(),
            AttemptOutcome::OcrFailed(msg)
            | AttemptOutcome::CaptchaError(msg)
            | AttemptOutcome::NetworkError(msg) => format!("retry next round ({})", msg),
        }
    }
}

impl std::fmt::Display for AttemptOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttemptOutcome::Success | AttemptOutcome::RateLimited => write!(f, "{}", self.kind()),
            AttemptOutcome::CodeInvalid(msg)
            | AttemptOutcome::OcrFailed(msg)
            | AttemptOutcome::CaptchaError(msg)
            | AttemptOutcome::NetworkError(msg) => write!(f, "{}: {}", self.kind(), msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_table() {
        assert_eq!(AttemptOutcome::Success.next_status(), RedeemStatus::Success);
        assert_eq!(
            AttemptOutcome::CodeInvalid("expired".into()).next_status(),
            RedeemStatus::Used
        );
        assert_eq!(AttemptOutcome::RateLimited.next_status(), RedeemStatus::Pending);
        for outcome in [
            AttemptOutcome::OcrFailed("x".into()),
            AttemptOutcome::CaptchaError("x".into()),
            AttemptOutcome::NetworkError("x".into()),
        ] {
            assert_eq!(outcome.next_status(), RedeemStatus::Pending, "{}", outcome);
        }
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!RedeemStatus::Pending.is_terminal());
        assert!(RedeemStatus::Success.is_terminal());
        assert!(RedeemStatus::Used.is_terminal());
    }

    #[test]
    fn test_outcome_display() {
        assert_eq!(format!("{}", AttemptOutcome::RateLimited), "rate_limited");
        assert_eq!(
            format!("{}", AttemptOutcome::CaptchaError("验证码错误".into())),
            "captcha_error: 验证码错误"
        );
    }

    #[test]
    fn test_code_invalid_keeps_service_message() {
        let outcome = AttemptOutcome::CodeInvalid("兑换码已被使用".into());
        assert_eq!(outcome.result_message(), "兑换码已被使用");
        assert_eq!(
            AttemptOutcome::NetworkError("timeout".into()).result_message(),
            "retry next round (timeout)"
        );
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_string(&RedeemStatus::Used).unwrap();
        assert_eq!(json, "\"used\"");
    }
}
