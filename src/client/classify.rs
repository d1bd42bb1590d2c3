use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Interprets the human-readable messages of declared failures.
///
/// The service does not expose machine-readable error kinds, so these
/// decisions rest on message wording. Swap the implementation when the
/// wording changes.
pub trait MessageClassifier: Send + Sync {
    /// The service is asking callers to slow down.
    fn is_rate_limited(&self, message: &str) -> bool;

    /// The submitted captcha digits were rejected, not the code.
    fn is_captcha_error(&self, message: &str) -> bool;
}

/// Patterns used by [`PatternClassifier`], loaded from config.json.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Matches "too frequent, try again later" messages
    pub rate_limit_pattern: String,
    /// Matches messages about the captcha itself
    pub captcha_error_pattern: String,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            rate_limit_pattern: "频繁|稍后".to_string(),
            captcha_error_pattern: "验证码".to_string(),
        }
    }
}

/// Classifies messages with configurable regular expressions.
#[derive(Clone, Debug)]
pub struct PatternClassifier {
    rate_limit: Regex,
    captcha_error: Regex,
}

impl PatternClassifier {
    pub fn new(config: &ClassifierConfig) -> Result<Self> {
        let rate_limit = Regex::new(&config.rate_limit_pattern)
            .context("Invalid classifier.rate_limit_pattern")?;
        let captcha_error = Regex::new(&config.captcha_error_pattern)
            .context("Invalid classifier.captcha_error_pattern")?;
        Ok(Self {
            rate_limit,
            captcha_error,
        })
    }
}

impl MessageClassifier for PatternClassifier {
    fn is_rate_limited(&self, message: &str) -> bool {
        self.rate_limit.is_match(message)
    }

    fn is_captcha_error(&self, message: &str) -> bool {
        self.captcha_error.is_match(message)
    }
}
