//! Configuration types for batch redemption.
//!
//! Loads settings from config.json at startup. Provides the service address,
//! credentials, round timing, preprocessing parameters and message patterns.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

use crate::client::ClassifierConfig;
use crate::ocr::{PreprocessConfig, TesseractConfig};

/// Global configuration instance, initialized once at startup.
static CONFIG: OnceLock<RedeemConfig> = OnceLock::new();

/// Complete redemption configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedeemConfig {
    /// Service origin, e.g. `https://www.88code.org`
    pub base_url: String,
    /// Bearer token sent with every request
    pub auth_token: Option<String>,
    /// Path of the captcha endpoint (GET)
    pub captcha_path: String,
    /// Path of the redemption endpoint (POST)
    pub redeem_path: String,
    /// Per-request timeout (milliseconds)
    pub request_timeout_ms: u64,
    /// Maximum number of passes over the pending codes
    pub max_rounds: u32,
    /// Pause between rounds (milliseconds)
    pub round_delay_ms: u64,
    /// Pause after a rate-limited attempt (milliseconds)
    pub rate_limit_cooldown_ms: u64,
    /// Captcha cleaning parameters
    pub preprocess: PreprocessConfig,
    /// Patterns for interpreting service messages
    pub classifier: ClassifierConfig,
    /// Tesseract location
    pub tesseract: TesseractConfig,
}

impl Default for RedeemConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.88code.org".to_string(),
            auth_token: None,
            captcha_path: "/admin-api/cc-admin/redeem-code/captcha".to_string(),
            redeem_path: "/admin-api/cc-admin/redeem-code/redeem".to_string(),
            request_timeout_ms: 30000,
            max_rounds: 10,
            round_delay_ms: 2000,
            rate_limit_cooldown_ms: 3000,
            preprocess: PreprocessConfig::default(),
            classifier: ClassifierConfig::default(),
            tesseract: TesseractConfig::default(),
        }
    }
}

impl RedeemConfig {
    /// Checks values serde cannot check.
    pub fn validate(&self) -> Result<()> {
        if self.max_rounds == 0 {
            return Err(anyhow!("max_rounds must be at least 1"));
        }
        if self.base_url.trim().is_empty() {
            return Err(anyhow!("base_url must not be empty"));
        }
        self.preprocess.validate()
    }

    /// Round timing used by the scheduler.
    pub fn scheduler(&self) -> SchedulerConfig {
        SchedulerConfig {
            max_rounds: self.max_rounds,
            round_delay: Duration::from_millis(self.round_delay_ms),
            rate_limit_cooldown: Duration::from_millis(self.rate_limit_cooldown_ms),
        }
    }
}

/// Round budget and fixed delays.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SchedulerConfig {
    pub max_rounds: u32,
    pub round_delay: Duration,
    pub rate_limit_cooldown: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        RedeemConfig::default().scheduler()
    }
}

/// Reads and validates a config file.
pub fn read_config(path: &Path) -> Result<RedeemConfig> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let config: RedeemConfig = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    config.validate()?;
    Ok(config)
}

/// Loads configuration from config.json next to the executable, or returns
/// defaults.
fn load_config() -> RedeemConfig {
    let config_path = crate::paths::get_config_path();

    crate::log(&format!("Looking for config at: {}", config_path.display()));

    if !config_path.exists() {
        crate::log("config.json not found. Using default config.");
        return RedeemConfig::default();
    }

    match read_config(&config_path) {
        Ok(config) => {
            crate::log("Config loaded from config.json");
            config
        }
        Err(e) => {
            crate::log(&format!("{:#}. Using defaults.", e));
            RedeemConfig::default()
        }
    }
}

/// Initializes the global configuration. Call once at startup.
pub fn init_config() {
    let _ = CONFIG.set(load_config());
}

/// Returns the global configuration, loading it on first use.
pub fn get_config() -> &'static RedeemConfig {
    CONFIG.get_or_init(load_config)
}
