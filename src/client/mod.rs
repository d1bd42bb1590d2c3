//! Remote redemption service.
//!
//! This module provides:
//! - Wire types and the `RedeemApi` boundary trait
//! - A blocking reqwest implementation of that trait
//! - Captcha acquisition and redemption submission with outcome classification
//! - The message classifier extension point

pub mod api;
pub mod captcha;
pub mod classify;
pub mod http;
pub mod submit;

#[cfg(test)]
pub(crate) mod testing;

pub use api::{ApiResponse, CaptchaData, RedeemApi, RedeemRequest};
pub use captcha::{acquire_captcha, CaptchaChallenge, CaptchaFetch};
pub use classify::{ClassifierConfig, MessageClassifier, PatternClassifier};
pub use http::HttpRedeemClient;
pub use submit::submit_redemption;
