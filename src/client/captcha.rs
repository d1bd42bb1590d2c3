use std::time::Duration;

use super::api::{ApiResponse, CaptchaData, RedeemApi};
use super::classify::MessageClassifier;
use crate::log;

/// A captcha to be solved for exactly one submission.
///
/// Deliberately not `Clone`: a challenge is consumed by the attempt that
/// fetched it.
#[derive(Debug, PartialEq)]
pub struct CaptchaChallenge {
    /// Opaque identifier sent back with the solution
    pub id: String,
    /// Encoded image (base64 or data URL)
    pub image: String,
    /// Declared validity window
    pub expires_in: Duration,
}

impl From<CaptchaData> for CaptchaChallenge {
    fn from(data: CaptchaData) -> Self {
        Self {
            id: data.captcha_uuid,
            image: data.captcha_base64_image,
            expires_in: Duration::from_secs(data.expire_seconds),
        }
    }
}

/// Result of one captcha request.
#[derive(Debug, PartialEq)]
pub enum CaptchaFetch {
    Challenge(CaptchaChallenge),
    /// The service said "too frequent, try later"
    RateLimited,
    /// Anything else: declared failure, missing payload, or transport error
    Failed(String),
}

/// Requests a fresh captcha and classifies the response.
pub fn acquire_captcha(api: &dyn RedeemApi, classifier: &dyn MessageClassifier) -> CaptchaFetch {
    match api.get_captcha() {
        Ok(response) => classify_captcha_response(response, classifier),
        Err(e) => {
            log(&format!("Captcha request failed: {:#}", e));
            CaptchaFetch::Failed(format!("{:#}", e))
        }
    }
}

/// Classifies a parsed captcha response.
pub fn classify_captcha_response(
    response: ApiResponse<CaptchaData>,
    classifier: &dyn MessageClassifier,
) -> CaptchaFetch {
    let message = response.message().map(str::to_string);

    if response.ok {
        if let Some(data) = response.data {
            return CaptchaFetch::Challenge(data.into());
        }
    }

    match message {
        Some(msg) if classifier.is_rate_limited(&msg) => CaptchaFetch::RateLimited,
        Some(msg) => CaptchaFetch::Failed(msg),
        None => CaptchaFetch::Failed("captcha request failed".to_string()),
    }
}
