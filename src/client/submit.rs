use super::api::{ApiResponse, RedeemApi, RedeemRequest};
use super::classify::MessageClassifier;
use crate::redeem::AttemptOutcome;

/// Fallback message for a declared failure without text.
const DEFAULT_FAILURE_MESSAGE: &str = "redeem failed";

/// Submits a solved captcha together with the code and classifies the result.
pub fn submit_redemption(
    api: &dyn RedeemApi,
    classifier: &dyn MessageClassifier,
    request: &RedeemRequest,
) -> AttemptOutcome {
    match api.redeem_code(request) {
        Ok(response) => classify_redeem_response(&response, classifier),
        Err(e) => AttemptOutcome::NetworkError(format!("{:#}", e)),
    }
}

/// Maps a parsed redemption response to an attempt outcome.
///
/// Only captcha complaints are distinguished; every other declared failure
/// (unknown, expired, consumed, malformed) is treated as an invalid code.
pub fn classify_redeem_response<T>(
    response: &ApiResponse<T>,
    classifier: &dyn MessageClassifier,
) -> AttemptOutcome {
    if response.ok || response.code == Some(0) {
        return AttemptOutcome::Success;
    }

    let message = response
        .message()
        .unwrap_or(DEFAULT_FAILURE_MESSAGE)
        .to_string();

    if classifier.is_captcha_error(&message) {
        AttemptOutcome::CaptchaError(message)
    } else {
        AttemptOutcome::CodeInvalid(message)
    }
}
