//! One end-to-end redemption attempt: captcha → OCR → submit.

use std::sync::Arc;

use crate::client::{
    acquire_captcha, submit_redemption, CaptchaFetch, MessageClassifier, RedeemApi,
    RedeemRequest,
};
use crate::ocr::{solve_captcha, PreprocessConfig, Recognizer, RecognizerError};
use crate::redeem::AttemptOutcome;

/// Runs single attempts for the scheduler.
pub trait AttemptRunner: Send {
    /// Acquires long-lived resources. Called before every batch; must be
    /// cheap once already prepared.
    fn prepare(&mut self) -> Result<(), RecognizerError> {
        Ok(())
    }

    /// Makes one attempt for `code`. Never fails: every failure is an outcome.
    fn attempt(&mut self, code: &str) -> AttemptOutcome;

    /// Releases what `prepare` acquired.
    fn release(&mut self) {}
}

/// The production attempt pipeline.
pub struct Orchestrator {
    api: Arc<dyn RedeemApi>,
    classifier: Arc<dyn MessageClassifier>,
    recognizer: Box<dyn Recognizer>,
    preprocess: PreprocessConfig,
}

impl Orchestrator {
    pub fn new(
        api: Arc<dyn RedeemApi>,
        classifier: Arc<dyn MessageClassifier>,
        recognizer: Box<dyn Recognizer>,
        preprocess: PreprocessConfig,
    ) -> Self {
        Self {
            api,
            classifier,
            recognizer,
            preprocess,
        }
    }
}

impl AttemptRunner for Orchestrator {
    fn prepare(&mut self) -> Result<(), RecognizerError> {
        if self.recognizer.is_initialized() {
            return Ok(());
        }
        self.recognizer.initialize()
    }

    fn attempt(&mut self, code: &str) -> AttemptOutcome {
        let challenge = match acquire_captcha(self.api.as_ref(), self.classifier.as_ref()) {
            CaptchaFetch::Challenge(challenge) => challenge,
            CaptchaFetch::RateLimited => return AttemptOutcome::RateLimited,
            CaptchaFetch::Failed(msg) => {
                return AttemptOutcome::NetworkError(format!("captcha unavailable: {}", msg));
            }
        };

        // The challenge is dropped here on failure; a new one is fetched next time
        let digits = match solve_captcha(
            self.recognizer.as_mut(),
            &challenge.image,
            &self.preprocess,
        ) {
            Ok(digits) => digits,
            Err(e) => return AttemptOutcome::OcrFailed(format!("{:#}", e)),
        };

        let request = RedeemRequest {
            captcha_code: digits,
            captcha_uuid: challenge.id,
            code: code.to_string(),
        };
        submit_redemption(self.api.as_ref(), self.classifier.as_ref(), &request)
    }

    fn release(&mut self) {
        self.recognizer.shutdown();
    }
}
