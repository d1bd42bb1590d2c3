pub mod engine;
pub mod extract;
pub mod preprocess;
pub mod setup;

pub use engine::{Recognizer, RecognizerError, TesseractRecognizer};
pub use extract::extract_captcha_digits;
pub use preprocess::{clean_captcha, decode_captcha_image, PreprocessConfig};
pub use setup::TesseractConfig;

use anyhow::{anyhow, Result};

/// High-level function: encoded captcha → 4 digits.
///
/// Decodes the payload, cleans it, runs the recognizer and extracts the
/// digits. Any failure along the way is an error; the caller treats all of
/// them alike.
pub fn solve_captcha(
    recognizer: &mut dyn Recognizer,
    payload: &str,
    config: &PreprocessConfig,
) -> Result<String> {
    let img = decode_captcha_image(payload)?;
    let cleaned = clean_captcha(&img, config);
    let text = recognizer.recognize(&cleaned)?;

    crate::log(&format!("OCR raw text: {:?}", text.trim()));

    extract_captcha_digits(&text)
        .ok_or_else(|| anyhow!("fewer than 4 digits recognized in {:?}", text.trim()))
}
