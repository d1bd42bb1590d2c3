use anyhow::{anyhow, Context};
use image::GrayImage;
use std::process::Command;
use tempfile::NamedTempFile;
use thiserror::Error;

use super::setup::{locate_tesseract, TesseractConfig, TesseractPaths};
use crate::log;

/// Characters Tesseract may emit for a captcha.
const DIGIT_WHITELIST: &str = "0123456789";

/// Page segmentation mode 7: treat the image as a single text line.
const PSM_SINGLE_LINE: &str = "7";

#[derive(Debug, Error)]
pub enum RecognizerError {
    #[error("recognizer initialization failed: {0}")]
    Init(String),
    #[error("recognizer is not initialized")]
    NotInitialized,
    #[error("recognition failed: {0}")]
    Recognition(String),
}

/// A long-lived character recognition resource.
///
/// `initialize` is idempotent and is called once before the first batch;
/// `shutdown` releases whatever `initialize` acquired.
pub trait Recognizer: Send {
    fn initialize(&mut self) -> Result<(), RecognizerError>;

    fn is_initialized(&self) -> bool;

    /// Returns the raw recognized text for a cleaned, single-line digit image.
    fn recognize(&mut self, img: &GrayImage) -> Result<String, RecognizerError>;

    fn shutdown(&mut self);
}

/// Recognizer backed by the Tesseract command line tool, restricted to digits.
pub struct TesseractRecognizer {
    config: TesseractConfig,
    paths: Option<TesseractPaths>,
}

impl TesseractRecognizer {
    pub fn new(config: TesseractConfig) -> Self {
        Self {
            config,
            paths: None,
        }
    }

    fn run(&self, paths: &TesseractPaths, img: &GrayImage) -> anyhow::Result<String> {
        // Save image to temporary file
        let temp_input = NamedTempFile::with_suffix(".png")?;
        img.save(temp_input.path())
            .context("Failed to write captcha image for Tesseract")?;

        let mut command = Command::new(&paths.executable);
        command
            .arg(temp_input.path())
            .arg("stdout")
            .arg("-l")
            .arg(&self.config.language)
            .arg("--psm")
            .arg(PSM_SINGLE_LINE)
            .arg("-c")
            .arg(format!("tessedit_char_whitelist={}", DIGIT_WHITELIST));
        if let Some(tessdata) = &paths.tessdata {
            command.arg("--tessdata-dir").arg(tessdata);
        }

        let output = command.output().context("Failed to run Tesseract")?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("Tesseract failed: {}", stderr.trim()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

impl Recognizer for TesseractRecognizer {
    fn initialize(&mut self) -> Result<(), RecognizerError> {
        if self.paths.is_some() {
            return Ok(());
        }

        let paths =
            locate_tesseract(&self.config).map_err(|e| RecognizerError::Init(format!("{:#}", e)))?;

        let version = Command::new(&paths.executable)
            .arg("--version")
            .output()
            .map_err(|e| RecognizerError::Init(format!("cannot run {}: {}", paths.executable.display(), e)))?;
        if !version.status.success() {
            return Err(RecognizerError::Init(format!(
                "{} --version exited with {}",
                paths.executable.display(),
                version.status
            )));
        }

        log("Tesseract recognizer initialized");
        self.paths = Some(paths);
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.paths.is_some()
    }

    fn recognize(&mut self, img: &GrayImage) -> Result<String, RecognizerError> {
        let paths = self.paths.as_ref().ok_or(RecognizerError::NotInitialized)?;
        self.run(paths, img)
            .map_err(|e| RecognizerError::Recognition(format!("{:#}", e)))
    }

    fn shutdown(&mut self) {
        if self.paths.take().is_some() {
            log("Tesseract recognizer shut down");
        }
    }
}
