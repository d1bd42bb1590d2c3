use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::process::Command;

use crate::log;

#[cfg(windows)]
const TESSERACT_EXE: &str = "tesseract.exe";
#[cfg(not(windows))]
const TESSERACT_EXE: &str = "tesseract";

#[cfg(windows)]
const COMMON_INSTALL_DIRS: &[&str] = &[
    r"C:\Program Files\Tesseract-OCR",
    r"C:\Program Files (x86)\Tesseract-OCR",
];
#[cfg(not(windows))]
const COMMON_INSTALL_DIRS: &[&str] = &["/usr/bin", "/usr/local/bin", "/opt/homebrew/bin"];

#[cfg(windows)]
const SYSTEM_TESSDATA_DIRS: &[&str] = &[
    r"C:\Program Files\Tesseract-OCR\tessdata",
    r"C:\Program Files (x86)\Tesseract-OCR\tessdata",
];
#[cfg(not(windows))]
const SYSTEM_TESSDATA_DIRS: &[&str] = &[
    "/usr/share/tesseract-ocr/5/tessdata",
    "/usr/share/tesseract-ocr/4.00/tessdata",
    "/usr/share/tessdata",
    "/usr/local/share/tessdata",
    "/opt/homebrew/share/tessdata",
];

/// Where to find Tesseract, as configured in config.json.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TesseractConfig {
    /// Explicit path to the tesseract executable
    pub executable: Option<PathBuf>,
    /// Explicit tessdata directory
    pub tessdata_dir: Option<PathBuf>,
    /// Traineddata language to load
    pub language: String,
}

impl Default for TesseractConfig {
    fn default() -> Self {
        Self {
            executable: None,
            tessdata_dir: None,
            language: "eng".to_string(),
        }
    }
}

/// Resolved Tesseract installation.
#[derive(Clone, Debug, PartialEq)]
pub struct TesseractPaths {
    pub executable: PathBuf,
    /// None means "let tesseract use its compiled-in default"
    pub tessdata: Option<PathBuf>,
}

/// Returns the per-user directory for a bundled Tesseract copy
pub fn get_tesseract_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("redeem-batch")
        .join("tesseract")
}

/// Resolves the executable and tessdata directory, failing if no executable
/// can be found.
pub fn locate_tesseract(config: &TesseractConfig) -> Result<TesseractPaths> {
    let executable = find_tesseract_executable(config)?;
    let tessdata = find_tessdata_dir(config);

    match &tessdata {
        Some(dir) => log(&format!(
            "Tesseract found at: {} (tessdata: {})",
            executable.display(),
            dir.display()
        )),
        None => log(&format!(
            "Tesseract found at: {} (default tessdata)",
            executable.display()
        )),
    }

    Ok(TesseractPaths {
        executable,
        tessdata,
    })
}

/// Finds the Tesseract executable: configured path, our local dir, PATH, then
/// common install locations.
pub fn find_tesseract_executable(config: &TesseractConfig) -> Result<PathBuf> {
    if let Some(path) = &config.executable {
        if path.exists() {
            return Ok(path.clone());
        }
        return Err(anyhow!(
            "Configured tesseract executable does not exist: {}",
            path.display()
        ));
    }

    let local_exe = get_tesseract_dir().join(TESSERACT_EXE);
    if local_exe.exists() {
        return Ok(local_exe);
    }

    // Check PATH
    if let Ok(output) = Command::new("tesseract").arg("--version").output() {
        if output.status.success() {
            return Ok(PathBuf::from("tesseract"));
        }
    }

    for dir in COMMON_INSTALL_DIRS {
        let p = PathBuf::from(dir).join(TESSERACT_EXE);
        if p.exists() {
            return Ok(p);
        }
    }

    Err(anyhow!(
        "Tesseract not found. Install Tesseract-OCR, add it to PATH, or set \
         tesseract.executable in config.json"
    ))
}

/// Finds a tessdata directory containing the configured language.
pub fn find_tessdata_dir(config: &TesseractConfig) -> Option<PathBuf> {
    let traineddata = format!("{}.traineddata", config.language);

    if let Some(dir) = &config.tessdata_dir {
        return Some(dir.clone());
    }

    let local_tessdata = get_tesseract_dir().join("tessdata");
    if local_tessdata.join(&traineddata).exists() {
        return Some(local_tessdata);
    }

    // Check TESSDATA_PREFIX environment variable
    if let Ok(prefix) = std::env::var("TESSDATA_PREFIX") {
        let p = PathBuf::from(&prefix);
        if p.join(&traineddata).exists() {
            return Some(p);
        }
        let p = p.join("tessdata");
        if p.join(&traineddata).exists() {
            return Some(p);
        }
    }

    SYSTEM_TESSDATA_DIRS
        .iter()
        .map(PathBuf::from)
        .find(|p| p.join(&traineddata).exists())
}
