//! Application Configuration
//!
//! Sheet target, polling cadence, retry policy and backend settings stored in TOML format.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::sheets::{RetryPolicy, Rgb};

/// Application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Target spreadsheet settings
    pub sheet: SheetSettings,
    /// Poll loop settings
    pub poll: PollSettings,
    /// Retry settings for remote calls
    pub retry: RetrySettings,
    /// Capture settings
    pub capture: CaptureSettings,
    /// OCR settings
    pub recognizer: RecognizerSettings,
}

impl AppConfig {
    /// Check the values the poll loop relies on
    pub fn validate(&self) -> Result<()> {
        if Rgb::from_hex(&self.sheet.highlight_color).is_err() {
            bail!("highlight_color '{}' is not a six digit hex color", self.sheet.highlight_color);
        }
        if self.poll.interval_ms == 0 {
            bail!("poll interval must be greater than zero");
        }
        if self.retry.max_attempts == 0 {
            bail!("retry max_attempts must be at least 1");
        }
        if self.retry.backoff_base == 0 {
            bail!("retry backoff_base must be at least 1");
        }
        Ok(())
    }

    /// Validate, and additionally require a spreadsheet to talk to
    pub fn validate_for_store(&self) -> Result<()> {
        self.validate()?;
        if self.sheet.spreadsheet_id.trim().is_empty() {
            bail!("sheet.spreadsheet_id is not set");
        }
        if self.sheet.range.trim().is_empty() {
            bail!("sheet.range is not set");
        }
        Ok(())
    }
}

/// Which spreadsheet, range and tab the marker works against
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SheetSettings {
    /// Spreadsheet identifier from the sheet URL
    pub spreadsheet_id: String,
    /// Range holding the identifiers, only column 0 is consulted
    pub range: String,
    /// Numeric id of the tab the range lives on
    pub sheet_tab_id: i64,
    /// Background color applied to matched cells
    pub highlight_color: String,
    /// Sheets API root
    pub api_base_url: String,
    /// Environment variable holding an OAuth access token
    pub access_token_env: String,
}

impl Default for SheetSettings {
    fn default() -> Self {
        Self {
            spreadsheet_id: String::new(),
            range: "Sheet1!A1:A".to_string(),
            sheet_tab_id: 0,
            highlight_color: "#00FF00".to_string(),
            api_base_url: "https://sheets.googleapis.com".to_string(),
            access_token_env: "AUTOMARKING_ACCESS_TOKEN".to_string(),
        }
    }
}

/// Poll loop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollSettings {
    /// Pause between iterations in milliseconds
    pub interval_ms: u64,
}

impl PollSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Default for PollSettings {
    fn default() -> Self {
        Self { interval_ms: 1000 }
    }
}

/// Retry settings for transient remote failures
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Total attempts per remote call, including the first
    pub max_attempts: u32,
    /// Backoff base, the delay before attempt n+1 is base^n seconds
    pub backoff_base: u32,
}

impl RetrySettings {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, self.backoff_base)
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff_base: 2,
        }
    }
}

/// Capture source selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureBackend {
    /// Live monitors (requires the `screen` feature)
    #[default]
    Screen,
    /// Image files standing in for displays
    File,
}

/// Capture-related settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureSettings {
    /// Display to capture at startup (0 = primary)
    pub display_index: usize,
    /// Capture backend
    pub backend: CaptureBackend,
    /// Images used by the file backend, one per display index
    pub frame_paths: Vec<PathBuf>,
}

/// OCR settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognizerSettings {
    /// Path or name of the tesseract executable
    pub tesseract_path: PathBuf,
    /// Tesseract language code
    pub language: String,
    /// Optional tessdata directory
    pub tessdata_dir: Option<PathBuf>,
}

impl Default for RecognizerSettings {
    fn default() -> Self {
        Self {
            tesseract_path: PathBuf::from("tesseract"),
            language: "eng".to_string(),
            tessdata_dir: None,
        }
    }
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: AppConfig = toml::from_str(&content)?;
    Ok(config)
}

/// Save configuration to file
pub fn save_config(config: &AppConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}
