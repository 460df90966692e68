//! Application Coordinator
//!
//! Wires the configured capture, OCR and sheet backends into a poller.

use anyhow::{Context, Result};
use std::sync::Arc;

use crate::capture::build_capturer;
use crate::config::AppConfig;
use crate::marking::{Poller, SheetTarget};
use crate::sheets::{GoogleSheetsStore, RetryingStore, ThreadSleeper};
use crate::vision::TesseractRecognizer;

/// Google Sheets client wrapped in the configured retry policy
pub fn build_store(config: &AppConfig) -> Result<RetryingStore<GoogleSheetsStore>> {
    let store = GoogleSheetsStore::from_settings(&config.sheet)
        .context("Failed to create Google Sheets client")?;

    Ok(RetryingStore::new(
        store,
        config.retry.policy(),
        Arc::new(ThreadSleeper),
    ))
}

/// Poller over the configured backends
pub fn build_poller(config: &AppConfig) -> Result<Poller> {
    let capturer = build_capturer(&config.capture)?;
    let recognizer = TesseractRecognizer::new(&config.recognizer);
    let store = build_store(config)?;

    Ok(Poller::new(
        capturer,
        Box::new(recognizer),
        Box::new(store),
        SheetTarget::from(&config.sheet),
        config.poll.interval(),
    ))
}
