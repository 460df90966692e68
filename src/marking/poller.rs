//! The capture → recognize → lookup → highlight loop

use crossbeam_channel::Sender;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::events::SessionEvent;
use super::matcher::find_cell;
use crate::capture::Capturer;
use crate::config::SheetSettings;
use crate::error::PollError;
use crate::sheets::{SheetStore, Sleeper, ThreadSleeper};
use crate::vision::Recognizer;

/// Where identifiers are read from and how matches are marked
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetTarget {
    pub spreadsheet_id: String,
    pub range: String,
    pub sheet_tab_id: i64,
    pub highlight_color: String,
}

impl From<&SheetSettings> for SheetTarget {
    fn from(settings: &SheetSettings) -> Self {
        Self {
            spreadsheet_id: settings.spreadsheet_id.clone(),
            range: settings.range.clone(),
            sheet_tab_id: settings.sheet_tab_id,
            highlight_color: settings.highlight_color.clone(),
        }
    }
}

/// Counters for one run of the loop
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollStats {
    /// Iterations started
    pub iterations: u64,
    /// Iterations abandoned because capture failed
    pub skipped: u64,
    /// Recognized lines looked up in the sheet
    pub lines: u64,
    /// Lines that matched a row
    pub matches: u64,
}

/// Drives the marking loop against its collaborators
pub struct Poller {
    capturer: Box<dyn Capturer>,
    recognizer: Box<dyn Recognizer>,
    store: Box<dyn SheetStore>,
    target: SheetTarget,
    interval: Duration,
    sleeper: Arc<dyn Sleeper>,
    events: Option<Sender<SessionEvent>>,
}

impl Poller {
    pub fn new(
        capturer: Box<dyn Capturer>,
        recognizer: Box<dyn Recognizer>,
        store: Box<dyn SheetStore>,
        target: SheetTarget,
        interval: Duration,
    ) -> Self {
        Self {
            capturer,
            recognizer,
            store,
            target,
            interval,
            sleeper: Arc::new(ThreadSleeper),
            events: None,
        }
    }

    /// Replace how the pause between iterations is taken
    #[cfg_attr(not(test), allow(dead_code))]
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Report progress on `events`
    pub fn with_events(mut self, events: Sender<SessionEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Run until `cancel` fires or the store fails.
    ///
    /// The display is re-read from `display` at the start of every iteration.
    /// Returns the run's counters when cancelled.
    pub fn run(&self, cancel: &CancellationToken, display: &AtomicUsize) -> Result<PollStats, PollError> {
        let mut stats = PollStats::default();
        info!(
            "Poll loop started (range {} every {:?})",
            self.target.range, self.interval
        );

        while !cancel.is_cancelled() {
            stats.iterations += 1;
            self.run_iteration(cancel, display.load(Ordering::Relaxed), &mut stats)?;

            if cancel.is_cancelled() {
                break;
            }
            self.sleeper.sleep(self.interval);
        }

        info!(
            "Processing was canceled after {} iterations ({} matches)",
            stats.iterations, stats.matches
        );
        Ok(stats)
    }

    fn run_iteration(
        &self,
        cancel: &CancellationToken,
        display_index: usize,
        stats: &mut PollStats,
    ) -> Result<(), PollError> {
        let recognition = match self.capturer.capture(display_index) {
            Ok(frame) => {
                let (width, height) = frame.dimensions();
                debug!("Captured display {} ({}x{})", frame.display_index(), width, height);
                let recognition = self.recognizer.recognize(&frame);
                debug!(
                    "Recognized {} chars (confidence {:.2}) in {:?}",
                    recognition.text.len(),
                    recognition.confidence,
                    frame.timestamp.elapsed()
                );
                recognition
            }
            Err(e) => {
                warn!("Error during screen capture: {}", e);
                stats.skipped += 1;
                self.emit(SessionEvent::IterationSkipped {
                    reason: e.to_string(),
                });
                return Ok(());
            }
        };

        if recognition.is_blank() {
            debug!("No text recognized on display {}", display_index);
            return Ok(());
        }

        for line in recognition.lines() {
            if cancel.is_cancelled() {
                debug!("Stop requested, skipping remaining lines");
                break;
            }
            stats.lines += 1;
            self.process_line(line, stats)?;
        }

        Ok(())
    }

    fn process_line(&self, line: String, stats: &mut PollStats) -> Result<(), PollError> {
        let rows = self
            .store
            .read_range(&self.target.spreadsheet_id, &self.target.range)?;

        match find_cell(&rows, &line) {
            Some(location) => {
                info!("Text '{}' found in row {}.", line, location.row + 1);
                self.store.set_cell_color(
                    &self.target.spreadsheet_id,
                    self.target.sheet_tab_id,
                    location.row,
                    location.column,
                    &self.target.highlight_color,
                )?;
                stats.matches += 1;
                self.emit(SessionEvent::Matched { line, location });
            }
            None => {
                info!("Text '{}' not found in the sheet.", line);
                self.emit(SessionEvent::NotFound { line });
            }
        }

        Ok(())
    }

    fn emit(&self, event: SessionEvent) {
        if let Some(events) = &self.events {
            if events.send(event).is_err() {
                debug!("Session event receiver dropped");
            }
        }
    }
}
