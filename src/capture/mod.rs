//! Screen Capture Layer
//!
//! Produces still frames of a chosen display. Backends sit behind the
//! [`Capturer`] trait so the poll loop never touches a platform API directly.

pub mod frame;

use anyhow::Result;
use std::path::PathBuf;
use tracing::debug;

use crate::config::{CaptureBackend, CaptureSettings};
use crate::error::CaptureError;

pub use frame::{CapturedFrame, RasterImage};

/// A display that can be captured
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayInfo {
    /// Index passed to [`Capturer::capture`]
    pub index: usize,
    /// Human readable name
    pub name: String,
    /// Size in pixels, when known without capturing
    pub size: Option<(u32, u32)>,
    pub is_primary: bool,
}

/// Source of still frames
pub trait Capturer: Send {
    /// Capture the current contents of a display
    fn capture(&self, display_index: usize) -> Result<CapturedFrame, CaptureError>;

    /// List the displays this capturer can see
    fn displays(&self) -> Result<Vec<DisplayInfo>, CaptureError>;
}

/// Build the capturer selected in the configuration
pub fn build_capturer(settings: &CaptureSettings) -> Result<Box<dyn Capturer>> {
    match settings.backend {
        CaptureBackend::File => Ok(Box::new(FileCapturer::new(settings.frame_paths.clone()))),
        CaptureBackend::Screen => screen_capturer(),
    }
}

#[cfg(feature = "screen")]
fn screen_capturer() -> Result<Box<dyn Capturer>> {
    Ok(Box::new(screen::ScreenCapturer))
}

#[cfg(not(feature = "screen"))]
fn screen_capturer() -> Result<Box<dyn Capturer>> {
    anyhow::bail!(
        "screen capture is not compiled in; rebuild with `--features screen` or set capture.backend = \"file\""
    )
}

/// Treats each image file as a display, decoding it fresh on every capture
pub struct FileCapturer {
    paths: Vec<PathBuf>,
}

impl FileCapturer {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self { paths }
    }
}

impl Capturer for FileCapturer {
    fn capture(&self, display_index: usize) -> Result<CapturedFrame, CaptureError> {
        let path = self.paths.get(display_index).ok_or(CaptureError::InvalidDisplay {
            index: display_index,
            available: self.paths.len(),
        })?;

        debug!("Loading frame for display {} from {:?}", display_index, path);
        let image = image::open(path)
            .map_err(|e| CaptureError::Backend(format!("{}: {}", path.display(), e)))?
            .to_rgba8();

        Ok(CapturedFrame::new(image, display_index))
    }

    fn displays(&self) -> Result<Vec<DisplayInfo>, CaptureError> {
        Ok(self
            .paths
            .iter()
            .enumerate()
            .map(|(index, path)| DisplayInfo {
                index,
                name: path.display().to_string(),
                size: None,
                is_primary: index == 0,
            })
            .collect())
    }
}

#[cfg(feature = "screen")]
mod screen {
    use super::{CapturedFrame, Capturer, DisplayInfo};
    use crate::error::CaptureError;
    use xcap::Monitor;

    /// Live monitor capture, primary monitor first
    pub struct ScreenCapturer;

    fn monitors() -> Result<Vec<Monitor>, CaptureError> {
        let mut monitors = Monitor::all().map_err(|e| CaptureError::Backend(e.to_string()))?;
        monitors.sort_by_key(|m| !m.is_primary().unwrap_or(false));
        Ok(monitors)
    }

    impl Capturer for ScreenCapturer {
        fn capture(&self, display_index: usize) -> Result<CapturedFrame, CaptureError> {
            let monitors = monitors()?;
            let available = monitors.len();
            let monitor = monitors.get(display_index).ok_or(CaptureError::InvalidDisplay {
                index: display_index,
                available,
            })?;

            let image = monitor
                .capture_image()
                .map_err(|e| CaptureError::Backend(e.to_string()))?;

            Ok(CapturedFrame::new(image, display_index))
        }

        fn displays(&self) -> Result<Vec<DisplayInfo>, CaptureError> {
            Ok(monitors()?
                .iter()
                .enumerate()
                .map(|(index, m)| DisplayInfo {
                    index,
                    name: m.name().unwrap_or_else(|_| format!("Screen {}", index + 1)),
                    size: m.width().ok().zip(m.height().ok()),
                    is_primary: m.is_primary().unwrap_or(false),
                })
                .collect())
        }
    }
}
