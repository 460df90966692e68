//! Vision/OCR Layer
//!
//! Extracts text from captured frames. Recognition never fails outward:
//! backends log their own problems and degrade to empty text.

pub mod tesseract;

use crate::capture::RasterImage;

pub use tesseract::TesseractRecognizer;

/// Text recognized in one frame
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Recognition {
    /// Recognized text, lines separated by `\n`
    pub text: String,
    /// Confidence score (0.0 - 1.0)
    pub confidence: f32,
}

impl Recognition {
    pub fn new(text: impl Into<String>, confidence: f32) -> Self {
        Self {
            text: text.into(),
            confidence,
        }
    }

    /// Result used when the engine could not produce anything
    pub fn empty() -> Self {
        Self::default()
    }

    /// True when there is nothing worth matching
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// Non-empty, trimmed lines of the recognized text
    pub fn lines(&self) -> Vec<String> {
        split_lines(&self.text)
    }
}

/// OCR engine
pub trait Recognizer: Send {
    fn recognize(&self, image: &dyn RasterImage) -> Recognition;
}

/// Split OCR output on `\n` / `\r`, dropping lines that are empty once trimmed
pub fn split_lines(text: &str) -> Vec<String> {
    text.split(['\n', '\r'])
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
