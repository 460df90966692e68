//! Tesseract OCR backend
//!
//! Runs the `tesseract` executable on a temporary PNG and rebuilds the text
//! lines from its TSV word table.

use anyhow::{bail, Context, Result};
use std::io::Write;
use std::path::PathBuf;
use std::process::Command;
use tracing::{debug, warn};

use super::{Recognition, Recognizer};
use crate::capture::RasterImage;
use crate::config::RecognizerSettings;

/// TSV level of word rows
const WORD_LEVEL: &str = "5";
const TSV_COLUMNS: usize = 12;

/// OCR through the tesseract command line tool
pub struct TesseractRecognizer {
    executable: PathBuf,
    language: String,
    tessdata_dir: Option<PathBuf>,
}

impl TesseractRecognizer {
    pub fn new(settings: &RecognizerSettings) -> Self {
        Self {
            executable: settings.tesseract_path.clone(),
            language: settings.language.clone(),
            tessdata_dir: settings.tessdata_dir.clone(),
        }
    }

    fn command(&self, input: &std::path::Path) -> Command {
        let mut cmd = Command::new(&self.executable);
        cmd.arg(input).arg("stdout").arg("-l").arg(&self.language);
        if let Some(dir) = &self.tessdata_dir {
            cmd.arg("--tessdata-dir").arg(dir);
        }
        cmd.arg("tsv");
        cmd
    }

    fn run(&self, image: &dyn RasterImage) -> Result<Recognition> {
        let png = image.encode_png().context("Failed to encode frame as PNG")?;

        let mut input = tempfile::Builder::new()
            .prefix("automarking-")
            .suffix(".png")
            .tempfile()
            .context("Failed to create temp file for OCR input")?;
        input.write_all(&png).context("Failed to write OCR input")?;
        input.flush().context("Failed to flush OCR input")?;

        let output = self
            .command(input.path())
            .output()
            .with_context(|| format!("Failed to run {:?}", self.executable))?;

        if !output.status.success() {
            bail!(
                "tesseract exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        Ok(parse_tsv(&String::from_utf8_lossy(&output.stdout)))
    }
}

impl Recognizer for TesseractRecognizer {
    fn recognize(&self, image: &dyn RasterImage) -> Recognition {
        if image.pixels().is_empty() {
            return Recognition::empty();
        }

        debug!("Tesseract: Processing {}x{} image", image.width(), image.height());

        match self.run(image) {
            Ok(recognition) => {
                debug!("Tesseract confidence: {:.2}", recognition.confidence);
                recognition
            }
            Err(e) => {
                warn!("Error during OCR: {:#}", e);
                Recognition::empty()
            }
        }
    }
}

/// Rebuild text lines and mean word confidence from tesseract TSV output
pub fn parse_tsv(tsv: &str) -> Recognition {
    let mut lines: Vec<((&str, &str, &str, &str), Vec<&str>)> = Vec::new();
    let mut confidence_sum = 0.0f32;
    let mut confidence_count = 0u32;

    for row in tsv.lines() {
        let columns: Vec<&str> = row.splitn(TSV_COLUMNS, '\t').collect();
        if columns.len() < TSV_COLUMNS || columns[0] != WORD_LEVEL {
            continue;
        }

        let word = columns[11].trim();
        if word.is_empty() {
            continue;
        }

        if let Ok(conf) = columns[10].trim().parse::<f32>() {
            if conf >= 0.0 {
                confidence_sum += conf;
                confidence_count += 1;
            }
        }

        let key = (columns[1], columns[2], columns[3], columns[4]);
        let same_line = lines.last().is_some_and(|(last_key, _)| *last_key == key);
        match lines.last_mut() {
            Some((_, words)) if same_line => words.push(word),
            _ => lines.push((key, vec![word])),
        }
    }

    let text = lines
        .iter()
        .map(|(_, words)| words.join(" "))
        .collect::<Vec<_>>()
        .join("\n");

    let confidence = if confidence_count == 0 {
        0.0
    } else {
        (confidence_sum / confidence_count as f32 / 100.0).clamp(0.0, 1.0)
    };

    Recognition::new(text, confidence)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::CapturedFrame;
    use image::RgbaImage;

    const HEADER: &str =
        "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext";

    #[test]
    fn test_parse_tsv_groups_words_into_lines() {
        let tsv = format!(
            "{HEADER}\n\
             1\t1\t0\t0\t0\t0\t0\t0\t800\t600\t-1\t\n\
             4\t1\t1\t1\t1\t0\t10\t10\t200\t20\t-1\t\n\
             5\t1\t1\t1\t1\t1\t10\t10\t60\t20\t90\tStudent\n\
             5\t1\t1\t1\t1\t2\t80\t10\t60\t20\t80\tID001\n\
             5\t1\t1\t1\t2\t1\t10\t40\t60\t20\t70\tID002\n"
        );

        let recognition = parse_tsv(&tsv);
        assert_eq!(recognition.text, "Student ID001\nID002");
        assert!((recognition.confidence - 0.8).abs() < 1e-4);
    }

    #[test]
    fn test_parse_tsv_skips_empty_words_and_negative_confidence() {
        let tsv = format!(
            "{HEADER}\n\
             5\t1\t1\t1\t1\t1\t0\t0\t1\t1\t-1\t \n\
             5\t1\t2\t1\t1\t1\t0\t0\t1\t1\t50\tok\n"
        );

        let recognition = parse_tsv(&tsv);
        assert_eq!(recognition.text, "ok");
        assert!((recognition.confidence - 0.5).abs() < 1e-4);
    }

    #[test]
    fn test_parse_tsv_empty_output() {
        let recognition = parse_tsv(HEADER);
        assert!(recognition.is_blank());
        assert_eq!(recognition.confidence, 0.0);
    }

    #[test]
    fn test_missing_executable_degrades_to_empty_text() {
        let recognizer = TesseractRecognizer::new(&RecognizerSettings {
            tesseract_path: PathBuf::from("/nonexistent/bin/tesseract"),
            ..Default::default()
        });
        let frame = CapturedFrame::new(RgbaImage::new(8, 8), 0);

        assert_eq!(recognizer.recognize(&frame), Recognition::empty());
    }

    #[test]
    fn test_zero_sized_image_is_empty() {
        let recognizer = TesseractRecognizer::new(&RecognizerSettings::default());
        let frame = CapturedFrame::new(RgbaImage::new(0, 0), 0);

        assert!(recognizer.recognize(&frame).is_blank());
    }
}
