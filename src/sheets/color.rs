//! Hex color parsing for cell backgrounds

use serde::Serialize;

use crate::error::SheetError;

/// RGB color with channels normalized to 0.0 - 1.0, serialized the way the Sheets API expects
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Rgb {
    pub red: f32,
    pub green: f32,
    pub blue: f32,
}

impl Rgb {
    /// Parse `RRGGBB` or `#RRGGBB`
    pub fn from_hex(hex: &str) -> Result<Self, SheetError> {
        let invalid = || SheetError::InvalidColor(hex.to_string());
        let digits = hex.trim().strip_prefix('#').unwrap_or(hex.trim());

        if digits.len() != 6 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid());
        }

        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&digits[range], 16)
                .map(|v| v as f32 / 255.0)
                .map_err(|_| invalid())
        };

        Ok(Self {
            red: channel(0..2)?,
            green: channel(2..4)?,
            blue: channel(4..6)?,
        })
    }
}
