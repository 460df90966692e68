//! Sheet Store Layer
//!
//! A thin remote row store over a spreadsheet: read a range, overwrite a range,
//! and color a single cell. Every call may fail transiently, so callers wrap
//! the concrete store in a [`RetryingStore`].

pub mod color;
pub mod google;
pub mod retry;

use crate::error::SheetError;

pub use color::Rgb;
pub use google::GoogleSheetsStore;
pub use retry::{RetryPolicy, RetryingStore, Sleeper, ThreadSleeper};

/// One row of cell values, identified by its index within the read range
pub type SheetRow = Vec<String>;

/// Remote spreadsheet operations
pub trait SheetStore: Send {
    /// Read every row of `range`; an empty range yields no rows
    fn read_range(&self, spreadsheet_id: &str, range: &str) -> Result<Vec<SheetRow>, SheetError>;

    /// Overwrite `range` with raw values
    fn write_range(
        &self,
        spreadsheet_id: &str,
        range: &str,
        values: &[SheetRow],
    ) -> Result<(), SheetError>;

    /// Set the background color of one cell, `color_hex` being `RRGGBB` with optional `#`
    fn set_cell_color(
        &self,
        spreadsheet_id: &str,
        sheet_tab_id: i64,
        row: usize,
        column: usize,
        color_hex: &str,
    ) -> Result<(), SheetError>;
}
