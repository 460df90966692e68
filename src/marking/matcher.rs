//! Text normalization and first-match lookup of OCR lines against sheet rows

use crate::sheets::SheetRow;

/// Column holding the identifiers
pub const ID_COLUMN: usize = 0;

/// Position of a matched cell within the read range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellLocation {
    pub row: usize,
    pub column: usize,
}

/// Keep only alphanumeric characters, in order, case untouched
pub fn normalize(input: &str) -> String {
    input.chars().filter(|c| c.is_alphanumeric()).collect()
}

/// Find the first row whose identifier appears in `line`.
///
/// Both sides are normalized and compared case-insensitively; the row matches
/// when its identifier is a substring of the line. Rows with a blank
/// identifier never match.
pub fn find_cell(rows: &[SheetRow], line: &str) -> Option<CellLocation> {
    let haystack = normalize(line).to_lowercase();

    rows.iter()
        .position(|row| {
            let id = normalize(row.first().map(String::as_str).unwrap_or_default());
            !id.is_empty() && haystack.contains(&id.to_lowercase())
        })
        .map(|row| CellLocation {
            row,
            column: ID_COLUMN,
        })
}
