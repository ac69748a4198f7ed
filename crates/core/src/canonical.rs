//! Text normalisation shared by every ingestion stage.
//!
//! Exports coming out of the upstream systems carry byte-order marks, stray
//! punctuation and inconsistent casing in their header rows. These helpers
//! reduce a cell to a form that can be compared reliably.

const BOM: char = '\u{feff}';

/// Removes every byte-order-mark character, wherever it appears in the cell.
pub fn strip_bom(cell: &str) -> String {
    cell.replace(BOM, "")
}

/// Letters only, lower-cased. Used when searching for the header row.
pub fn canonical_header(cell: &str) -> String {
    cell.chars()
        .filter(|c| c.is_alphabetic())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Letters and digits only, lower-cased. Used to key a located header
/// column into its [`HeaderSpec`](crate::HeaderSpec).
pub fn canonical_column(cell: &str) -> String {
    cell.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// ASCII letters only, lower-cased. Applied to company names before rebate
/// rule tokens are searched for.
pub fn normalize_company(name: &str) -> String {
    name.chars()
        .filter(char::is_ascii_alphabetic)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}
