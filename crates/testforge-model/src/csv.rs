//! CSV row model and the QMetry import header set

use serde::{Deserialize, Serialize};

/// Default column headers for QMetry test-case import, in emission order.
/// The first column is always the test-case ID; the consolidator's
/// duplicate-ID check reads it positionally.
pub const DEFAULT_HEADERS: [&str; 12] = [
    "Test Case ID",
    "Test Case Name",
    "Test Case Description",
    "Module",
    "Test Type",
    "Priority",
    "Estimated Time (mins)",
    "Preconditions",
    "Test Steps",
    "Expected Results",
    "Test Data",
    "Tags",
];

/// Returns the default header set as owned strings
#[must_use]
pub fn default_headers() -> Vec<String> {
    DEFAULT_HEADERS.iter().map(|h| (*h).to_string()).collect()
}

/// One CSV data row, cells aligned to the header set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsvRow {
    pub cells: Vec<String>,
}

impl CsvRow {
    /// Test-case ID (first cell). Empty string for an empty row.
    #[must_use]
    pub fn test_case_id(&self) -> &str {
        self.cells.first().map(String::as_str).unwrap_or("")
    }
}
