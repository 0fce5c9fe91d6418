use rust_decimal::Decimal;
use thiserror::Error;

/// Reasons a single row could not be converted.
///
/// Column numbers are zero-based indices into the header row of the file.
#[derive(Debug, Clone, PartialEq, Error)]
pub(crate) enum DataRowError {
    #[error("Unexpected {col_name} '{value}' in column {col_num}")]
    UnexpectedType {
        col_num: usize,
        col_name: String,
        value: String,
    },
    #[error("Unexpected trading pair '{value}' in column {col_num} ({col_name})")]
    UnexpectedTradingPair {
        col_num: usize,
        col_name: String,
        value: String,
    },
    #[error("Missing component data for {col_name} '{value}' in column {col_num}")]
    MissingComponent {
        col_num: usize,
        col_name: String,
        value: String,
    },
    #[error("Unexpected {col_name} content '{value}' in column {col_num}")]
    UnexpectedContent {
        col_num: usize,
        col_name: String,
        value: String,
    },
    #[error("Invalid data format in {filename}{}", worksheet_suffix(.worksheet))]
    DataParserFormat {
        filename: String,
        worksheet: Option<String>,
    },
    #[error("Both legs of {refid} carry a fee ({fee1} and {fee2})")]
    ConflictingFeeLegs {
        refid: String,
        fee1: Decimal,
        fee2: Decimal,
    },
}

fn worksheet_suffix(worksheet: &Option<String>) -> String {
    match worksheet {
        Some(name) => format!(" (worksheet '{}')", name),
        None => String::new(),
    }
}
