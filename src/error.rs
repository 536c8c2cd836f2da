use crate::schema::Column;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PortfolioError {
    #[error("Missing required column(s): {}", format_columns(.missing))]
    SchemaError { missing: Vec<Column> },

    #[error("Invalid value '{value}' in column '{column}' at row {row}")]
    InvalidValue {
        row: usize,
        column: Column,
        value: String,
    },

    #[error("Invalid filter selection: {0}")]
    InvalidSelection(String),

    #[error("Invalid pipeline configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid period label '{0}': expected YYYY, YYYY-MM, YYYYTn or YYYYSn")]
    InvalidPeriodLabel(String),

    #[error("Date calculation error: {0}")]
    DateError(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
}

fn format_columns(columns: &[Column]) -> String {
    columns
        .iter()
        .map(|c| c.name())
        .collect::<Vec<_>>()
        .join(", ")
}

pub type Result<T> = std::result::Result<T, PortfolioError>;
