//! Data Processor Module
//! Schema validation and column cleaning for freshly loaded survey tables.

use polars::prelude::*;
use thiserror::Error;

use crate::data::columns::{REQUIRED_COLUMNS, TIME_COL};

/// Date format of the raw `time_value` column.
pub const TIME_FORMAT: &str = "%Y-%m-%d";

#[derive(Error, Debug)]
pub enum ProcessorError {
    #[error("Polars error: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("Missing required column(s): {}", .0.join(", "))]
    MissingColumns(Vec<String>),
}

/// Handles validation and cleaning of loaded tables.
pub struct DataProcessor;

impl DataProcessor {
    /// Check that every required survey column is present.
    pub fn validate_schema(df: &DataFrame) -> Result<(), ProcessorError> {
        let schema = df.schema();
        let missing: Vec<String> = REQUIRED_COLUMNS
            .iter()
            .filter(|name| !schema.contains(name))
            .map(|name| name.to_string())
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ProcessorError::MissingColumns(missing))
        }
    }

    /// Parse `time_value` from `YYYY-MM-DD` text into a date column.
    ///
    /// Values that do not match the format become null; the row is kept.
    /// Columns already stored as dates are left untouched.
    pub fn parse_time_values(df: DataFrame) -> Result<DataFrame, ProcessorError> {
        let dtype = df.column(TIME_COL)?.dtype().clone();
        let parsed = match dtype {
            DataType::Date => return Ok(df),
            DataType::Datetime(_, _) => col(TIME_COL).cast(DataType::Date),
            _ => col(TIME_COL)
                .cast(DataType::String)
                .str()
                .to_date(StrptimeOptions {
                    format: Some(TIME_FORMAT.into()),
                    strict: false,
                    exact: true,
                    cache: true,
                }),
        };

        let df = df
            .lazy()
            .with_column(parsed.alias(TIME_COL))
            .collect()?;
        Ok(df)
    }

    /// Validate and clean a loaded table.
    pub fn prepare(df: DataFrame) -> Result<DataFrame, ProcessorError> {
        Self::validate_schema(&df)?;
        Self::parse_time_values(df)
    }
}
