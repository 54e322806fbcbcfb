//! Geographic Aggregator Module
//! Per-state means of survey metrics, plus the value range used to scale maps.

use polars::prelude::*;
use serde::Serialize;
use statrs::statistics::Statistics;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::data::columns::{GEO_COL, STATE_COL};

/// Fixed color range for county-level percentage maps.
pub const COUNTY_RANGE: ValueRange = ValueRange {
    min: 0.0,
    max: 100.0,
};

#[derive(Error, Debug)]
pub enum AggregateError {
    #[error("No table to aggregate")]
    EmptyInput,
    #[error("Column not found: {0}")]
    MissingColumn(String),
    #[error("Polars error: {0}")]
    PolarsError(#[from] PolarsError),
}

/// Mean of one metric over all observations of a state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateSummary {
    pub state_abbr: String,
    pub mean: f64,
    /// Non-missing observations behind `mean`; always at least one.
    pub observations: usize,
}

/// Inclusive bounds of a set of values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ValueRange {
    pub min: f64,
    pub max: f64,
}

impl ValueRange {
    pub fn contains(&self, value: f64) -> bool {
        self.min <= value && value <= self.max
    }

    pub fn span(&self) -> f64 {
        self.max - self.min
    }
}

/// One county observation of a metric.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountyValue {
    /// Five digit FIPS code.
    pub geo_value: String,
    pub value: f64,
}

/// Aggregates survey metrics over geographic keys.
pub struct StateAggregator;

impl StateAggregator {
    fn require_column<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Column, AggregateError> {
        df.column(name)
            .map_err(|_| AggregateError::MissingColumn(name.to_string()))
    }

    /// Drop rows whose metric is null or NaN. Every other row is kept as-is.
    pub fn filter_missing(df: &DataFrame, metric: &str) -> Result<DataFrame, AggregateError> {
        let values = Self::require_column(df, metric)?.cast(&DataType::Float64)?;
        let mask: BooleanChunked = values
            .f64()?
            .into_iter()
            .map(|v| v.is_some_and(|x| !x.is_nan()))
            .collect();

        Ok(df.filter(&mask)?)
    }

    /// Mean of `metric` per `state_abbr`, ignoring missing values.
    ///
    /// States with no usable observation are absent from the result, so a
    /// metric that is missing everywhere yields an empty collection. Rows
    /// without a state are skipped. The result is sorted by state.
    pub fn aggregate_by_state(
        df: Option<&DataFrame>,
        metric: &str,
    ) -> Result<Vec<StateSummary>, AggregateError> {
        let df = df.ok_or(AggregateError::EmptyInput)?;
        Self::require_column(df, STATE_COL)?;

        let filtered = Self::filter_missing(df, metric)?;
        let states = filtered.column(STATE_COL)?.cast(&DataType::String)?;
        let values = filtered.column(metric)?.cast(&DataType::Float64)?;

        let mut groups: BTreeMap<String, (f64, usize)> = BTreeMap::new();
        for (state, value) in states.str()?.into_iter().zip(values.f64()?.into_iter()) {
            if let (Some(state), Some(value)) = (state, value) {
                let (sum, count) = groups.entry(state.to_string()).or_insert((0.0, 0));
                *sum += value;
                *count += 1;
            }
        }

        Ok(groups
            .into_iter()
            .map(|(state_abbr, (sum, count))| StateSummary {
                state_abbr,
                mean: sum / count as f64,
                observations: count,
            })
            .collect())
    }

    /// Smallest and largest state mean, or `None` when there are no states.
    pub fn value_range(summaries: &[StateSummary]) -> Option<ValueRange> {
        if summaries.is_empty() {
            return None;
        }

        let means: Vec<f64> = summaries.iter().map(|s| s.mean).collect();
        Some(ValueRange {
            min: Statistics::min(&means),
            max: Statistics::max(&means),
        })
    }

    /// Per-county values of `metric`, one per non-missing row.
    pub fn county_values(
        df: &DataFrame,
        metric: &str,
    ) -> Result<Vec<CountyValue>, AggregateError> {
        Self::require_column(df, GEO_COL)?;

        let filtered = Self::filter_missing(df, metric)?;
        let geo = filtered.column(GEO_COL)?.cast(&DataType::String)?;
        let values = filtered.column(metric)?.cast(&DataType::Float64)?;

        Ok(geo
            .str()?
            .into_iter()
            .zip(values.f64()?.into_iter())
            .filter_map(|(geo, value)| {
                Some(CountyValue {
                    geo_value: normalize_fips(geo?),
                    value: value?,
                })
            })
            .collect())
    }
}

/// Zero-pad numeric county codes to five digits (`6037` -> `06037`).
pub fn normalize_fips(raw: &str) -> String {
    let trimmed = raw.trim();
    match trimmed.parse::<f64>() {
        Ok(code) if code >= 0.0 && code.fract() == 0.0 => format!("{:05}", code as u64),
        _ => trimmed.to_string(),
    }
}
