//! Stats module - geographic aggregation

mod aggregator;

pub use aggregator::{
    normalize_fips, AggregateError, CountyValue, StateAggregator, StateSummary, ValueRange,
    COUNTY_RANGE,
};
