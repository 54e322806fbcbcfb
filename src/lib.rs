//! COVID-19 Dashboard - survey data pipeline
//!
//! Loads the county/day survey dataset from object storage, keeps it cached
//! for a bounded time, and aggregates metrics per state for choropleth maps.

pub mod charts;
pub mod config;
pub mod dashboard;
pub mod data;
pub mod stats;
