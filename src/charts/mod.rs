//! Charts module - map descriptions handed to the renderer

mod choropleth;

pub use choropleth::{ChoroplethSpec, LocationMode, Metric, Regions, COUNTY_GEOJSON_URL};
