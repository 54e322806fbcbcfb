//! Choropleth Map Descriptions
//! Everything an external map renderer needs to draw one metric.

use polars::prelude::DataFrame;
use serde::Serialize;

use crate::data::columns::{POSITIVE_COL, VACCINATED_COL};
use crate::stats::{
    AggregateError, CountyValue, StateAggregator, StateSummary, ValueRange, COUNTY_RANGE,
};

/// County boundaries keyed by FIPS code.
pub const COUNTY_GEOJSON_URL: &str =
    "https://raw.githubusercontent.com/plotly/datasets/master/geojson-counties-fips.json";

/// Survey metrics shown on the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Metric {
    #[serde(rename = "tested_positive_14d")]
    TestedPositive14d,
    #[serde(rename = "covid_vaccinated")]
    CovidVaccinated,
}

impl Metric {
    pub const ALL: [Metric; 2] = [Metric::TestedPositive14d, Metric::CovidVaccinated];

    pub fn column(self) -> &'static str {
        match self {
            Metric::TestedPositive14d => POSITIVE_COL,
            Metric::CovidVaccinated => VACCINATED_COL,
        }
    }

    pub fn color_scale(self) -> &'static str {
        match self {
            Metric::TestedPositive14d => "Reds",
            Metric::CovidVaccinated => "Greens",
        }
    }

    fn rate_name(self) -> &'static str {
        match self {
            Metric::TestedPositive14d => "Positive Test Rate",
            Metric::CovidVaccinated => "Vaccination Rate",
        }
    }

    pub fn state_title(self) -> String {
        format!("Average COVID-19 {} by State", self.rate_name())
    }

    pub fn state_label(self) -> String {
        format!("Avg {} (%)", self.rate_name())
    }

    pub fn county_title(self) -> String {
        format!("COVID-19 {} by County", self.rate_name())
    }

    pub fn county_label(self) -> String {
        format!("{} (%)", self.rate_name())
    }
}

/// How map regions are matched to boundaries.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "mode", rename_all = "kebab-case")]
pub enum LocationMode {
    /// Two-letter state abbreviations.
    #[serde(rename = "USA-states")]
    UsaStates,
    /// Feature ids of a GeoJSON document.
    GeojsonId { geojson: String },
}

/// Regions of a map with their values.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Regions {
    States(Vec<StateSummary>),
    Counties(Vec<CountyValue>),
}

impl Regions {
    pub fn len(&self) -> usize {
        match self {
            Regions::States(states) => states.len(),
            Regions::Counties(counties) => counties.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Description of one choropleth map.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChoroplethSpec {
    pub title: String,
    pub metric: Metric,
    pub column: &'static str,
    pub label: String,
    pub color_scale: &'static str,
    pub location_mode: LocationMode,
    pub scope: &'static str,
    /// Color axis bounds; absent when there is nothing to draw.
    pub range: Option<ValueRange>,
    pub regions: Regions,
}

impl ChoroplethSpec {
    /// Map of per-state means, colored between the smallest and largest mean.
    pub fn state_map(df: &DataFrame, metric: Metric) -> Result<Self, AggregateError> {
        let summaries = StateAggregator::aggregate_by_state(Some(df), metric.column())?;
        let range = StateAggregator::value_range(&summaries);

        Ok(Self {
            title: metric.state_title(),
            metric,
            column: metric.column(),
            label: metric.state_label(),
            color_scale: metric.color_scale(),
            location_mode: LocationMode::UsaStates,
            scope: "usa",
            range,
            regions: Regions::States(summaries),
        })
    }

    /// Map of raw county values on a fixed 0-100 scale.
    pub fn county_map(df: &DataFrame, metric: Metric) -> Result<Self, AggregateError> {
        let counties = StateAggregator::county_values(df, metric.column())?;
        let range = (!counties.is_empty()).then_some(COUNTY_RANGE);

        Ok(Self {
            title: metric.county_title(),
            metric,
            column: metric.column(),
            label: metric.county_label(),
            color_scale: metric.color_scale(),
            location_mode: LocationMode::GeojsonId {
                geojson: COUNTY_GEOJSON_URL.to_string(),
            },
            scope: "usa",
            range,
            regions: Regions::Counties(counties),
        })
    }

    /// Whether the renderer has anything to draw.
    pub fn is_renderable(&self) -> bool {
        !self.regions.is_empty()
    }
}
