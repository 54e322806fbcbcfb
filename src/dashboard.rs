//! Dashboard pipeline: load the survey dataset, aggregate it and describe
//! the maps for the renderer.

use polars::prelude::DataFrame;
use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::charts::{ChoroplethSpec, Metric};
use crate::config::Settings;
use crate::data::{ensure_not_empty, Clock, DataLoader, DataSource, LoaderError};
use crate::stats::AggregateError;

pub const PAGE_TITLE: &str = "COVID-19 Data Dashboard";

pub const DATA_INTRO: &str = "The dataset used in this study is derived from the COVID-19 Trends \
and Impact Survey (CTIS), conducted by the Delphi Group at Carnegie Mellon University. This \
dataset aggregates responses from a representative sample of Facebook users (aged 18+) at the \
U.S. county level. Responses were gathered during one-month time frame at the peak of the COVID \
pandemic (from January 07, 2021 to February 12, 2021), offering rich information to analyze \
temporal dynamics in health behaviors and perceptions. Each row represents one U.S. county in a \
given day.";

#[derive(Error, Debug)]
pub enum DashboardError {
    #[error(transparent)]
    Loader(#[from] LoaderError),
    #[error("Aggregation failed: {0}")]
    Aggregate(#[from] AggregateError),
}

impl DashboardError {
    /// Message suitable for showing to dashboard users.
    pub fn user_message(&self) -> String {
        match self {
            DashboardError::Loader(e) => e.user_message(),
            DashboardError::Aggregate(_) => "Unable to prepare the maps.".to_string(),
        }
    }
}

/// Page contents handed to the renderer.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardReport {
    pub title: &'static str,
    pub intro: &'static str,
    pub rows: usize,
    pub maps: Vec<ChoroplethSpec>,
}

/// Build the map descriptions for a loaded table.
///
/// State maps for every metric come first, followed by county maps when
/// `county_maps` is set.
pub fn build_maps(
    df: &DataFrame,
    county_maps: bool,
) -> Result<Vec<ChoroplethSpec>, AggregateError> {
    let mut maps: Vec<ChoroplethSpec> = Metric::ALL
        .par_iter()
        .map(|&metric| ChoroplethSpec::state_map(df, metric))
        .collect::<Result<_, _>>()?;

    if county_maps {
        let counties: Vec<ChoroplethSpec> = Metric::ALL
            .par_iter()
            .map(|&metric| ChoroplethSpec::county_map(df, metric))
            .collect::<Result<_, _>>()?;
        maps.extend(counties);
    }

    for map in maps.iter().filter(|m| !m.is_renderable()) {
        warn!(column = map.column, "no values to map");
    }

    Ok(maps)
}

/// Load the dataset configured in `settings` and describe the dashboard.
pub fn build_report<S: DataSource, C: Clock>(
    loader: &DataLoader<S, C>,
    settings: &Settings,
) -> Result<DashboardReport, DashboardError> {
    let location = settings.storage_location()?;
    let df = loader.load(&location)?;
    ensure_not_empty(&df)?;

    let maps = build_maps(&df, settings.county_maps)?;
    info!(rows = df.height(), maps = maps.len(), "dashboard ready");

    Ok(DashboardReport {
        title: PAGE_TITLE,
        intro: DATA_INTRO,
        rows: df.height(),
        maps,
    })
}
