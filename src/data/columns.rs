//! Column names of the survey dataset.

/// County FIPS code.
pub const GEO_COL: &str = "geo_value";
/// Two-letter state abbreviation; the aggregation key.
pub const STATE_COL: &str = "state_abbr";
/// Observation day, stored as `YYYY-MM-DD` text.
pub const TIME_COL: &str = "time_value";
/// Share of people tested positive in the last 14 days (%).
pub const POSITIVE_COL: &str = "smoothed_wtested_positive_14d";
/// Share of people vaccinated (%).
pub const VACCINATED_COL: &str = "smoothed_wcovid_vaccinated";

pub const REQUIRED_COLUMNS: [&str; 5] = [
    GEO_COL,
    STATE_COL,
    TIME_COL,
    POSITIVE_COL,
    VACCINATED_COL,
];
