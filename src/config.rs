//! Configuration Module
//! Reads dashboard settings from the environment.

use std::{env, fmt, path::PathBuf, str::FromStr, time::Duration};

use tracing::{info, warn};

use crate::data::LoaderError;

pub const BUCKET_KEY: &str = "S3_BUCKET";
pub const PREFIX_KEY: &str = "S3_PREFIX";
pub const CACHE_TTL_KEY: &str = "CACHE_TTL_SECS";
pub const DATA_ROOT_KEY: &str = "DATA_ROOT";
pub const COUNTY_MAPS_KEY: &str = "DASHBOARD_COUNTY_MAPS";

/// Default cache time-to-live: one hour.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3600);

/// Remote storage location of the dataset. Used as the cache key.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct StorageLocation {
    container: String,
    prefix: String,
}

impl StorageLocation {
    pub fn new(container: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            container: container.into(),
            prefix: prefix.into(),
        }
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Object store URI, e.g. `s3://bucket/prefix/`.
    pub fn uri(&self) -> String {
        format!(
            "s3://{}/{}",
            self.container,
            self.prefix.trim_start_matches('/')
        )
    }
}

// Locations identify buckets and internal paths; keep them out of logs.
impl fmt::Debug for StorageLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageLocation")
            .field("container", &"<redacted>")
            .field("prefix", &"<redacted>")
            .finish()
    }
}

/// Dashboard settings.
#[derive(Clone)]
pub struct Settings {
    pub bucket: Option<String>,
    pub prefix: Option<String>,
    pub cache_ttl: Duration,
    pub data_root: Option<PathBuf>,
    pub county_maps: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bucket: None,
            prefix: None,
            cache_ttl: DEFAULT_CACHE_TTL,
            data_root: None,
            county_maps: false,
        }
    }
}

impl Settings {
    /// Load settings from process environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load settings through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_blank = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let cache_ttl = try_load::<u64, _>(&non_blank, CACHE_TTL_KEY)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_CACHE_TTL);
        let county_maps = try_load::<bool, _>(&non_blank, COUNTY_MAPS_KEY).unwrap_or(false);

        Self {
            bucket: non_blank(BUCKET_KEY),
            prefix: non_blank(PREFIX_KEY),
            cache_ttl,
            data_root: non_blank(DATA_ROOT_KEY).map(PathBuf::from),
            county_maps,
        }
    }

    /// Resolve the storage location, or report which keys are missing.
    pub fn storage_location(&self) -> Result<StorageLocation, LoaderError> {
        match (&self.bucket, &self.prefix) {
            (Some(bucket), Some(prefix)) => Ok(StorageLocation::new(bucket, prefix)),
            _ => {
                let mut missing = Vec::new();
                if self.bucket.is_none() {
                    missing.push(BUCKET_KEY);
                }
                if self.prefix.is_none() {
                    missing.push(PREFIX_KEY);
                }
                warn!(?missing, "storage location is not configured");
                Err(LoaderError::ConfigurationMissing { missing })
            }
        }
    }
}

fn try_load<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: FromStr,
    T::Err: fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        info!("{key} not set, using default");
        return None;
    };

    raw.parse::<T>()
        .map_err(|e| {
            warn!("Invalid {key} value: {e}, using default");
        })
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings_from(pairs: &[(&str, &str)]) -> Settings {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_when_optional_keys_absent() {
        let settings = settings_from(&[(BUCKET_KEY, "bucket"), (PREFIX_KEY, "covid/")]);
        assert_eq!(settings.cache_ttl, Duration::from_secs(3600));
        assert!(settings.data_root.is_none());
        assert!(!settings.county_maps);

        let location = settings.storage_location().unwrap();
        assert_eq!(location.container(), "bucket");
        assert_eq!(location.prefix(), "covid/");
        assert_eq!(location.uri(), "s3://bucket/covid/");
    }

    #[test]
    fn test_missing_keys_are_named() {
        let settings = settings_from(&[(PREFIX_KEY, "covid/")]);
        match settings.storage_location() {
            Err(LoaderError::ConfigurationMissing { missing }) => {
                assert_eq!(missing, vec![BUCKET_KEY]);
            }
            other => panic!("unexpected result: {other:?}"),
        }

        let settings = settings_from(&[(BUCKET_KEY, "  "), (PREFIX_KEY, "")]);
        match settings.storage_location() {
            Err(err @ LoaderError::ConfigurationMissing { .. }) => {
                let message = err.user_message();
                assert!(message.contains(BUCKET_KEY));
                assert!(message.contains(PREFIX_KEY));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_invalid_ttl_falls_back_to_default() {
        let settings = settings_from(&[(CACHE_TTL_KEY, "soon"), (COUNTY_MAPS_KEY, "true")]);
        assert_eq!(settings.cache_ttl, DEFAULT_CACHE_TTL);
        assert!(settings.county_maps);

        let settings = settings_from(&[(CACHE_TTL_KEY, "60")]);
        assert_eq!(settings.cache_ttl, Duration::from_secs(60));
    }

    #[test]
    fn test_location_debug_is_redacted() {
        let location = StorageLocation::new("secret-bucket", "internal/path");
        let rendered = format!("{location:?}");
        assert!(!rendered.contains("secret-bucket"));
        assert!(!rendered.contains("internal/path"));
    }
}
