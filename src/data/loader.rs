//! Dataset Loader Module
//! Cached bulk loading of the survey dataset from object storage.

use polars::prelude::*;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{error, info};

use crate::config::{StorageLocation, BUCKET_KEY, PREFIX_KEY};
use crate::data::cache::{Clock, DatasetCache, SystemClock};
use crate::data::processor::{DataProcessor, ProcessorError};
use crate::data::source::{DataSource, SourceError};

/// Loader failures. None of them carries storage details; those go to the
/// operator log instead.
#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("Storage location not configured (missing: {})", .missing.join(", "))]
    ConfigurationMissing { missing: Vec<&'static str> },
    #[error("Error loading data from database")]
    DataUnavailable,
    #[error("Dataset is empty")]
    EmptyDataset,
}

impl LoaderError {
    /// Message suitable for showing to dashboard users.
    pub fn user_message(&self) -> String {
        match self {
            LoaderError::ConfigurationMissing { .. } => format!(
                "Storage configuration not found. Please set both `{BUCKET_KEY}` \
                 (bucket name) and `{PREFIX_KEY}` (path prefix), e.g. \
                 {BUCKET_KEY}=\"your-bucket-name\" {PREFIX_KEY}=\"your-prefix-path/\""
            ),
            LoaderError::DataUnavailable => {
                "Unable to load data. Please check your db configuration and credentials."
                    .to_string()
            }
            LoaderError::EmptyDataset => "No data available to display.".to_string(),
        }
    }

    /// Whether this is a warning rather than an error for the user.
    pub fn is_warning(&self) -> bool {
        matches!(self, LoaderError::EmptyDataset)
    }
}

#[derive(Error, Debug)]
enum LoadFailure {
    #[error("read failed: {0}")]
    Source(#[from] SourceError),
    #[error("invalid dataset: {0}")]
    Processing(#[from] ProcessorError),
}

/// Loads the survey dataset, caching each location for a bounded time.
pub struct DataLoader<S: DataSource, C: Clock = SystemClock> {
    source: S,
    cache: DatasetCache<C>,
}

impl<S: DataSource> DataLoader<S, SystemClock> {
    pub fn new(source: S, ttl: Duration) -> Self {
        Self::with_cache(source, DatasetCache::new(ttl))
    }
}

impl<S: DataSource, C: Clock> DataLoader<S, C> {
    pub fn with_cache(source: S, cache: DatasetCache<C>) -> Self {
        Self { source, cache }
    }

    /// Load every Parquet file under `location` into one table.
    ///
    /// Cached tables are returned until the TTL elapses. A read that finds no
    /// rows succeeds with an empty table; use [`ensure_not_empty`] to
    /// turn that into [`LoaderError::EmptyDataset`].
    pub fn load(&self, location: &StorageLocation) -> Result<Arc<DataFrame>, LoaderError> {
        self.cache
            .get_or_load(location, || self.read_fresh(location))
            .map_err(|e| {
                error!(error = %e, "dataset load failed");
                LoaderError::DataUnavailable
            })
    }

    fn read_fresh(&self, location: &StorageLocation) -> Result<DataFrame, LoadFailure> {
        let start = Instant::now();
        let df = self.source.read(location)?;

        if df.height() == 0 {
            info!("dataset read returned no rows");
            return Ok(df);
        }

        let df = DataProcessor::prepare(df)?;
        info!(
            rows = df.height(),
            columns = df.width(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "dataset loaded"
        );
        Ok(df)
    }

    /// Force the next load of `location` to read from storage.
    pub fn invalidate(&self, location: &StorageLocation) {
        self.cache.invalidate(location);
    }

    /// Drop all cached tables.
    pub fn clear(&self) {
        self.cache.clear();
    }

    pub fn cache(&self) -> &DatasetCache<C> {
        &self.cache
    }
}

/// Fail with [`LoaderError::EmptyDataset`] when the table has no rows.
pub fn ensure_not_empty(df: &DataFrame) -> Result<(), LoaderError> {
    if df.height() == 0 {
        Err(LoaderError::EmptyDataset)
    } else {
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::data::cache::tests::ManualClock;
    use crate::data::columns::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Serves a fixed frame and counts reads.
    pub(crate) struct StaticSource {
        frame: DataFrame,
        pub(crate) reads: AtomicUsize,
    }

    impl StaticSource {
        pub(crate) fn new(frame: DataFrame) -> Self {
            Self {
                frame,
                reads: AtomicUsize::new(0),
            }
        }
    }

    impl DataSource for StaticSource {
        fn read(&self, _location: &StorageLocation) -> Result<DataFrame, SourceError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            Ok(self.frame.clone())
        }
    }

    /// Fails every read with a detailed error.
    struct FailingSource {
        reads: Mutex<usize>,
    }

    impl DataSource for FailingSource {
        fn read(&self, _location: &StorageLocation) -> Result<DataFrame, SourceError> {
            *self.reads.lock().unwrap() += 1;
            Err(SourceError::IoError(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "AccessDenied: s3://secret-bucket/internal/prefix",
            )))
        }
    }

    pub(crate) fn survey_frame() -> DataFrame {
        df!(
            GEO_COL => ["06037", "06059", "48201"],
            STATE_COL => ["CA", "CA", "TX"],
            TIME_COL => ["2021-01-07", "not-a-date", "2021-01-08"],
            POSITIVE_COL => [Some(10.0), Some(20.0), None],
            VACCINATED_COL => [Some(5.0), None, Some(7.0)],
        )
        .unwrap()
    }

    fn location() -> StorageLocation {
        StorageLocation::new("bucket", "covid/")
    }

    #[test]
    fn test_second_load_within_ttl_uses_cache() {
        let source = Arc::new(StaticSource::new(survey_frame()));
        let clock = Arc::new(ManualClock::new());
        let loader = DataLoader::with_cache(
            Arc::clone(&source),
            DatasetCache::with_clock(Duration::from_secs(3600), Arc::clone(&clock)),
        );

        let first = loader.load(&location()).unwrap();
        clock.advance(Duration::from_secs(3599));
        let second = loader.load(&location()).unwrap();

        assert_eq!(source.reads.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&first, &second));
        assert!(first.equals_missing(&second));

        clock.advance(Duration::from_secs(1));
        let third = loader.load(&location()).unwrap();
        assert_eq!(source.reads.load(Ordering::SeqCst), 2);
        assert!(first.equals_missing(&third));
    }

    #[test]
    fn test_invalidate_forces_fresh_read() {
        let source = Arc::new(StaticSource::new(survey_frame()));
        let loader = DataLoader::new(Arc::clone(&source), Duration::from_secs(3600));

        loader.load(&location()).unwrap();
        loader.invalidate(&location());
        loader.load(&location()).unwrap();
        assert_eq!(source.reads.load(Ordering::SeqCst), 2);

        loader.clear();
        assert!(loader.cache().is_empty());
    }

    #[test]
    fn test_load_parses_time_values() {
        let loader = DataLoader::new(StaticSource::new(survey_frame()), Duration::from_secs(60));
        let df = loader.load(&location()).unwrap();

        let times = df.column(TIME_COL).unwrap();
        assert_eq!(times.dtype(), &DataType::Date);
        assert_eq!(times.null_count(), 1);
        assert_eq!(df.height(), 3);
    }

    #[test]
    fn test_empty_read_is_not_a_failure() {
        let source = StaticSource::new(DataFrame::empty());
        let loader = DataLoader::new(source, Duration::from_secs(60));
        let df = loader.load(&location()).unwrap();

        assert_eq!(df.height(), 0);
        let err = ensure_not_empty(&df).unwrap_err();
        assert!(matches!(err, LoaderError::EmptyDataset));
        assert!(err.is_warning());
    }

    #[test]
    fn test_read_failure_is_generic() {
        let loader = DataLoader::new(
            FailingSource {
                reads: Mutex::new(0),
            },
            Duration::from_secs(60),
        );

        let err = loader.load(&location()).unwrap_err();
        assert!(matches!(err, LoaderError::DataUnavailable));
        assert!(!err.is_warning());
        for text in [err.to_string(), err.user_message()] {
            assert!(!text.contains("secret-bucket"));
            assert!(!text.contains("AccessDenied"));
        }

        // Failures are retried rather than cached.
        loader.load(&location()).unwrap_err();
        assert_eq!(*loader.source.reads.lock().unwrap(), 2);
    }

    #[test]
    fn test_schema_mismatch_is_unavailable() {
        let frame = df!(STATE_COL => ["CA"], POSITIVE_COL => [1.0]).unwrap();
        let loader = DataLoader::new(StaticSource::new(frame), Duration::from_secs(60));

        assert!(matches!(
            loader.load(&location()),
            Err(LoaderError::DataUnavailable)
        ));
    }
}
