//! Dataset Sources
//! Bulk reads of every Parquet file stored under a location.

use futures::TryStreamExt;
use glob::glob;
use object_store::aws::AmazonS3Builder;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;
use polars::prelude::*;
use std::fs::File;
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::runtime::{Builder, Runtime};
use tracing::debug;

use crate::config::StorageLocation;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Polars error: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Object store error: {0}")]
    ObjectStoreError(#[from] object_store::Error),
    #[error("Invalid file pattern: {0}")]
    PatternError(#[from] glob::PatternError),
    #[error("Unreadable path: {0}")]
    GlobError(#[from] glob::GlobError),
}

/// Reads the complete dataset stored under a location into one frame.
pub trait DataSource: Send + Sync {
    fn read(&self, location: &StorageLocation) -> Result<DataFrame, SourceError>;
}

impl<T: DataSource + ?Sized> DataSource for Arc<T> {
    fn read(&self, location: &StorageLocation) -> Result<DataFrame, SourceError> {
        self.as_ref().read(location)
    }
}

/// Stack Parquet parts into one frame, matching columns by name.
///
/// Every part is reordered to the column order of the first one. No parts
/// means an empty frame.
pub fn stack_parts(parts: Vec<DataFrame>) -> PolarsResult<DataFrame> {
    let mut parts = parts.into_iter();
    let Some(mut combined) = parts.next() else {
        return Ok(DataFrame::empty());
    };

    let names = combined.get_column_names_owned();
    for part in parts {
        combined.vstack_mut(&part.select(names.clone())?)?;
    }
    combined.align_chunks_par();
    Ok(combined)
}

fn is_parquet(key: &str) -> bool {
    key.ends_with(".parquet")
}

/// Reads Parquet objects through an object store client.
///
/// By default each location's container is an S3 bucket, with credentials
/// and region from the standard `AWS_*` environment. A fixed store can be
/// supplied instead, in which case the container is the first path segment.
pub struct ObjectStoreSource {
    store: Option<Arc<dyn ObjectStore>>,
    runtime: Runtime,
}

impl ObjectStoreSource {
    /// Source reading from S3.
    pub fn s3() -> Result<Self, SourceError> {
        Ok(Self {
            store: None,
            runtime: Builder::new_current_thread().enable_all().build()?,
        })
    }

    /// Source reading from one fixed store.
    pub fn with_store(store: Arc<dyn ObjectStore>) -> Result<Self, SourceError> {
        Ok(Self {
            store: Some(store),
            runtime: Builder::new_current_thread().enable_all().build()?,
        })
    }

    fn resolve(
        &self,
        location: &StorageLocation,
    ) -> Result<(Arc<dyn ObjectStore>, ObjectPath), SourceError> {
        let prefix = location.prefix().trim_matches('/');
        match &self.store {
            Some(store) => {
                let key = format!("{}/{}", location.container(), prefix);
                Ok((Arc::clone(store), ObjectPath::from(key.trim_end_matches('/'))))
            }
            None => {
                let store = AmazonS3Builder::from_env()
                    .with_bucket_name(location.container())
                    .build()?;
                Ok((Arc::new(store), ObjectPath::from(prefix)))
            }
        }
    }

    /// Keys of every Parquet object under `prefix`, in lexical order.
    ///
    /// A prefix naming a single `.parquet` object is that object alone.
    async fn list_parquet(
        store: &dyn ObjectStore,
        prefix: &ObjectPath,
    ) -> Result<Vec<ObjectPath>, SourceError> {
        if is_parquet(prefix.as_ref()) {
            return Ok(vec![prefix.clone()]);
        }

        let mut keys: Vec<ObjectPath> = store
            .list(Some(prefix))
            .map_ok(|meta| meta.location)
            .try_filter(|key| futures::future::ready(is_parquet(key.as_ref())))
            .try_collect()
            .await?;
        keys.sort_by(|a, b| a.as_ref().cmp(b.as_ref()));
        Ok(keys)
    }

    async fn read_all(
        store: &dyn ObjectStore,
        prefix: &ObjectPath,
    ) -> Result<DataFrame, SourceError> {
        let keys = Self::list_parquet(store, prefix).await?;
        debug!("reading {} parquet object(s)", keys.len());

        let mut parts = Vec::with_capacity(keys.len());
        for key in &keys {
            let bytes = store.get(key).await?.bytes().await?;
            parts.push(ParquetReader::new(Cursor::new(bytes)).finish()?);
        }

        Ok(stack_parts(parts)?)
    }
}

impl DataSource for ObjectStoreSource {
    fn read(&self, location: &StorageLocation) -> Result<DataFrame, SourceError> {
        let (store, prefix) = self.resolve(location)?;
        self.runtime
            .block_on(Self::read_all(store.as_ref(), &prefix))
    }
}

/// Reads Parquet files from a local directory tree laid out as
/// `<root>/<container>/<prefix>`.
#[derive(Debug, Clone)]
pub struct LocalDirSource {
    root: PathBuf,
}

impl LocalDirSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn files(&self, location: &StorageLocation) -> Result<Vec<PathBuf>, SourceError> {
        let base = self
            .root
            .join(location.container())
            .join(location.prefix().trim_matches('/'));

        if base.is_file() {
            return Ok(vec![base]);
        }
        // A missing prefix is a read failure, not an empty dataset.
        std::fs::metadata(&base)?;

        let mut files = Vec::new();
        for entry in glob(&format!("{}/**/*.parquet", base.display()))? {
            files.push(entry?);
        }
        files.sort();
        Ok(files)
    }
}

impl DataSource for LocalDirSource {
    fn read(&self, location: &StorageLocation) -> Result<DataFrame, SourceError> {
        let files = self.files(location)?;
        debug!("reading {} parquet file(s)", files.len());

        let parts = files
            .iter()
            .map(|path| Ok(ParquetReader::new(File::open(path)?).finish()?))
            .collect::<Result<Vec<_>, SourceError>>()?;
        Ok(stack_parts(parts)?)
    }
}
