//! Data module - dataset loading, caching and cleaning

pub mod cache;
pub mod columns;
mod loader;
mod processor;
mod source;

pub use cache::{CacheEntry, Clock, DatasetCache, SystemClock};
pub use loader::{ensure_not_empty, DataLoader, LoaderError};
pub use processor::{DataProcessor, ProcessorError, TIME_FORMAT};
pub use source::{stack_parts, DataSource, LocalDirSource, ObjectStoreSource, SourceError};
