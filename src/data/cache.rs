//! Dataset Cache
//! Time-bounded cache of loaded tables keyed by storage location.

use polars::prelude::DataFrame;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::debug;

use crate::config::StorageLocation;

/// Source of the current instant, used for expiry checks.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// One loaded table and the instant it was loaded.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub table: Arc<DataFrame>,
    pub loaded_at: Instant,
}

type Slot = Arc<Mutex<Option<CacheEntry>>>;

/// Maps a location to its most recent load.
///
/// Each location owns a slot with its own lock. Whoever finds a slot stale
/// refills it while holding that lock, so concurrent callers for the same
/// location wait for the first load instead of repeating it. Entries expire
/// once `ttl` has elapsed since they were loaded, regardless of how often
/// they were read.
pub struct DatasetCache<C: Clock = SystemClock> {
    ttl: Duration,
    clock: C,
    slots: Mutex<HashMap<StorageLocation, Slot>>,
}

impl DatasetCache<SystemClock> {
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, SystemClock)
    }
}

impl<C: Clock> DatasetCache<C> {
    pub fn with_clock(ttl: Duration, clock: C) -> Self {
        Self {
            ttl,
            clock,
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn is_fresh(&self, entry: &CacheEntry) -> bool {
        self.clock.now().saturating_duration_since(entry.loaded_at) < self.ttl
    }

    /// Empty `entry` if it has expired, releasing its table.
    fn evict_stale(&self, entry: &mut Option<CacheEntry>) {
        if entry.as_ref().is_some_and(|e| !self.is_fresh(e)) {
            *entry = None;
        }
    }

    fn slot(&self, location: &StorageLocation) -> Slot {
        lock(&self.slots)
            .entry(location.clone())
            .or_default()
            .clone()
    }

    /// Fresh cached table for `location`, if any.
    pub fn get(&self, location: &StorageLocation) -> Option<Arc<DataFrame>> {
        let slot = lock(&self.slots).get(location).cloned()?;
        let mut entry = lock(&slot);
        self.evict_stale(&mut entry);
        entry.as_ref().map(|e| Arc::clone(&e.table))
    }

    /// Return the fresh cached table, or run `load` and cache its result.
    ///
    /// Failed loads are not cached; the next call retries.
    pub fn get_or_load<E, F>(
        &self,
        location: &StorageLocation,
        load: F,
    ) -> Result<Arc<DataFrame>, E>
    where
        F: FnOnce() -> Result<DataFrame, E>,
    {
        let slot = self.slot(location);
        let mut entry = lock(&slot);

        if let Some(cached) = entry.as_ref().filter(|e| self.is_fresh(e)) {
            debug!("dataset cache hit");
            return Ok(Arc::clone(&cached.table));
        }

        debug!("dataset cache miss");
        let table = Arc::new(load()?);
        *entry = Some(CacheEntry {
            table: Arc::clone(&table),
            loaded_at: self.clock.now(),
        });
        Ok(table)
    }

    /// Drop the entry for one location.
    ///
    /// The slot itself stays registered, so a load already running for the
    /// location finishes before the entry is emptied and later callers keep
    /// queueing behind the same lock.
    pub fn invalidate(&self, location: &StorageLocation) {
        let slot = lock(&self.slots).get(location).cloned();
        if let Some(slot) = slot {
            *lock(&slot) = None;
        }
    }

    /// Drop every entry.
    pub fn clear(&self) {
        let slots: Vec<Slot> = lock(&self.slots).values().cloned().collect();
        for slot in slots {
            *lock(&slot) = None;
        }
    }

    /// Number of fresh entries. Expired entries found on the way are dropped.
    pub fn len(&self) -> usize {
        let slots: Vec<Slot> = lock(&self.slots).values().cloned().collect();
        slots
            .iter()
            .filter(|slot| {
                let mut entry = lock(slot);
                self.evict_stale(&mut entry);
                entry.is_some()
            })
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// A panic during a load leaves the slot unchanged, so a poisoned lock is safe to reuse.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
