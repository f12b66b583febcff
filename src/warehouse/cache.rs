//! Memoization of query results, in memory and optionally as parquet files.

use crate::warehouse::error::WarehouseError;
use crate::warehouse::query::Query;
use bon::Builder;
use log::{debug, info, warn};
use lru::LruCache;
use polars::prelude::*;
use std::collections::HashMap;
use std::future::Future;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};
use tempfile::NamedTempFile;
use tokio::sync::Mutex;
use tokio::{fs, task};

const CACHE_FILE_PREFIX: &str = "query_";

/// How long results stay cached and how many are kept in memory.
///
/// The default keeps every result for the lifetime of the cache.
///
/// ```
/// use calidad_aire::CachePolicy;
/// use std::num::NonZeroUsize;
/// use std::time::Duration;
///
/// let policy = CachePolicy::builder()
///     .max_entries(NonZeroUsize::new(8).unwrap())
///     .time_to_live(Duration::from_secs(3600))
///     .build();
/// assert_eq!(policy.max_entries.map(|n| n.get()), Some(8));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Builder)]
pub struct CachePolicy {
    /// In-memory capacity. The least recently used result is evicted beyond it.
    pub max_entries: Option<NonZeroUsize>,
    /// Age after which a result, in memory or on disk, is loaded again.
    pub time_to_live: Option<Duration>,
}

impl CachePolicy {
    fn is_fresh(&self, age: Duration) -> bool {
        self.time_to_live.map_or(true, |ttl| age < ttl)
    }
}

struct CachedFrame {
    frame: DataFrame,
    stored_at: Instant,
}

/// Query results keyed by [`Query`].
///
/// Concurrent requests for the same query share one load: the first caller
/// runs it while the others wait for its result.
pub struct QueryCache {
    policy: CachePolicy,
    entries: Mutex<LruCache<Query, CachedFrame>>,
    in_flight: Mutex<HashMap<Query, Arc<Mutex<()>>>>,
    disk_dir: Option<PathBuf>,
}

impl QueryCache {
    /// A memory-only cache.
    pub fn new(policy: CachePolicy) -> Self {
        let entries = match policy.max_entries {
            Some(capacity) => LruCache::new(capacity),
            None => LruCache::unbounded(),
        };
        QueryCache {
            policy,
            entries: Mutex::new(entries),
            in_flight: Mutex::new(HashMap::new()),
            disk_dir: None,
        }
    }

    /// A cache that also persists results as parquet files in `dir`, which
    /// must already exist. Files older than the policy's time-to-live are
    /// ignored and replaced.
    pub fn with_disk(policy: CachePolicy, dir: &Path) -> Self {
        QueryCache {
            disk_dir: Some(dir.to_path_buf()),
            ..Self::new(policy)
        }
    }

    pub fn policy(&self) -> CachePolicy {
        self.policy
    }

    /// Returns the cached result for `query`, or runs `load` and caches its
    /// result. Errors from `load` are returned as-is and nothing is cached.
    pub async fn get_or_load<F, Fut>(
        &self,
        query: &Query,
        load: F,
    ) -> Result<DataFrame, WarehouseError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<DataFrame, WarehouseError>>,
    {
        if let Some(frame) = self.memory_lookup(query).await {
            info!("Cache hit for {}", query);
            return Ok(frame);
        }

        let gate = {
            let mut in_flight = self.in_flight.lock().await;
            in_flight
                .entry(*query)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        let result = {
            let _guard = gate.lock().await;
            self.load_exclusive(query, load).await
        };

        let mut in_flight = self.in_flight.lock().await;
        // Map entry plus ours: nobody else is waiting on this gate.
        if Arc::strong_count(&gate) <= 2 {
            in_flight.remove(query);
        }
        result
    }

    async fn load_exclusive<F, Fut>(
        &self,
        query: &Query,
        load: F,
    ) -> Result<DataFrame, WarehouseError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<DataFrame, WarehouseError>>,
    {
        // Another caller may have finished loading while we waited.
        if let Some(frame) = self.memory_lookup(query).await {
            info!("Cache hit for {} after waiting on a concurrent load", query);
            return Ok(frame);
        }

        if let Some((frame, age)) = self.disk_lookup(query).await? {
            info!("Disk cache hit for {} ({:?} old)", query, age);
            // The file's age carries over, so the result expires on schedule.
            let now = Instant::now();
            let stored_at = now.checked_sub(age).unwrap_or(now);
            self.remember(query, frame.clone(), stored_at).await;
            return Ok(frame);
        }

        warn!("Cache miss for {}. Querying the warehouse.", query);
        let frame = load().await?;
        if let Some(path) = self.disk_path(query) {
            write_parquet(frame.clone(), &path).await?;
            info!("Cached {} ({} rows) to {:?}", query, frame.height(), path);
        }
        self.remember(query, frame.clone(), Instant::now()).await;
        Ok(frame)
    }

    async fn memory_lookup(&self, query: &Query) -> Option<DataFrame> {
        let mut entries = self.entries.lock().await;
        let fresh = match entries.get(query) {
            Some(cached) => self.policy.is_fresh(cached.stored_at.elapsed()),
            None => return None,
        };
        if fresh {
            entries.get(query).map(|cached| cached.frame.clone())
        } else {
            debug!("Dropping expired in-memory result for {}", query);
            entries.pop(query);
            None
        }
    }

    async fn remember(&self, query: &Query, frame: DataFrame, stored_at: Instant) {
        let mut entries = self.entries.lock().await;
        let evicted = entries.push(*query, CachedFrame { frame, stored_at });
        if let Some((evicted, _)) = evicted.filter(|(key, _)| key != query) {
            debug!("Evicted least recently used result for {}", evicted);
        }
    }

    fn disk_path(&self, query: &Query) -> Option<PathBuf> {
        self.disk_dir.as_ref().map(|dir| {
            dir.join(format!("{}{}.parquet", CACHE_FILE_PREFIX, query.cache_key()))
        })
    }

    /// Reads the parquet file for `query` together with its age. The age is
    /// zero when results never expire.
    async fn disk_lookup(
        &self,
        query: &Query,
    ) -> Result<Option<(DataFrame, Duration)>, WarehouseError> {
        let Some(path) = self.disk_path(query) else {
            return Ok(None);
        };
        let metadata = match fs::metadata(&path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(WarehouseError::CacheMetadataRead(path, e)),
        };

        let mut age = Duration::ZERO;
        if self.policy.time_to_live.is_some() {
            let modified = metadata
                .modified()
                .map_err(|e| WarehouseError::CacheMetadataRead(path.clone(), e))?;
            age = SystemTime::now()
                .duration_since(modified)
                .map_err(|e| WarehouseError::SystemTimeCalculation(path.clone(), e))?;
            if !self.policy.is_fresh(age) {
                warn!("Cache file {:?} is stale ({:?} old), reloading", path, age);
                return Ok(None);
            }
        }

        let frame = task::spawn_blocking(move || {
            LazyFrame::scan_parquet(&path, Default::default())
                .and_then(|lf| lf.collect())
                .map_err(|e| WarehouseError::ParquetRead(path, e))
        })
        .await??;
        Ok(Some((frame, age)))
    }

    /// Forgets `query`, in memory and on disk.
    pub async fn invalidate(&self, query: &Query) -> Result<(), WarehouseError> {
        self.entries.lock().await.pop(query);
        if let Some(path) = self.disk_path(query) {
            remove_if_exists(&path).await?;
        }
        Ok(())
    }

    /// Forgets every result, in memory and on disk.
    pub async fn clear(&self) -> Result<(), WarehouseError> {
        self.entries.lock().await.clear();
        let Some(dir) = &self.disk_dir else {
            return Ok(());
        };
        let mut listing = match fs::read_dir(dir).await {
            Ok(listing) => listing,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(WarehouseError::CacheMetadataRead(dir.clone(), e)),
        };
        while let Some(entry) = listing
            .next_entry()
            .await
            .map_err(|e| WarehouseError::CacheMetadataRead(dir.clone(), e))?
        {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with(CACHE_FILE_PREFIX) && name.ends_with(".parquet") {
                remove_if_exists(&entry.path()).await?;
            }
        }
        Ok(())
    }

    /// Number of results currently held in memory, expired ones included.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

async fn remove_if_exists(path: &Path) -> Result<(), WarehouseError> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(WarehouseError::CacheDeletion(path.to_path_buf(), e)),
    }
}

/// Writes `df` next to `path` and moves it into place, so readers never see a
/// partial file.
async fn write_parquet(mut df: DataFrame, path: &Path) -> Result<(), WarehouseError> {
    let path_buf = path.to_path_buf();
    task::spawn_blocking(move || {
        let dir = path_buf.parent().unwrap_or(Path::new("."));
        let mut temp = NamedTempFile::new_in(dir)
            .map_err(|e| WarehouseError::ParquetWriteIo(path_buf.clone(), e))?;
        ParquetWriter::new(temp.as_file_mut())
            .with_compression(ParquetCompression::Snappy)
            .finish(&mut df)
            .map_err(|e| WarehouseError::ParquetWritePolars(path_buf.clone(), e))?;
        temp.persist(&path_buf)
            .map_err(|e| WarehouseError::ParquetWriteIo(path_buf.clone(), e.error))?;
        Ok::<(), WarehouseError>(())
    })
    .await??;
    Ok(())
}
