use crate::warehouse::cache::{CachePolicy, QueryCache};
use crate::warehouse::error::WarehouseError;
use crate::warehouse::query::Query;
use crate::warehouse::Warehouse;
use chrono::NaiveDate;
use polars::prelude::DataFrame;
use std::path::Path;

/// Runs the query templates against a [`Warehouse`], memoizing every result.
pub struct DatasetLoader<W> {
    warehouse: W,
    cache: QueryCache,
}

impl<W: Warehouse> DatasetLoader<W> {
    pub fn new(warehouse: W, policy: CachePolicy) -> Self {
        DatasetLoader {
            warehouse,
            cache: QueryCache::new(policy),
        }
    }

    /// Like [`DatasetLoader::new`], also persisting results as parquet files in `cache_dir`.
    pub fn with_disk_cache(warehouse: W, policy: CachePolicy, cache_dir: &Path) -> Self {
        DatasetLoader {
            warehouse,
            cache: QueryCache::with_disk(policy, cache_dir),
        }
    }

    pub async fn load(&self, query: &Query) -> Result<DataFrame, WarehouseError> {
        self.cache
            .get_or_load(query, || self.warehouse.execute(query))
            .await
    }

    /// Per-cell averages for `[start, end)`. An empty window yields an empty table.
    pub async fn raster(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<DataFrame, WarehouseError> {
        self.load(&Query::Raster { start, end }).await
    }

    pub async fn weekly_cycle(&self) -> Result<DataFrame, WarehouseError> {
        self.load(&Query::WeeklyCycle).await
    }

    pub async fn daily_cycle(&self) -> Result<DataFrame, WarehouseError> {
        self.load(&Query::DailyCycle).await
    }

    pub async fn full_series(&self, hourly: bool) -> Result<DataFrame, WarehouseError> {
        self.load(&Query::FullSeries { hourly }).await
    }

    pub async fn summary(&self) -> Result<DataFrame, WarehouseError> {
        self.load(&Query::Summary).await
    }

    pub fn warehouse(&self) -> &W {
        &self.warehouse
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::source_tables;
    use crate::warehouse::local::LocalWarehouse;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts executions on top of the local warehouse.
    struct CountingWarehouse {
        inner: LocalWarehouse,
        executions: AtomicUsize,
    }

    impl Warehouse for CountingWarehouse {
        async fn execute(&self, query: &Query) -> Result<DataFrame, WarehouseError> {
            self.executions.fetch_add(1, Ordering::SeqCst);
            self.inner.execute(query).await
        }
    }

    fn loader() -> DatasetLoader<CountingWarehouse> {
        let (con, emi, pop) = source_tables().unwrap();
        let warehouse = CountingWarehouse {
            inner: LocalWarehouse::from_frames(con, emi, pop).unwrap(),
            executions: AtomicUsize::new(0),
        };
        DatasetLoader::new(warehouse, CachePolicy::default())
    }

    #[tokio::test]
    async fn repeated_loads_hit_the_warehouse_once() -> Result<(), WarehouseError> {
        let loader = loader();
        let first = loader.weekly_cycle().await?;
        let second = loader.weekly_cycle().await?;
        assert!(first.equals_missing(&second));
        assert_eq!(loader.warehouse().executions.load(Ordering::SeqCst), 1);

        loader.summary().await?;
        loader.full_series(true).await?;
        loader.full_series(false).await?;
        assert_eq!(loader.warehouse().executions.load(Ordering::SeqCst), 4);
        Ok(())
    }

    #[tokio::test]
    async fn raster_windows_are_cached_separately() -> Result<(), WarehouseError> {
        let loader = loader();
        let day = |d| NaiveDate::from_ymd_opt(2015, 5, d).unwrap();
        let one = loader.raster(day(3), day(4)).await?;
        let none = loader.raster(day(3), day(3)).await?;
        assert_eq!(one.height(), 4);
        assert_eq!(none.height(), 0);
        assert_eq!(loader.warehouse().executions.load(Ordering::SeqCst), 2);
        Ok(())
    }

    #[tokio::test]
    async fn invalidation_forces_a_reload() -> Result<(), WarehouseError> {
        let loader = loader();
        loader.daily_cycle().await?;
        loader.cache().invalidate(&Query::DailyCycle).await?;
        loader.daily_cycle().await?;
        assert_eq!(loader.warehouse().executions.load(Ordering::SeqCst), 2);
        Ok(())
    }
}
