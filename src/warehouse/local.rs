//! An in-process warehouse that evaluates the query templates with polars.

use crate::filtering::TimeWindowFilterExt;
use crate::pipeline::error::PipelineError;
use crate::pipeline::join::inner_join;
use crate::pipeline::require_columns;
use crate::pipeline::temporal::aggregate_lazy;
use crate::types::columns::source::{EMI_PM25, PERSONS, PM25};
use crate::types::columns::{
    COMMUNE, CONCENTRATION, DATE, EMISSION, LAT, LON, POPULATION, REGION, TIMESTAMP,
};
use crate::types::granularity::TemporalGranularity;
use crate::types::region::UNCLASSIFIED_ZONE;
use crate::warehouse::error::WarehouseError;
use crate::warehouse::query::Query;
use crate::warehouse::Warehouse;
use log::{debug, info};
use polars::prelude::*;
use std::path::{Path, PathBuf};
use tokio::task;

const CONCENTRATIONS_TABLE: &str = "concentrations";
const EMISSIONS_TABLE: &str = "emissions";
const POPULATION_TABLE: &str = "population";

/// Evaluates every template over three in-memory source tables:
///
/// * concentrations: `timestamp, lat, lon, commune, region, pm25` per cell and hour
/// * emissions: `timestamp, lat, lon, commune, region, emi_pm25` per cell and hour
/// * population: `commune, region, persons`
///
/// Plans run on the blocking thread pool.
#[derive(Debug, Clone)]
pub struct LocalWarehouse {
    concentrations: DataFrame,
    emissions: DataFrame,
    population: DataFrame,
}

impl LocalWarehouse {
    pub fn from_frames(
        concentrations: DataFrame,
        emissions: DataFrame,
        population: DataFrame,
    ) -> Result<Self, WarehouseError> {
        let cell_columns = [TIMESTAMP, LAT, LON, COMMUNE, REGION];
        check_table(CONCENTRATIONS_TABLE, &concentrations, &cell_columns, PM25)?;
        check_table(EMISSIONS_TABLE, &emissions, &cell_columns, EMI_PM25)?;
        check_table(POPULATION_TABLE, &population, &[COMMUNE], PERSONS)?;
        Ok(LocalWarehouse {
            concentrations,
            emissions,
            population,
        })
    }

    /// Reads `concentrations`, `emissions` and `population` from `dir`, each as
    /// `<name>.parquet` or, failing that, `<name>.csv`.
    pub async fn from_dir(dir: &Path) -> Result<Self, WarehouseError> {
        let concentrations = read_table(dir, CONCENTRATIONS_TABLE).await?;
        let emissions = read_table(dir, EMISSIONS_TABLE).await?;
        let population = read_table(dir, POPULATION_TABLE).await?;
        info!(
            "Loaded local warehouse from {:?}: {} concentration rows, {} emission rows, {} communes",
            dir,
            concentrations.height(),
            emissions.height(),
            population.height()
        );
        Self::from_frames(concentrations, emissions, population)
    }

    /// Builds the lazy plan for `query`.
    pub fn plan(&self, query: &Query) -> LazyFrame {
        match *query {
            Query::Raster { start, end } => self.raster(start, end),
            Query::WeeklyCycle => aggregate_lazy(
                self.commune_hourly(TIMESTAMP),
                TemporalGranularity::DayOfWeek,
                false,
            ),
            Query::DailyCycle => aggregate_lazy(
                self.commune_hourly(TIMESTAMP),
                TemporalGranularity::HourOfDay,
                false,
            ),
            Query::FullSeries { hourly } => {
                let key = if hourly { TIMESTAMP } else { DATE };
                self.commune_hourly(key)
                    .select([
                        col(COMMUNE),
                        col(REGION),
                        col(key),
                        col(CONCENTRATION),
                        col(EMISSION),
                    ])
                    .sort([key, COMMUNE], SortMultipleOptions::default())
            }
            Query::Summary => self.summary(),
        }
    }

    /// Per `(key, commune, region)`: mean PM25 over cells and summed emissions,
    /// joined on `(commune, key)`, without the unclassified zone. `key` is
    /// `timestamp` or `date`.
    fn commune_hourly(&self, key: &str) -> LazyFrame {
        let with_key = |frame: &DataFrame| {
            let lazy = frame.clone().lazy();
            if key == DATE {
                lazy.with_column(col(TIMESTAMP).cast(DataType::Date).alias(DATE))
            } else {
                lazy
            }
        };

        let concentration = with_key(&self.concentrations)
            .group_by([col(key), col(COMMUNE), col(REGION)])
            .agg([col(PM25).mean().alias(CONCENTRATION)]);
        let emission = with_key(&self.emissions)
            .group_by([col(key), col(COMMUNE), col(REGION)])
            .agg([col(EMI_PM25).sum().alias(EMISSION)])
            .select([col(key), col(COMMUNE), col(EMISSION)]);

        inner_join(concentration, emission, &[COMMUNE, key])
            .filter(col(REGION).neq(lit(UNCLASSIFIED_ZONE)))
    }

    fn summary(&self) -> LazyFrame {
        let per_commune = self
            .commune_hourly(TIMESTAMP)
            .group_by([col(COMMUNE), col(REGION)])
            .agg([col(EMISSION).mean(), col(CONCENTRATION).mean()]);
        let population = self
            .population
            .clone()
            .lazy()
            .select([col(COMMUNE), col(PERSONS).alias(POPULATION)]);
        inner_join(per_commune, population, &[COMMUNE])
            .sort([COMMUNE], SortMultipleOptions::default())
    }

    fn raster(&self, start: chrono::NaiveDate, end: chrono::NaiveDate) -> LazyFrame {
        let concentration = self
            .concentrations
            .clone()
            .lazy()
            .filter_date_window(start, end)
            .select([col(TIMESTAMP), col(LAT), col(LON), col(COMMUNE), col(PM25)]);
        let emission = self
            .emissions
            .clone()
            .lazy()
            .filter_date_window(start, end)
            .select([col(TIMESTAMP), col(LAT), col(LON), col(EMI_PM25)]);

        inner_join(concentration, emission, &[LAT, LON, TIMESTAMP])
            .group_by([col(LAT), col(LON), col(COMMUNE)])
            .agg([
                col(EMI_PM25).mean().alias(EMISSION),
                col(PM25).mean().alias(CONCENTRATION),
            ])
            .sort([LAT, LON, COMMUNE], SortMultipleOptions::default())
    }
}

impl Warehouse for LocalWarehouse {
    async fn execute(&self, query: &Query) -> Result<DataFrame, WarehouseError> {
        let plan = self.plan(query);
        debug!("Running local plan for {}", query);
        let frame = task::spawn_blocking(move || plan.collect()).await??;
        debug!("{} produced {} rows", query, frame.height());
        Ok(frame)
    }
}

fn check_table(
    table: &'static str,
    frame: &DataFrame,
    columns: &[&str],
    value_column: &str,
) -> Result<(), WarehouseError> {
    let mut required = columns.to_vec();
    required.push(value_column);
    require_columns(frame, &required).map_err(|e| WarehouseError::MissingSourceColumn {
        table,
        column: match e {
            PipelineError::MissingColumn { column } => column,
            other => other.to_string(),
        },
    })
}

async fn read_table(dir: &Path, name: &'static str) -> Result<DataFrame, WarehouseError> {
    let parquet = dir.join(format!("{}.parquet", name));
    let csv = dir.join(format!("{}.csv", name));
    let path = if tokio::fs::metadata(&parquet).await.is_ok() {
        parquet
    } else if tokio::fs::metadata(&csv).await.is_ok() {
        csv
    } else {
        return Err(WarehouseError::SourceTableNotFound(name, dir.to_path_buf()));
    };

    task::spawn_blocking(move || read_table_file(path)).await?
}

fn read_table_file(path: PathBuf) -> Result<DataFrame, WarehouseError> {
    let is_parquet = path.extension().is_some_and(|e| e == "parquet");
    let result = if is_parquet {
        LazyFrame::scan_parquet(&path, Default::default()).and_then(|lf| lf.collect())
    } else {
        CsvReadOptions::default()
            .with_has_header(true)
            .map_parse_options(|o| o.with_try_parse_dates(true))
            .try_into_reader_with_file_path(Some(path.clone()))
            .and_then(|reader| reader.finish())
    };
    result.map_err(|e| WarehouseError::SourceTableRead(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{source_tables, ts, MAULE, METROPOLITANA};
    use crate::types::columns::{AVG_CONCENTRATION, STDDEV_CONCENTRATION};
    use crate::types::granularity::{read_temporal_keys, TemporalKey};
    use crate::views::{f64_values, string_values};
    use chrono::NaiveDate;
    use std::fs::File;

    fn warehouse() -> LocalWarehouse {
        let (con, emi, pop) = source_tables().unwrap();
        LocalWarehouse::from_frames(con, emi, pop).unwrap()
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[tokio::test]
    async fn weekly_cycle_groups_by_iso_day() -> Result<(), WarehouseError> {
        let frame = warehouse().execute(&Query::WeeklyCycle).await?;
        // Talca and Santiago, each on Sunday 2015-05-03 and Monday 2015-05-04.
        assert_eq!(frame.height(), 4);
        let days: Vec<Option<i32>> = frame.column("day")?.i32()?.into_iter().collect();
        assert_eq!(days, vec![Some(1), Some(1), Some(7), Some(7)]);

        let communes = string_values(&frame, COMMUNE)?;
        assert_eq!(communes, vec!["Santiago", "Talca", "Santiago", "Talca"]);

        let avg = f64_values(&frame, AVG_CONCENTRATION)?;
        let std = f64_values(&frame, STDDEV_CONCENTRATION)?;
        assert!(close(avg[3], 15.5));
        assert!(close(std[3], 0.5f64.sqrt()));
        assert!(close(avg[1], 17.0));
        assert!(std[1].is_nan());
        Ok(())
    }

    #[tokio::test]
    async fn daily_cycle_groups_by_hour() -> Result<(), WarehouseError> {
        let frame = warehouse().execute(&Query::DailyCycle).await?;
        assert_eq!(frame.height(), 4);
        let hours: Vec<Option<i32>> = frame.column("hour")?.i32()?.into_iter().collect();
        assert_eq!(hours, vec![Some(0), Some(0), Some(1), Some(1)]);
        Ok(())
    }

    #[tokio::test]
    async fn commune_base_excludes_unclassified_zone() -> Result<(), WarehouseError> {
        let frame = warehouse()
            .execute(&Query::FullSeries { hourly: true })
            .await?;
        assert_eq!(frame.height(), 6);
        let regions = string_values(&frame, REGION)?;
        assert!(regions.iter().all(|r| r == MAULE || r == METROPOLITANA));

        // Talca at the first hour: mean of its two cells and sum of their emissions.
        let first = frame
            .lazy()
            .filter(col(COMMUNE).eq(lit("Talca")))
            .collect()?;
        let keys = read_temporal_keys(first.column(TIMESTAMP)?)?;
        assert_eq!(keys[0], Some(TemporalKey::Timestamp(ts(2015, 5, 3, 0))));
        assert!(close(f64_values(&first, CONCENTRATION)?[0], 15.0));
        assert!(close(f64_values(&first, EMISSION)?[0], 0.3));
        Ok(())
    }

    #[tokio::test]
    async fn daily_full_series_is_keyed_by_date() -> Result<(), WarehouseError> {
        let frame = warehouse()
            .execute(&Query::FullSeries { hourly: false })
            .await?;
        assert_eq!(frame.height(), 4);
        assert_eq!(frame.column(DATE)?.dtype(), &DataType::Date);
        let talca = frame
            .lazy()
            .filter(col(COMMUNE).eq(lit("Talca")))
            .collect()?;
        let conc = f64_values(&talca, CONCENTRATION)?;
        let emis = f64_values(&talca, EMISSION)?;
        assert!(close(conc[0], 15.5));
        assert!(close(emis[0], 0.9));
        assert!(close(conc[1], 17.0));
        Ok(())
    }

    #[tokio::test]
    async fn summary_joins_population() -> Result<(), WarehouseError> {
        let frame = warehouse().execute(&Query::Summary).await?;
        assert_eq!(frame.height(), 2);
        assert_eq!(string_values(&frame, COMMUNE)?, vec!["Santiago", "Talca"]);
        assert_eq!(f64_values(&frame, POPULATION)?, vec![404_495.0, 220_357.0]);
        let conc = f64_values(&frame, CONCENTRATION)?;
        assert!(close(conc[0], 31.0));
        assert!(close(conc[1], 16.0));
        assert!(close(f64_values(&frame, EMISSION)?[1], 0.6));
        Ok(())
    }

    #[tokio::test]
    async fn raster_averages_cells_in_window() -> Result<(), WarehouseError> {
        let frame = warehouse().execute(&Query::raster_default()).await?;
        assert_eq!(frame.height(), 4);
        let talca = frame
            .lazy()
            .filter(col(LAT).eq(lit(-35.42)))
            .collect()?;
        assert!(close(f64_values(&talca, CONCENTRATION)?[0], 10.5));
        assert!(close(f64_values(&talca, EMISSION)?[0], 0.15));
        Ok(())
    }

    #[tokio::test]
    async fn empty_raster_window_is_empty_not_an_error() -> Result<(), WarehouseError> {
        let day = NaiveDate::from_ymd_opt(2015, 5, 3).unwrap();
        let frame = warehouse()
            .execute(&Query::Raster {
                start: day,
                end: day,
            })
            .await?;
        assert_eq!(frame.height(), 0);
        assert!(frame.column(CONCENTRATION).is_ok());
        Ok(())
    }

    #[test]
    fn missing_source_column_is_reported() {
        let (con, emi, pop) = source_tables().unwrap();
        let con = con.drop(PM25).unwrap();
        let err = LocalWarehouse::from_frames(con, emi, pop).unwrap_err();
        assert!(matches!(
            err,
            WarehouseError::MissingSourceColumn { table: "concentrations", ref column } if column == PM25
        ));
    }

    #[tokio::test]
    async fn loads_tables_from_a_directory() -> Result<(), WarehouseError> {
        let dir = tempfile::tempdir().unwrap();
        let (con, emi, pop) = source_tables()?;
        for (name, mut frame) in [
            (CONCENTRATIONS_TABLE, con),
            (EMISSIONS_TABLE, emi),
            (POPULATION_TABLE, pop),
        ] {
            let file = File::create(dir.path().join(format!("{}.parquet", name))).unwrap();
            ParquetWriter::new(file).finish(&mut frame)?;
        }

        let local = LocalWarehouse::from_dir(dir.path()).await?;
        let frame = local.execute(&Query::Summary).await?;
        assert_eq!(frame.height(), 2);

        let empty = tempfile::tempdir().unwrap();
        let err = LocalWarehouse::from_dir(empty.path()).await.unwrap_err();
        assert!(matches!(err, WarehouseError::SourceTableNotFound("concentrations", _)));
        Ok(())
    }
}
