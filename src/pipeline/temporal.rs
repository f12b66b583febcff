//! Temporal aggregation: mean and sample standard deviation of both metrics per
//! (temporal key, commune, region).

use crate::pipeline::error::PipelineError;
use crate::pipeline::{has_column, require_columns};
use crate::types::columns::{
    AVG_CONCENTRATION, AVG_EMISSION, COMMUNE, CONCENTRATION, EMISSION, REGION,
    STDDEV_CONCENTRATION, STDDEV_EMISSION, TIMESTAMP,
};
use crate::types::granularity::TemporalGranularity;
use polars::prelude::*;

/// Aggregates per-timestamp commune rows by `granularity`.
///
/// The key is read from the granularity's own column when `rows` already has
/// it (e.g. a `date` column for [`TemporalGranularity::CalendarDate`]), and is
/// otherwise derived from `timestamp`.
///
/// The output has one row per distinct `(key, commune, region)` present in
/// the input, sorted by those columns, with `avg_*` and `stddev_*` columns for
/// emission and concentration. Groups with a single sample have an undefined
/// standard deviation, reported as NaN.
///
/// # Errors
///
/// [`PipelineError::MissingColumn`] when `commune`, `region`, a metric column,
/// or both the key and `timestamp` columns are absent.
pub fn aggregate(
    rows: &DataFrame,
    granularity: TemporalGranularity,
) -> Result<DataFrame, PipelineError> {
    require_columns(rows, &[COMMUNE, REGION, EMISSION, CONCENTRATION])?;
    if !has_column(rows, granularity.key_column()) {
        require_columns(rows, &[TIMESTAMP])?;
    }
    let key_present = has_column(rows, granularity.key_column());
    Ok(aggregate_lazy(rows.clone().lazy(), granularity, key_present).collect()?)
}

/// Lazy form of [`aggregate`] without column validation, for query plans.
pub(crate) fn aggregate_lazy(
    rows: LazyFrame,
    granularity: TemporalGranularity,
    key_present: bool,
) -> LazyFrame {
    let key = granularity.key_column();
    let rows = if key_present {
        rows
    } else {
        rows.with_column(granularity.key_from_timestamp())
    };

    rows.group_by([col(key), col(COMMUNE), col(REGION)])
        .agg([
            col(EMISSION).mean().alias(AVG_EMISSION),
            sample_stddev(EMISSION).alias(STDDEV_EMISSION),
            col(CONCENTRATION).mean().alias(AVG_CONCENTRATION),
            sample_stddev(CONCENTRATION).alias(STDDEV_CONCENTRATION),
        ])
        .sort([key, COMMUNE, REGION], SortMultipleOptions::default())
}

// Polars yields null for a single-sample stddev; SQL STDDEV semantics want NaN.
fn sample_stddev(column: &str) -> Expr {
    col(column).std(1).fill_null(lit(f64::NAN))
}
