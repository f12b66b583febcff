//! Selects the rows and the grouping column for a [`Resolution`].

use crate::pipeline::error::PipelineError;
use crate::pipeline::normalize::normalize;
use crate::pipeline::{has_column, require_columns};
use crate::types::columns::{REGION, SUMMED_COLUMNS};
use crate::types::granularity::TemporalGranularity;
use crate::types::resolution::Resolution;
use log::debug;
use polars::prelude::*;

/// Output of the resolution filter: the selected rows plus the column whose
/// distinct values are the chart entities.
#[derive(Debug, Clone)]
pub struct Filtered {
    pub frame: DataFrame,
    pub group_column: &'static str,
}

/// Applies `resolution` to `rows`.
///
/// * [`Resolution::AllCommunes`] returns the rows unchanged.
/// * [`Resolution::SingleRegion`] keeps the rows whose `region` equals the name.
///   An unknown name yields an empty frame, not an error.
/// * [`Resolution::AllRegions`] rolls communes up into regions, keeping any
///   temporal key column (`day`, `hour`, `date`, `timestamp`) as an extra
///   group key. Numeric columns are averaged, except headcounts which are summed.
///   Float averages skip NaN and null values; a group with no finite value
///   averages to NaN.
///   Columns that are neither keys nor numeric (e.g. `commune`) are dropped.
///
/// The result still carries official region names; see [`filter_and_normalize`].
pub fn filter(rows: &DataFrame, resolution: &Resolution) -> Result<Filtered, PipelineError> {
    let frame = match resolution {
        Resolution::AllCommunes => rows.clone(),
        Resolution::SingleRegion(name) => {
            require_columns(rows, &[REGION])?;
            rows.clone()
                .lazy()
                .filter(col(REGION).eq(lit(name.as_str())))
                .collect()?
        }
        Resolution::AllRegions => roll_up_regions(rows)?,
    };
    debug!(
        "Resolution '{}' kept {} of {} rows",
        resolution,
        frame.height(),
        rows.height()
    );
    Ok(Filtered {
        frame,
        group_column: resolution.group_column(),
    })
}

/// [`filter`] followed by [`normalize`], which is how every chart consumes it.
pub fn filter_and_normalize(
    rows: &DataFrame,
    resolution: &Resolution,
) -> Result<Filtered, PipelineError> {
    let Filtered {
        frame,
        group_column,
    } = filter(rows, resolution)?;
    Ok(Filtered {
        frame: normalize(frame)?,
        group_column,
    })
}

fn roll_up_regions(rows: &DataFrame) -> Result<DataFrame, PipelineError> {
    require_columns(rows, &[REGION])?;

    let keys: Vec<&str> = std::iter::once(REGION)
        .chain(
            TemporalGranularity::ALL
                .iter()
                .map(|g| g.key_column())
                .filter(|k| has_column(rows, k)),
        )
        .collect();

    let aggregations: Vec<Expr> = rows
        .get_columns()
        .iter()
        .filter(|c| !keys.contains(&c.name().as_str()) && is_numeric(c.dtype()))
        .map(|c| {
            let name = c.name().as_str();
            if SUMMED_COLUMNS.contains(&name) {
                col(name).sum()
            } else if c.dtype().is_float() {
                // NaN spreads (single-sample groups) are skipped like nulls.
                col(name)
                    .fill_nan(lit(NULL))
                    .mean()
                    .fill_null(lit(f64::NAN))
            } else {
                col(name).mean()
            }
        })
        .collect();

    let key_exprs: Vec<Expr> = keys.iter().map(|k| col(*k)).collect();
    let frame = rows
        .clone()
        .lazy()
        .group_by(key_exprs)
        .agg(aggregations)
        .sort(keys, SortMultipleOptions::default())
        .collect()?;
    Ok(frame)
}

fn is_numeric(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Float64
            | DataType::Float32
            | DataType::Int64
            | DataType::Int32
            | DataType::UInt64
            | DataType::UInt32
    )
}
