//! Chart data for the dashboard pages other than the cycle bands: the full
//! time series, the overview scatter and bars, and the raster map.

pub mod map;
pub mod overview;
pub mod timeline;

use polars::prelude::*;

/// Reads a numeric column as `f64`, with nulls as NaN.
pub(crate) fn f64_values(frame: &DataFrame, column: &str) -> PolarsResult<Vec<f64>> {
    let values = frame.column(column)?.cast(&DataType::Float64)?;
    Ok(values
        .f64()?
        .into_iter()
        .map(|v| v.unwrap_or(f64::NAN))
        .collect())
}

/// Reads a column as strings, with nulls as empty strings.
pub(crate) fn string_values(frame: &DataFrame, column: &str) -> PolarsResult<Vec<String>> {
    let values = frame.column(column)?.cast(&DataType::String)?;
    Ok(values
        .str()?
        .into_iter()
        .map(|v| v.unwrap_or_default().to_string())
        .collect())
}
