//! In-memory reshaping of warehouse results: resolution filtering, region
//! relabeling, temporal aggregation and band-series assembly.

pub mod error;
pub mod join;
pub mod normalize;
pub mod resolution_filter;
pub mod series;
pub mod temporal;

use crate::pipeline::error::PipelineError;
use polars::prelude::DataFrame;

/// Fails with [`PipelineError::MissingColumn`] for the first of `columns`
/// absent from `frame`.
pub(crate) fn require_columns(frame: &DataFrame, columns: &[&str]) -> Result<(), PipelineError> {
    let names = frame.get_column_names();
    match columns
        .iter()
        .find(|c| !names.iter().any(|n| n.as_str() == **c))
    {
        Some(missing) => Err(PipelineError::MissingColumn {
            column: missing.to_string(),
        }),
        None => Ok(()),
    }
}

pub(crate) fn has_column(frame: &DataFrame, column: &str) -> bool {
    frame
        .get_column_names()
        .iter()
        .any(|n| n.as_str() == column)
}
