use polars::error::PolarsError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Required column '{column}' not found in DataFrame")]
    MissingColumn { column: String },

    #[error("Band width must be finite and non-negative, got {0}")]
    InvalidBandWidth(f64),

    #[error("Failed processing DataFrame: {0}")]
    Polars(#[from] PolarsError),
}
