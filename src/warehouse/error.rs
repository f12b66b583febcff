use polars::error::PolarsError;
use std::path::PathBuf;
use std::time::SystemTimeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WarehouseError {
    #[error("Network request failed for {0}")]
    NetworkRequest(String, #[source] reqwest::Error),

    #[error("HTTP request failed for {url} with status {status}")]
    HttpStatus {
        url: String,
        status: reqwest::StatusCode,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to decode warehouse response from {url}")]
    ResponseDecode {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Warehouse job {job_id} did not complete")]
    JobIncomplete { job_id: String },

    #[error("Unsupported warehouse field type '{field_type}' for column '{column}'")]
    UnsupportedFieldType { column: String, field_type: String },

    #[error("Could not parse '{value}' as {field_type} in column '{column}'")]
    ValueParse {
        column: String,
        field_type: String,
        value: String,
    },

    #[error("Missing warehouse setting '{0}'")]
    MissingSetting(&'static str),

    #[error("Source table '{table}' is missing column '{column}'")]
    MissingSourceColumn { table: &'static str, column: String },

    #[error("Source table '{0}' not found in '{1}'")]
    SourceTableNotFound(&'static str, PathBuf),

    #[error("Failed to read source table '{0}'")]
    SourceTableRead(PathBuf, #[source] PolarsError),

    #[error("Failed to read metadata for cache file '{0}'")]
    CacheMetadataRead(PathBuf, #[source] std::io::Error),

    #[error("I/O error writing parquet cache file '{0}'")]
    ParquetWriteIo(PathBuf, #[source] std::io::Error),

    #[error("Encoding error writing parquet cache file '{0}'")]
    ParquetWritePolars(PathBuf, #[source] PolarsError),

    #[error("Failed to read parquet cache file '{0}'")]
    ParquetRead(PathBuf, #[source] PolarsError),

    #[error("Failed to delete cache file '{0}'")]
    CacheDeletion(PathBuf, #[source] std::io::Error),

    #[error("Failed to calculate system time difference for {0:?}")]
    SystemTimeCalculation(PathBuf, #[source] SystemTimeError),

    #[error("Background task failed to complete")]
    TaskJoin(#[from] tokio::task::JoinError),

    #[error("Failed processing DataFrame: {0}")]
    DataFrameProcessing(#[from] PolarsError),
}
