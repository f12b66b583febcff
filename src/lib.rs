mod chart;
mod dashboard;
mod error;
mod filtering;
mod pipeline;
mod types;
mod utils;
mod views;
mod warehouse;

#[cfg(test)]
mod fixtures;

pub use dashboard::Dashboard;
pub use error::AirQualityError;

pub use chart::*;
pub use filtering::TimeWindowFilterExt;

pub use pipeline::error::PipelineError;
pub use pipeline::join::inner_join;
pub use pipeline::normalize::normalize;
pub use pipeline::resolution_filter::{filter, filter_and_normalize, Filtered};
pub use pipeline::series::{assemble, BandSeries, Bands};
pub use pipeline::temporal::aggregate;

pub use types::columns;
pub use types::granularity::{TemporalGranularity, TemporalKey};
pub use types::metric::Metric;
pub use types::region::{region_names, short_region_label, REGION_LABELS, UNCLASSIFIED_ZONE};
pub use types::resolution::{Resolution, ALL_COMMUNES_LABEL, ALL_REGIONS_LABEL};

pub use views::map::*;
pub use views::overview::*;
pub use views::timeline::*;

pub use warehouse::bigquery::{BigQueryWarehouse, ACCESS_TOKEN_VAR, LOCATION_VAR, PROJECT_ID_VAR};
pub use warehouse::cache::{CachePolicy, QueryCache};
pub use warehouse::error::WarehouseError;
pub use warehouse::loader::DatasetLoader;
pub use warehouse::local::LocalWarehouse;
pub use warehouse::query::{Query, WarehouseTables};
pub use warehouse::Warehouse;
