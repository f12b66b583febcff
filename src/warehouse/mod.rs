//! Loading result tables from a warehouse through the fixed query templates.

pub mod bigquery;
pub mod cache;
pub mod error;
pub mod loader;
pub mod local;
pub mod query;

use crate::warehouse::error::WarehouseError;
use crate::warehouse::query::Query;
use polars::prelude::DataFrame;
use std::future::Future;

/// Something that can run the query templates and hand back a table with
/// canonical column names.
pub trait Warehouse: Send + Sync {
    fn execute(
        &self,
        query: &Query,
    ) -> impl Future<Output = Result<DataFrame, WarehouseError>> + Send;
}
