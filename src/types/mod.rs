pub mod columns;
pub mod granularity;
pub mod metric;
pub mod region;
pub mod resolution;
