//! Canonical column names shared by every table the crate produces or consumes.
//!
//! Warehouse backends alias their source columns to these names, so the
//! reshaping pipeline never has to know where a table came from.

pub const TIMESTAMP: &str = "timestamp";
pub const DATE: &str = "date";
pub const DAY: &str = "day";
pub const HOUR: &str = "hour";

pub const LAT: &str = "lat";
pub const LON: &str = "lon";
pub const COMMUNE: &str = "commune";
pub const REGION: &str = "region";

pub const CONCENTRATION: &str = "concentration_pm25";
pub const EMISSION: &str = "emission_pm25";
pub const POPULATION: &str = "population";
pub const LOG_POPULATION: &str = "log_population";

pub const AVG_CONCENTRATION: &str = "avg_concentration_pm25";
pub const STDDEV_CONCENTRATION: &str = "stddev_concentration_pm25";
pub const AVG_EMISSION: &str = "avg_emission_pm25";
pub const STDDEV_EMISSION: &str = "stddev_emission_pm25";

/// Headcount-like columns. When communes are rolled up into regions these are
/// summed; every other numeric column is averaged.
pub const SUMMED_COLUMNS: [&str; 1] = [POPULATION];

/// Source-table columns of the raw concentration / emission / population tables.
pub mod source {
    pub const PM25: &str = "pm25";
    pub const EMI_PM25: &str = "emi_pm25";
    pub const PERSONS: &str = "persons";
    pub const COMMUNE_CODE: &str = "commune_code";
}
