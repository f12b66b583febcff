//! The two PM2.5 measures tracked per commune.

use crate::types::columns::{
    AVG_CONCENTRATION, AVG_EMISSION, CONCENTRATION, EMISSION, STDDEV_CONCENTRATION,
    STDDEV_EMISSION,
};
use serde::Serialize;
use std::fmt;

/// Selects which measure feeds a chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    /// Emitted PM2.5 mass (ton/hr), summed over the cells of a commune.
    #[default]
    Emission,
    /// Ambient PM2.5 concentration (μg/m³), averaged over the cells of a commune.
    Concentration,
}

impl Metric {
    pub const ALL: [Metric; 2] = [Metric::Emission, Metric::Concentration];

    /// Column holding the raw (non-aggregated) value.
    pub fn value_column(&self) -> &'static str {
        match self {
            Metric::Emission => EMISSION,
            Metric::Concentration => CONCENTRATION,
        }
    }

    /// Column holding the mean produced by temporal aggregation.
    pub fn mean_column(&self) -> &'static str {
        match self {
            Metric::Emission => AVG_EMISSION,
            Metric::Concentration => AVG_CONCENTRATION,
        }
    }

    /// Column holding the sample standard deviation produced by temporal aggregation.
    pub fn stddev_column(&self) -> &'static str {
        match self {
            Metric::Emission => STDDEV_EMISSION,
            Metric::Concentration => STDDEV_CONCENTRATION,
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Metric::Emission => write!(f, "emission"),
            Metric::Concentration => write!(f, "concentration"),
        }
    }
}
