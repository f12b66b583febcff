//! Full time-series line chart data.

use crate::chart::Palette;
use crate::pipeline::error::PipelineError;
use crate::pipeline::require_columns;
use crate::pipeline::resolution_filter::{filter_and_normalize, Filtered};
use crate::types::granularity::{read_temporal_keys, TemporalGranularity, TemporalKey};
use crate::types::metric::Metric;
use crate::types::resolution::Resolution;
use crate::views::{f64_values, string_values};
use polars::prelude::*;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineSeries {
    pub entity: String,
    pub color: &'static str,
    pub x: Vec<TemporalKey>,
    pub y: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineSeriesSet {
    pub group_column: &'static str,
    pub metric: Metric,
    pub series: Vec<LineSeries>,
}

impl LineSeriesSet {
    pub fn get(&self, entity: &str) -> Option<&LineSeries> {
        self.series.iter().find(|s| s.entity == entity)
    }
}

/// One line per entity of `resolution`, in time order.
///
/// `rows` is a full-series table keyed by `date` or `timestamp` (picked by
/// `granularity`) with raw `emission_pm25` / `concentration_pm25` values. For
/// [`Resolution::AllRegions`] the communes of each region are averaged per
/// time key first.
pub fn line_series(
    rows: &DataFrame,
    resolution: &Resolution,
    metric: Metric,
    granularity: TemporalGranularity,
) -> Result<LineSeriesSet, PipelineError> {
    let key = granularity.key_column();
    require_columns(rows, &[key, metric.value_column()])?;

    let Filtered {
        frame,
        group_column,
    } = filter_and_normalize(rows, resolution)?;
    require_columns(&frame, &[group_column])?;
    let frame = frame.sort([key], SortMultipleOptions::default().with_maintain_order(true))?;

    let keys = read_temporal_keys(frame.column(key)?)?;
    let entities = string_values(&frame, group_column)?;
    let values = f64_values(&frame, metric.value_column())?;

    let mut series: Vec<LineSeries> = Vec::new();
    for ((key, entity), value) in keys.into_iter().zip(entities).zip(values) {
        let Some(key) = key else { continue };
        let index = match series.iter().position(|s| s.entity == entity) {
            Some(index) => index,
            None => {
                series.push(LineSeries {
                    color: Palette::color(series.len()).line,
                    entity,
                    x: Vec::new(),
                    y: Vec::new(),
                });
                series.len() - 1
            }
        };
        series[index].x.push(key);
        series[index].y.push(value);
    }

    Ok(LineSeriesSet {
        group_column,
        metric,
        series,
    })
}
