//! Assembles mean-plus-band series from temporally aggregated tables.

use crate::chart::{Palette, SeriesColor};
use crate::pipeline::error::PipelineError;
use crate::pipeline::require_columns;
use crate::pipeline::resolution_filter::{filter_and_normalize, Filtered};
use crate::types::granularity::{read_temporal_keys, TemporalGranularity, TemporalKey};
use crate::types::metric::Metric;
use crate::types::resolution::Resolution;
use log::debug;
use polars::prelude::*;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

/// One entity's line and shaded band.
///
/// `lower_reversed` runs from the last x back to the first, so that
/// `x ++ reverse(x)` against `upper ++ lower_reversed` traces a closed polygon.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BandSeries {
    pub entity: String,
    pub color: SeriesColor,
    pub x: Vec<TemporalKey>,
    pub mean: Vec<f64>,
    pub upper: Vec<f64>,
    pub lower_reversed: Vec<f64>,
}

impl BandSeries {
    /// Lower bound in x order.
    pub fn lower(&self) -> Vec<f64> {
        self.lower_reversed.iter().rev().copied().collect()
    }

    /// Outline of the band: x forward along `upper`, then backward along the lower bound.
    pub fn polygon(&self) -> (Vec<TemporalKey>, Vec<f64>) {
        let xs = self.x.iter().chain(self.x.iter().rev()).copied().collect();
        let ys = self
            .upper
            .iter()
            .chain(self.lower_reversed.iter())
            .copied()
            .collect();
        (xs, ys)
    }
}

/// Every entity's band for one chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bands {
    /// Distinct keys present across all entities, ascending.
    pub x: Vec<TemporalKey>,
    pub group_column: &'static str,
    /// In first-occurrence order of the entity in the filtered table.
    pub series: Vec<BandSeries>,
}

impl Bands {
    pub fn get(&self, entity: &str) -> Option<&BandSeries> {
        self.series.iter().find(|s| s.entity == entity)
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

/// Builds band series from the output of [`aggregate`](crate::pipeline::temporal::aggregate).
///
/// The table is filtered for `resolution` and relabeled, then split by the
/// resolution's group column. Per entity, rows are ordered by key and
/// `upper = mean + band_width·σ`, `lower = mean − band_width·σ`. A NaN σ gives
/// NaN bounds. Values are not rescaled.
pub fn assemble(
    grouped: &DataFrame,
    granularity: TemporalGranularity,
    resolution: &Resolution,
    metric: Metric,
    band_width: f64,
) -> Result<Bands, PipelineError> {
    if !band_width.is_finite() || band_width < 0.0 {
        return Err(PipelineError::InvalidBandWidth(band_width));
    }
    let key_column = granularity.key_column();
    require_columns(
        grouped,
        &[key_column, metric.mean_column(), metric.stddev_column()],
    )?;

    let Filtered {
        frame,
        group_column,
    } = filter_and_normalize(grouped, resolution)?;
    require_columns(&frame, &[group_column])?;

    let keys = read_temporal_keys(frame.column(key_column)?)?;
    let entities = frame.column(group_column)?.cast(&DataType::String)?;
    let entities = entities.str()?;
    let means = frame.column(metric.mean_column())?.cast(&DataType::Float64)?;
    let means = means.f64()?;
    let spreads = frame
        .column(metric.stddev_column())?
        .cast(&DataType::Float64)?;
    let spreads = spreads.f64()?;

    let mut order: Vec<String> = Vec::new();
    let mut points: HashMap<String, Vec<(TemporalKey, f64, f64)>> = HashMap::new();
    let mut all_keys = BTreeSet::new();

    for (((key, entity), mean), spread) in keys
        .into_iter()
        .zip(entities.into_iter())
        .zip(means.into_iter())
        .zip(spreads.into_iter())
    {
        let (Some(key), Some(entity)) = (key, entity) else {
            continue;
        };
        all_keys.insert(key);
        let entry = points.entry(entity.to_string()).or_insert_with(|| {
            order.push(entity.to_string());
            Vec::new()
        });
        entry.push((
            key,
            mean.unwrap_or(f64::NAN),
            spread.unwrap_or(f64::NAN),
        ));
    }

    let series: Vec<BandSeries> = order
        .into_iter()
        .enumerate()
        .map(|(index, entity)| {
            let mut rows = points.remove(&entity).unwrap_or_default();
            rows.sort_by_key(|(key, _, _)| *key);
            band_series(entity, Palette::color(index), rows, band_width)
        })
        .collect();

    debug!(
        "Assembled {} {} band series over {} '{}' keys",
        series.len(),
        metric,
        all_keys.len(),
        key_column
    );

    Ok(Bands {
        x: all_keys.into_iter().collect(),
        group_column,
        series,
    })
}

fn band_series(
    entity: String,
    color: SeriesColor,
    rows: Vec<(TemporalKey, f64, f64)>,
    band_width: f64,
) -> BandSeries {
    let mut x = Vec::with_capacity(rows.len());
    let mut mean = Vec::with_capacity(rows.len());
    let mut upper = Vec::with_capacity(rows.len());
    let mut lower = Vec::with_capacity(rows.len());
    for (key, m, sigma) in rows {
        x.push(key);
        mean.push(m);
        upper.push(m + band_width * sigma);
        lower.push(m - band_width * sigma);
    }
    lower.reverse();
    BandSeries {
        entity,
        color,
        x,
        mean,
        upper,
        lower_reversed: lower,
    }
}
