//! Overview page: per-entity summary table, emission/concentration scatter
//! and paired bars.

use crate::chart::BarQuantity;
use crate::pipeline::error::PipelineError;
use crate::pipeline::require_columns;
use crate::pipeline::resolution_filter::{filter_and_normalize, Filtered};
use crate::types::columns::{CONCENTRATION, EMISSION, LOG_POPULATION, POPULATION};
use crate::types::resolution::Resolution;
use crate::views::{f64_values, string_values};
use polars::prelude::*;
use serde::Serialize;

/// Decimals kept on the scatter axes.
const EMISSION_DECIMALS: i32 = 4;
const CONCENTRATION_DECIMALS: i32 = 2;

/// The summary table reduced to `resolution`, normalized, with one row per
/// entity and columns `[group, emission_pm25, concentration_pm25, population]`,
/// sorted by concentration, highest first.
pub fn summary_by_resolution(
    rows: &DataFrame,
    resolution: &Resolution,
) -> Result<Filtered, PipelineError> {
    require_columns(rows, &[EMISSION, CONCENTRATION, POPULATION])?;
    let Filtered {
        frame,
        group_column,
    } = filter_and_normalize(rows, resolution)?;
    require_columns(&frame, &[group_column])?;

    let frame = frame
        .lazy()
        .select([
            col(group_column),
            col(EMISSION),
            col(CONCENTRATION),
            col(POPULATION),
        ])
        .sort(
            [CONCENTRATION],
            SortMultipleOptions::default()
                .with_order_descending(true)
                .with_maintain_order(true),
        )
        .collect()?;
    Ok(Filtered {
        frame,
        group_column,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScatterPoint {
    pub entity: String,
    pub emission: f64,
    pub concentration: f64,
    /// Marker size.
    pub population: f64,
    /// Marker color: population, or its natural log.
    pub color_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Scatter {
    pub group_column: &'static str,
    pub color_title: &'static str,
    pub points: Vec<ScatterPoint>,
}

/// Emission (x) against concentration (y), one point per entity. Emission is
/// rounded to 4 decimals and concentration to 2, as shown on hover.
pub fn scatter(
    rows: &DataFrame,
    resolution: &Resolution,
    log_scale: bool,
) -> Result<Scatter, PipelineError> {
    let Filtered {
        frame,
        group_column,
    } = summary_by_resolution(rows, resolution)?;

    let frame = frame
        .lazy()
        .with_column(
            col(POPULATION)
                .cast(DataType::Float64)
                .log(std::f64::consts::E)
                .alias(LOG_POPULATION),
        )
        .collect()?;

    let color_column = if log_scale { LOG_POPULATION } else { POPULATION };
    let entities = string_values(&frame, group_column)?;
    let emission = f64_values(&frame, EMISSION)?;
    let concentration = f64_values(&frame, CONCENTRATION)?;
    let population = f64_values(&frame, POPULATION)?;
    let color = f64_values(&frame, color_column)?;

    let points = entities
        .into_iter()
        .zip(emission)
        .zip(concentration)
        .zip(population)
        .zip(color)
        .map(
            |((((entity, emission), concentration), population), color_value)| ScatterPoint {
                entity,
                emission: round_to(emission, EMISSION_DECIMALS),
                concentration: round_to(concentration, CONCENTRATION_DECIMALS),
                population,
                color_value,
            },
        )
        .collect();

    Ok(Scatter {
        group_column,
        color_title: color_column,
        points,
    })
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BarSeries {
    pub quantity: BarQuantity,
    pub color: &'static str,
    pub values: Vec<f64>,
}

/// Two bar series over shared categories; `secondary` is drawn against a
/// right-hand axis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairedBars {
    pub group_column: &'static str,
    pub categories: Vec<String>,
    pub primary: BarSeries,
    pub secondary: BarSeries,
}

fn quantity_column(quantity: BarQuantity) -> &'static str {
    match quantity {
        BarQuantity::Concentration => CONCENTRATION,
        BarQuantity::Emission => EMISSION,
        BarQuantity::Population => POPULATION,
    }
}

/// Paired bars per entity, ordered by `primary` descending.
pub fn paired_bars(
    rows: &DataFrame,
    resolution: &Resolution,
    primary: BarQuantity,
    secondary: BarQuantity,
) -> Result<PairedBars, PipelineError> {
    let Filtered {
        frame,
        group_column,
    } = summary_by_resolution(rows, resolution)?;
    let primary_column = quantity_column(primary);
    let frame = frame.sort(
        [primary_column],
        SortMultipleOptions::default()
            .with_order_descending(true)
            .with_maintain_order(true),
    )?;

    Ok(PairedBars {
        group_column,
        categories: string_values(&frame, group_column)?,
        primary: BarSeries {
            quantity: primary,
            color: primary.color(),
            values: f64_values(&frame, primary_column)?,
        },
        secondary: BarSeries {
            quantity: secondary,
            color: secondary.color(),
            values: f64_values(&frame, quantity_column(secondary))?,
        },
    })
}
