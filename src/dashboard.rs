//! The main entry point: turns warehouse result tables into chart structures
//! for each page of the dashboard.

use crate::chart::{
    average_axis_title, series_axis_title, BarQuantity, Chart, ChartLayout, LegendOrientation,
    LegendPlacement, Ticks, BAND_CHART_HEIGHT, CHART_HEIGHT, DEFAULT_WIDTH,
};
use crate::error::AirQualityError;
use crate::pipeline::series::{assemble, Bands};
use crate::types::granularity::TemporalGranularity;
use crate::types::metric::Metric;
use crate::types::resolution::Resolution;
use crate::utils::{ensure_cache_dir_exists, get_cache_dir};
use crate::views::map::{map_layers, MapLayers};
use crate::views::overview::{paired_bars, scatter, PairedBars, Scatter};
use crate::views::timeline::{line_series, LineSeriesSet};
use crate::warehouse::cache::CachePolicy;
use crate::warehouse::loader::DatasetLoader;
use crate::warehouse::query::Query;
use crate::warehouse::Warehouse;
use bon::bon;
use chrono::NaiveDate;
use log::info;
use std::path::PathBuf;

const DEFAULT_BAND_WIDTH: f64 = 1.0;

/// Chart builder over a [`Warehouse`].
///
/// Every chart method is a builder; arguments left unset fall back to the
/// dashboard defaults: all regions, emission, a one-σ band, a horizontal
/// legend above the plot and a width of 1000.
///
/// ```rust
/// # use calidad_aire::{AirQualityError, Dashboard, LocalWarehouse, Metric, Resolution};
/// # use std::path::Path;
/// # async fn run() -> Result<(), AirQualityError> {
/// let warehouse = LocalWarehouse::from_dir(Path::new("data")).await?;
/// let dashboard = Dashboard::new(warehouse);
///
/// let chart = dashboard
///     .weekly_cycle()
///     .resolution(Resolution::AllCommunes)
///     .metric(Metric::Concentration)
///     .call()
///     .await?;
/// println!("{}", chart.data.series.len());
/// # Ok(())
/// # }
/// ```
pub struct Dashboard<W> {
    loader: DatasetLoader<W>,
}

#[bon]
impl<W: Warehouse> Dashboard<W> {
    /// Caches results in memory only, without eviction.
    pub fn new(warehouse: W) -> Self {
        Self {
            loader: DatasetLoader::new(warehouse, CachePolicy::default()),
        }
    }

    /// Caches results in memory and as parquet files in `cache_folder`,
    /// which is created if missing.
    ///
    /// # Errors
    ///
    /// Returns [`AirQualityError::CacheDirCreation`] if the directory cannot be created.
    pub async fn with_cache_folder(
        warehouse: W,
        cache_folder: PathBuf,
        policy: CachePolicy,
    ) -> Result<Self, AirQualityError> {
        ensure_cache_dir_exists(&cache_folder)
            .await
            .map_err(|e| AirQualityError::CacheDirCreation(cache_folder.clone(), e))?;
        info!("Caching query results in {}", cache_folder.display());
        Ok(Self {
            loader: DatasetLoader::with_disk_cache(warehouse, policy, &cache_folder),
        })
    }

    /// Like [`Dashboard::with_cache_folder`], using the platform cache directory.
    pub async fn with_default_cache_folder(
        warehouse: W,
        policy: CachePolicy,
    ) -> Result<Self, AirQualityError> {
        let cache_folder = get_cache_dir().map_err(AirQualityError::CacheDirResolution)?;
        Self::with_cache_folder(warehouse, cache_folder, policy).await
    }

    pub fn loader(&self) -> &DatasetLoader<W> {
        &self.loader
    }

    /// Mean and spread per day of week (Monday = 1).
    ///
    /// # Arguments
    ///
    /// * `.resolution(Resolution)`: Optional. Defaults to [`Resolution::AllRegions`].
    /// * `.metric(Metric)`: Optional. Defaults to [`Metric::Emission`].
    /// * `.band_width(f64)`: Optional. Number of standard deviations the band
    ///   spans on each side. Defaults to `1.0`.
    /// * `.show_band(bool)`: Optional. Tells the renderer whether to draw the
    ///   band. Defaults to `true`; the band data is filled in either way.
    /// * `.legend_horizontal(bool)`, `.legend_above(bool)`: Optional. Both default to `true`.
    /// * `.width(u32)`: Optional. Defaults to `1000`.
    #[builder]
    pub async fn weekly_cycle(
        &self,
        resolution: Option<Resolution>,
        metric: Option<Metric>,
        band_width: Option<f64>,
        show_band: Option<bool>,
        legend_horizontal: Option<bool>,
        legend_above: Option<bool>,
        width: Option<u32>,
    ) -> Result<Chart<Bands>, AirQualityError> {
        let grouped = self.loader.weekly_cycle().await?;
        let mut chart = cycle_chart(
            &grouped,
            TemporalGranularity::DayOfWeek,
            &resolution.unwrap_or_default(),
            metric.unwrap_or_default(),
            band_width.unwrap_or(DEFAULT_BAND_WIDTH),
            LegendPlacement::new(
                legend_horizontal.unwrap_or(true),
                legend_above.unwrap_or(true),
            ),
            width.unwrap_or(DEFAULT_WIDTH),
        )?;
        chart.layout.show_band = Some(show_band.unwrap_or(true));
        Ok(chart)
    }

    /// Mean and spread per hour of day. Takes the same arguments as
    /// [`Dashboard::weekly_cycle`].
    #[builder]
    pub async fn daily_cycle(
        &self,
        resolution: Option<Resolution>,
        metric: Option<Metric>,
        band_width: Option<f64>,
        show_band: Option<bool>,
        legend_horizontal: Option<bool>,
        legend_above: Option<bool>,
        width: Option<u32>,
    ) -> Result<Chart<Bands>, AirQualityError> {
        let grouped = self.loader.daily_cycle().await?;
        let mut chart = cycle_chart(
            &grouped,
            TemporalGranularity::HourOfDay,
            &resolution.unwrap_or_default(),
            metric.unwrap_or_default(),
            band_width.unwrap_or(DEFAULT_BAND_WIDTH),
            LegendPlacement::new(
                legend_horizontal.unwrap_or(true),
                legend_above.unwrap_or(true),
            ),
            width.unwrap_or(DEFAULT_WIDTH),
        )?;
        chart.layout.show_band = Some(show_band.unwrap_or(true));
        Ok(chart)
    }

    /// The whole simulated period, per day or, with `.hourly(true)`, per hour.
    #[builder]
    pub async fn time_series(
        &self,
        resolution: Option<Resolution>,
        metric: Option<Metric>,
        hourly: Option<bool>,
        legend_horizontal: Option<bool>,
        legend_above: Option<bool>,
        width: Option<u32>,
    ) -> Result<Chart<LineSeriesSet>, AirQualityError> {
        let hourly = hourly.unwrap_or(false);
        let granularity = if hourly {
            TemporalGranularity::Timestamp
        } else {
            TemporalGranularity::CalendarDate
        };
        let resolution = resolution.unwrap_or_default();
        let metric = metric.unwrap_or_default();

        let rows = self.loader.full_series(hourly).await?;
        let data = line_series(&rows, &resolution, metric, granularity)?;

        let mut layout = ChartLayout::new(
            series_axis_title(metric),
            CHART_HEIGHT,
            width.unwrap_or(DEFAULT_WIDTH),
        );
        layout.legend_title = Some(data.group_column.to_string());
        layout.legend = LegendPlacement::new(
            legend_horizontal.unwrap_or(true),
            legend_above.unwrap_or(true),
        );
        Ok(Chart { layout, data })
    }

    /// Emission against concentration per entity, sized and colored by
    /// population. The color scale is logarithmic unless `.log_scale(false)`.
    #[builder]
    pub async fn scatter(
        &self,
        resolution: Option<Resolution>,
        log_scale: Option<bool>,
        width: Option<u32>,
    ) -> Result<Chart<Scatter>, AirQualityError> {
        let rows = self.loader.summary().await?;
        let data = scatter(
            &rows,
            &resolution.unwrap_or_default(),
            log_scale.unwrap_or(true),
        )?;

        let mut layout = ChartLayout::new(
            BarQuantity::Concentration.axis_title(),
            CHART_HEIGHT,
            width.unwrap_or(DEFAULT_WIDTH),
        );
        layout.x_axis_title = BarQuantity::Emission.axis_title().to_string();
        Ok(Chart { layout, data })
    }

    /// Two quantities side by side per entity, the secondary one on a right-hand
    /// axis. Defaults to concentration against emission.
    #[builder]
    pub async fn bars(
        &self,
        resolution: Option<Resolution>,
        primary: Option<BarQuantity>,
        secondary: Option<BarQuantity>,
        width: Option<u32>,
    ) -> Result<Chart<PairedBars>, AirQualityError> {
        let primary = primary.unwrap_or(BarQuantity::Concentration);
        let secondary = secondary.unwrap_or(BarQuantity::Emission);
        let rows = self.loader.summary().await?;
        let data = paired_bars(&rows, &resolution.unwrap_or_default(), primary, secondary)?;

        let mut layout = ChartLayout::new(
            primary.axis_title(),
            CHART_HEIGHT,
            width.unwrap_or(DEFAULT_WIDTH),
        );
        layout.y2_axis_title = Some(secondary.axis_title().to_string());
        layout.legend = LegendPlacement {
            orientation: LegendOrientation::Horizontal,
            x: Some(0.0),
            y: Some(1.1),
        };
        Ok(Chart { layout, data })
    }

    /// Commune emission columns and a concentration heatmap for `[start, end)`.
    /// Without a window the dashboard's opening day (2015-05-03) is shown.
    #[builder]
    pub async fn raster_map(
        &self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<MapLayers, AirQualityError> {
        let (default_start, default_end) = Query::default_raster_window();
        let raster = self
            .loader
            .raster(
                start.unwrap_or(default_start),
                end.unwrap_or(default_end),
            )
            .await?;
        Ok(map_layers(&raster)?)
    }
}

fn cycle_chart(
    grouped: &polars::prelude::DataFrame,
    granularity: TemporalGranularity,
    resolution: &Resolution,
    metric: Metric,
    band_width: f64,
    legend: LegendPlacement,
    width: u32,
) -> Result<Chart<Bands>, AirQualityError> {
    let data = assemble(grouped, granularity, resolution, metric, band_width)?;
    let mut layout = ChartLayout::new(
        average_axis_title(metric, granularity),
        BAND_CHART_HEIGHT,
        width,
    );
    layout.ticks = Ticks::for_granularity(granularity);
    layout.legend_title = Some(data.group_column.to_string());
    layout.legend = legend;
    Ok(Chart { layout, data })
}
