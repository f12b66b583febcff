//! Renderer-facing chart metadata: colors, axes, ticks, legend placement and
//! the display scaling applied to map layers.

use crate::types::granularity::TemporalGranularity;
use crate::types::metric::Metric;
use serde::Serialize;

/// Multiplier applied to summed emission before it is used as column elevation.
pub const EMISSION_DISPLAY_SCALE: f64 = 1e3;
/// Multiplier applied to concentration before it is used as heatmap weight.
pub const CONCENTRATION_DISPLAY_SCALE: f64 = 1e14;

pub const TEMPLATE: &str = "plotly_white";
pub const DEFAULT_WIDTH: u32 = 1000;
pub const BAND_CHART_HEIGHT: u32 = 600;
pub const CHART_HEIGHT: u32 = 500;

/// A line color and its translucent fill counterpart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SeriesColor {
    pub line: &'static str,
    pub fill: &'static str,
}

impl SeriesColor {
    pub const fn new(line: &'static str, fill: &'static str) -> Self {
        SeriesColor { line, fill }
    }
}

/// The fixed series palette. Entities are colored by first-occurrence index.
pub struct Palette;

impl Palette {
    pub const COLORS: [SeriesColor; 10] = [
        SeriesColor::new("rgb(31, 119, 180)", "rgba(31, 119, 180, 0.2)"),
        SeriesColor::new("rgb(255, 127, 14)", "rgba(255, 127, 14, 0.2)"),
        SeriesColor::new("rgb(44, 160, 44)", "rgba(44, 160, 44, 0.2)"),
        SeriesColor::new("rgb(214, 39, 40)", "rgba(214, 39, 40, 0.2)"),
        SeriesColor::new("rgb(148, 103, 189)", "rgba(148, 103, 189, 0.2)"),
        SeriesColor::new("rgb(140, 86, 75)", "rgba(140, 86, 75, 0.2)"),
        SeriesColor::new("rgb(227, 119, 194)", "rgba(227, 119, 194, 0.2)"),
        SeriesColor::new("rgb(127, 127, 127)", "rgba(127, 127, 127, 0.2)"),
        SeriesColor::new("rgb(188, 189, 34)", "rgba(188, 189, 34, 0.2)"),
        SeriesColor::new("rgb(23, 190, 207)", "rgba(23, 190, 207, 0.2)"),
    ];

    pub fn color(index: usize) -> SeriesColor {
        Self::COLORS[index % Self::COLORS.len()]
    }
}

/// Quantities that can be plotted as bars on the overview page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BarQuantity {
    Concentration,
    Emission,
    Population,
}

impl BarQuantity {
    pub fn color(&self) -> &'static str {
        match self {
            BarQuantity::Concentration => "rgb(250, 50, 50)",
            BarQuantity::Emission => "rgb(128, 128, 128)",
            BarQuantity::Population => "rgb(51, 190, 255)",
        }
    }

    pub fn axis_title(&self) -> &'static str {
        match self {
            BarQuantity::Concentration => "Concentración [μg/m³]",
            BarQuantity::Emission => "Emisión [ton/hr]",
            BarQuantity::Population => "número de habitantes",
        }
    }
}

impl From<Metric> for BarQuantity {
    fn from(metric: Metric) -> Self {
        match metric {
            Metric::Emission => BarQuantity::Emission,
            Metric::Concentration => BarQuantity::Concentration,
        }
    }
}

/// Axis title for a cycle (band) chart of `metric`. The hour-of-day
/// concentration chart names the pollutant.
pub fn average_axis_title(metric: Metric, granularity: TemporalGranularity) -> &'static str {
    match (metric, granularity) {
        (Metric::Emission, _) => "Emisión promedio [ton/hr]",
        (Metric::Concentration, TemporalGranularity::HourOfDay) => {
            "Concentración promedio de PM25 [μg/m³]"
        }
        (Metric::Concentration, _) => "Concentración promedio [μg/m³]",
    }
}

/// Axis title for a raw time series of `metric`.
pub fn series_axis_title(metric: Metric) -> &'static str {
    BarQuantity::from(metric).axis_title()
}

/// Explicit tick positions with their labels.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ticks {
    pub values: Vec<i64>,
    pub labels: Vec<String>,
}

impl Ticks {
    /// Monday (1) through Sunday (7).
    pub fn weekly() -> Self {
        const DAYS: [&str; 7] = [
            "Lunes",
            "Martes",
            "Miércoles",
            "Jueves",
            "Viernes",
            "Sábado",
            "Domingo",
        ];
        Ticks {
            values: (1..=7).collect(),
            labels: DAYS.iter().map(|d| d.to_string()).collect(),
        }
    }

    /// Every four hours from midnight.
    pub fn daily() -> Self {
        let values: Vec<i64> = (0..24).step_by(4).collect();
        let labels = values.iter().map(|h| format!("{} hrs", h)).collect();
        Ticks { values, labels }
    }

    /// Fixed ticks for the cyclic granularities; dates and timestamps use the
    /// renderer's automatic axis.
    pub fn for_granularity(granularity: TemporalGranularity) -> Option<Self> {
        match granularity {
            TemporalGranularity::DayOfWeek => Some(Self::weekly()),
            TemporalGranularity::HourOfDay => Some(Self::daily()),
            TemporalGranularity::CalendarDate | TemporalGranularity::Timestamp => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LegendOrientation {
    Horizontal,
    Vertical,
}

/// Where the legend sits relative to the plot area.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LegendPlacement {
    pub orientation: LegendOrientation,
    /// Anchor position in paper coordinates. Only set for horizontal legends.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
}

impl LegendPlacement {
    pub fn new(horizontal: bool, above: bool) -> Self {
        match (horizontal, above) {
            (true, true) => LegendPlacement {
                orientation: LegendOrientation::Horizontal,
                x: Some(-0.1),
                y: Some(1.2),
            },
            (true, false) => LegendPlacement {
                orientation: LegendOrientation::Horizontal,
                x: Some(-0.1),
                y: Some(-0.1),
            },
            (false, _) => LegendPlacement {
                orientation: LegendOrientation::Vertical,
                x: None,
                y: None,
            },
        }
    }
}

impl Default for LegendPlacement {
    fn default() -> Self {
        Self::new(true, true)
    }
}

/// Layout metadata handed to the renderer together with the chart data.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartLayout {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub x_axis_title: String,
    pub y_axis_title: String,
    /// Title of a secondary y axis overlaid on the right, for paired bars.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y2_axis_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticks: Option<Ticks>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub legend_title: Option<String>,
    /// Whether the renderer draws the shaded band. Only set on band charts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub show_band: Option<bool>,
    pub legend: LegendPlacement,
    pub height: u32,
    pub width: u32,
    pub template: &'static str,
}

impl ChartLayout {
    pub fn new(y_axis_title: impl Into<String>, height: u32, width: u32) -> Self {
        ChartLayout {
            title: None,
            x_axis_title: String::new(),
            y_axis_title: y_axis_title.into(),
            y2_axis_title: None,
            ticks: None,
            legend_title: None,
            show_band: None,
            legend: LegendPlacement::default(),
            height,
            width,
            template: TEMPLATE,
        }
    }
}

/// Chart data plus its layout.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chart<T> {
    pub layout: ChartLayout,
    pub data: T,
}

impl<T: Serialize> Chart<T> {
    /// Serializes the chart for the renderer. Non-finite numbers become `null`.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
