//! Raster map layers: emission columns per commune over a concentration heatmap.

use crate::chart::{CONCENTRATION_DISPLAY_SCALE, EMISSION_DISPLAY_SCALE};
use crate::pipeline::error::PipelineError;
use crate::pipeline::require_columns;
use crate::types::columns::{COMMUNE, CONCENTRATION, EMISSION, LAT, LON};
use crate::views::{f64_values, string_values};
use polars::prelude::*;
use serde::Serialize;

/// One extruded column, located at the mean cell position of its commune.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommuneColumn {
    pub commune: String,
    pub lat: f64,
    pub lon: f64,
    /// Summed emission of the commune's cells, display-scaled.
    pub elevation: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeatPoint {
    pub lat: f64,
    pub lon: f64,
    /// Cell concentration, display-scaled.
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnLayerStyle {
    pub elevation_scale: f64,
    pub radius: f64,
    pub fill_alpha: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeatLayerStyle {
    pub opacity: f64,
    pub threshold: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewState {
    pub longitude: f64,
    pub latitude: f64,
    pub zoom: f64,
    pub min_zoom: f64,
    pub max_zoom: f64,
    pub pitch: f64,
    pub bearing: f64,
}

impl ViewState {
    fn centered(latitude: f64, longitude: f64) -> Self {
        ViewState {
            longitude,
            latitude,
            zoom: 5.0,
            min_zoom: 4.0,
            max_zoom: 10.0,
            pitch: 40.5,
            bearing: -90.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapLayers {
    pub columns: Vec<CommuneColumn>,
    pub column_style: ColumnLayerStyle,
    pub heat: Vec<HeatPoint>,
    pub heat_style: HeatLayerStyle,
    /// Centered on the mean cell position. `None` when the raster is empty.
    pub view_state: Option<ViewState>,
}

/// Builds both map layers from a raster snapshot
/// (`lat, lon, commune, emission_pm25, concentration_pm25` per cell).
pub fn map_layers(raster: &DataFrame) -> Result<MapLayers, PipelineError> {
    require_columns(raster, &[LAT, LON, COMMUNE, EMISSION, CONCENTRATION])?;

    let communes = raster
        .clone()
        .lazy()
        .group_by([col(COMMUNE)])
        .agg([
            col(LAT).mean(),
            col(LON).mean(),
            (col(EMISSION).sum() * lit(EMISSION_DISPLAY_SCALE)).alias(EMISSION),
        ])
        .sort([COMMUNE], SortMultipleOptions::default())
        .collect()?;

    let columns = string_values(&communes, COMMUNE)?
        .into_iter()
        .zip(f64_values(&communes, LAT)?)
        .zip(f64_values(&communes, LON)?)
        .zip(f64_values(&communes, EMISSION)?)
        .map(|(((commune, lat), lon), elevation)| CommuneColumn {
            commune,
            lat,
            lon,
            elevation,
        })
        .collect();

    let lats = f64_values(raster, LAT)?;
    let lons = f64_values(raster, LON)?;
    let heat: Vec<HeatPoint> = lats
        .iter()
        .zip(lons.iter())
        .zip(f64_values(raster, CONCENTRATION)?)
        .map(|((lat, lon), concentration)| HeatPoint {
            lat: *lat,
            lon: *lon,
            weight: concentration * CONCENTRATION_DISPLAY_SCALE,
        })
        .collect();

    let view_state = if heat.is_empty() {
        None
    } else {
        let n = heat.len() as f64;
        Some(ViewState::centered(
            lats.iter().sum::<f64>() / n,
            lons.iter().sum::<f64>() / n,
        ))
    };

    Ok(MapLayers {
        columns,
        column_style: ColumnLayerStyle {
            elevation_scale: 800.0,
            radius: 2000.0,
            fill_alpha: 140,
        },
        heat,
        heat_style: HeatLayerStyle {
            opacity: 0.3,
            threshold: 0.05,
        },
        view_state,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn raster() -> PolarsResult<DataFrame> {
        df!(
            "lat" => [-35.0, -36.0, -33.0],
            "lon" => [-71.0, -72.0, -70.0],
            "commune" => ["Talca", "Talca", "Santiago"],
            "emission_pm25" => [0.001, 0.002, 0.004],
            "concentration_pm25" => [1e-13, 2e-13, 3e-13]
        )
    }

    #[test]
    fn columns_aggregate_per_commune() -> Result<(), PipelineError> {
        let layers = map_layers(&raster()?)?;
        assert_eq!(layers.columns.len(), 2);
        let talca = layers.columns.iter().find(|c| c.commune == "Talca").unwrap();
        assert_eq!(talca.lat, -35.5);
        assert_eq!(talca.lon, -71.5);
        assert!((talca.elevation - 3.0).abs() < 1e-9);
        Ok(())
    }

    #[test]
    fn heat_is_per_cell_and_scaled() -> Result<(), PipelineError> {
        let layers = map_layers(&raster()?)?;
        assert_eq!(layers.heat.len(), 3);
        assert!((layers.heat[2].weight - 30.0).abs() < 1e-9);

        let view = layers.view_state.unwrap();
        assert!((view.latitude + 34.666_666_666).abs() < 1e-6);
        assert_eq!(view.longitude, -71.0);
        assert_eq!(view.bearing, -90.0);
        Ok(())
    }

    #[test]
    fn empty_raster_has_no_view_state() -> Result<(), PipelineError> {
        let empty = raster()?.head(Some(0));
        let layers = map_layers(&empty)?;
        assert!(layers.columns.is_empty());
        assert!(layers.heat.is_empty());
        assert_eq!(layers.view_state, None);
        Ok(())
    }
}
