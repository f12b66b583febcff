//! Small synthetic tables shared by the unit tests.

use crate::types::columns::{
    source::{COMMUNE_CODE, EMI_PM25, PERSONS, PM25},
    COMMUNE, CONCENTRATION, EMISSION, LAT, LON, REGION, TIMESTAMP,
};
use chrono::{NaiveDate, NaiveDateTime};
use polars::prelude::*;

pub(crate) const MAULE: &str = "Región del Maule";
pub(crate) const METROPOLITANA: &str = "Región Metropolitana de Santiago";
pub(crate) const UNCLASSIFIED: &str = "Zona sin demarcar";

pub(crate) fn ts(year: i32, month: u32, day: u32, hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_opt(hour, 0, 0))
        .expect("valid fixture timestamp")
}

pub(crate) fn datetime_column(name: &str, values: &[NaiveDateTime]) -> PolarsResult<Column> {
    let millis: Vec<i64> = values
        .iter()
        .map(|v| v.and_utc().timestamp_millis())
        .collect();
    Series::new(name.into(), millis)
        .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))
        .map(Column::from)
}

/// (timestamp, commune, region, concentration, emission)
pub(crate) fn commune_hourly_rows() -> Vec<(NaiveDateTime, &'static str, &'static str, f64, f64)> {
    vec![
        (ts(2024, 1, 1, 0), "Talca", MAULE, 10.0, 1.0),
        (ts(2024, 1, 1, 1), "Talca", MAULE, 20.0, 2.0),
        (ts(2024, 1, 8, 0), "Talca", MAULE, 30.0, 3.0),
        (ts(2024, 1, 2, 0), "Talca", MAULE, 40.0, 4.0),
        (ts(2024, 1, 1, 0), "Santiago", METROPOLITANA, 50.0, 5.0),
        (ts(2024, 1, 8, 0), "Santiago", METROPOLITANA, 70.0, 9.0),
        (ts(2024, 1, 1, 0), "Linares", MAULE, 5.0, 0.5),
    ]
}

/// Commune-level hourly table: `timestamp, commune, region, concentration_pm25, emission_pm25`.
pub(crate) fn commune_hourly() -> PolarsResult<DataFrame> {
    let rows = commune_hourly_rows();
    let timestamps: Vec<NaiveDateTime> = rows.iter().map(|r| r.0).collect();
    DataFrame::new(vec![
        datetime_column(TIMESTAMP, &timestamps)?,
        Column::new(COMMUNE.into(), rows.iter().map(|r| r.1).collect::<Vec<_>>()),
        Column::new(REGION.into(), rows.iter().map(|r| r.2).collect::<Vec<_>>()),
        Column::new(CONCENTRATION.into(), rows.iter().map(|r| r.3).collect::<Vec<_>>()),
        Column::new(EMISSION.into(), rows.iter().map(|r| r.4).collect::<Vec<_>>()),
    ])
}

/// Cell-level source tables for the local warehouse: two cells in Talca, one in
/// Santiago and one in the unclassified zone, at three timestamps.
pub(crate) fn source_tables() -> PolarsResult<(DataFrame, DataFrame, DataFrame)> {
    let cells = [
        (-35.42, -71.65, "Talca", MAULE),
        (-35.43, -71.66, "Talca", MAULE),
        (-33.45, -70.66, "Santiago", METROPOLITANA),
        (-45.00, -72.00, "Sin zona", UNCLASSIFIED),
    ];
    let times = [ts(2015, 5, 3, 0), ts(2015, 5, 3, 1), ts(2015, 5, 4, 0)];

    let mut timestamps = Vec::new();
    let mut lats = Vec::new();
    let mut lons = Vec::new();
    let mut communes = Vec::new();
    let mut regions = Vec::new();
    let mut pm25 = Vec::new();
    let mut emi = Vec::new();
    for (t_idx, t) in times.iter().enumerate() {
        for (c_idx, (lat, lon, commune, region)) in cells.iter().enumerate() {
            timestamps.push(*t);
            lats.push(*lat);
            lons.push(*lon);
            communes.push(*commune);
            regions.push(*region);
            pm25.push((10 * (c_idx + 1) + t_idx) as f64);
            emi.push((c_idx + 1) as f64 * 0.1 * (t_idx + 1) as f64);
        }
    }

    let concentrations = DataFrame::new(vec![
        datetime_column(TIMESTAMP, &timestamps)?,
        Column::new(LAT.into(), lats.clone()),
        Column::new(LON.into(), lons.clone()),
        Column::new(COMMUNE.into(), communes.clone()),
        Column::new(REGION.into(), regions.clone()),
        Column::new(PM25.into(), pm25),
    ])?;
    let emissions = DataFrame::new(vec![
        datetime_column(TIMESTAMP, &timestamps)?,
        Column::new(LAT.into(), lats),
        Column::new(LON.into(), lons),
        Column::new(COMMUNE.into(), communes),
        Column::new(REGION.into(), regions),
        Column::new(EMI_PM25.into(), emi),
    ])?;
    let population = df!(
        COMMUNE => ["Talca", "Santiago", "Sin zona"],
        REGION => [MAULE, METROPOLITANA, UNCLASSIFIED],
        COMMUNE_CODE => [7101i64, 13101, 0],
        PERSONS => [220_357i64, 404_495, 0]
    )?;
    Ok((concentrations, emissions, population))
}
