//! The five fixed query templates and their warehouse SQL.

use crate::types::granularity::TemporalGranularity;
use crate::types::region::UNCLASSIFIED_ZONE;
use chrono::NaiveDate;
use std::fmt;

/// Fully qualified names of the three source tables.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WarehouseTables {
    pub concentrations: String,
    pub emissions: String,
    pub population: String,
}

impl Default for WarehouseTables {
    fn default() -> Self {
        WarehouseTables {
            concentrations: "CR2.concentraciones_PM25_w_geo".to_string(),
            emissions: "CR2.emisiones_PM25_w_geo".to_string(),
            population: "CR2.habitantes_por_comuna".to_string(),
        }
    }
}

/// A request for one of the dashboard's result tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Query {
    /// Per-cell averages inside the half-open window `[start, end)`:
    /// `lat, lon, commune, emission_pm25, concentration_pm25`.
    Raster { start: NaiveDate, end: NaiveDate },
    /// Day-of-week aggregate: `day, commune, region, avg_*/stddev_*`.
    WeeklyCycle,
    /// Hour-of-day aggregate: `hour, commune, region, avg_*/stddev_*`.
    DailyCycle,
    /// Commune series per `date` (or per `timestamp` when `hourly`):
    /// `commune, region, date|timestamp, concentration_pm25, emission_pm25`.
    FullSeries { hourly: bool },
    /// Per-commune means joined with population:
    /// `commune, region, emission_pm25, concentration_pm25, population`.
    Summary,
}

impl Query {
    /// The day the raster map opens on, as a half-open window.
    pub fn default_raster_window() -> (NaiveDate, NaiveDate) {
        (
            NaiveDate::from_ymd_opt(2015, 5, 3).unwrap_or_default(),
            NaiveDate::from_ymd_opt(2015, 5, 4).unwrap_or_default(),
        )
    }

    pub fn raster_default() -> Self {
        let (start, end) = Self::default_raster_window();
        Query::Raster { start, end }
    }

    pub fn template_id(&self) -> &'static str {
        match self {
            Query::Raster { .. } => "raster",
            Query::WeeklyCycle => "weekly_cycle",
            Query::DailyCycle => "daily_cycle",
            Query::FullSeries { .. } => "full_series",
            Query::Summary => "summary",
        }
    }

    /// Stable identifier, safe to use as a file name.
    pub fn cache_key(&self) -> String {
        match self {
            Query::Raster { start, end } => format!(
                "raster_{}_{}",
                start.format("%Y%m%d"),
                end.format("%Y%m%d")
            ),
            Query::FullSeries { hourly: true } => "full_series_hourly".to_string(),
            Query::FullSeries { hourly: false } => "full_series_daily".to_string(),
            other => other.template_id().to_string(),
        }
    }

    /// The temporal key the result is grouped by, if any.
    pub fn granularity(&self) -> Option<TemporalGranularity> {
        match self {
            Query::Raster { .. } | Query::Summary => None,
            Query::WeeklyCycle => Some(TemporalGranularity::DayOfWeek),
            Query::DailyCycle => Some(TemporalGranularity::HourOfDay),
            Query::FullSeries { hourly: false } => Some(TemporalGranularity::CalendarDate),
            Query::FullSeries { hourly: true } => Some(TemporalGranularity::Timestamp),
        }
    }

    /// Renders the query as BigQuery Standard SQL with canonical column names.
    pub fn sql(&self, tables: &WarehouseTables) -> String {
        match self {
            Query::Raster { start, end } => format!(
                "SELECT con.lat AS lat, con.lon AS lon, con.comuna AS commune, \
                 AVG(emi.EMI_PM25) AS emission_pm25, AVG(con.PM25) AS concentration_pm25 \
                 FROM `{con}` AS con \
                 JOIN `{emi}` AS emi \
                 ON con.lat = emi.lat AND con.lon = emi.lon AND con.Time = emi.Time \
                 WHERE con.Time >= '{start}' AND con.Time < '{end}' \
                 GROUP BY lat, lon, commune",
                con = tables.concentrations,
                emi = tables.emissions,
                start = start,
                end = end,
            ),
            Query::WeeklyCycle => cycle_sql(
                tables,
                "MOD(EXTRACT(DAYOFWEEK FROM Time) + 5, 7) + 1 AS day",
                "day",
            ),
            Query::DailyCycle => cycle_sql(tables, "EXTRACT(HOUR FROM Time) AS hour", "hour"),
            Query::FullSeries { hourly } => {
                let (source, alias) = if *hourly {
                    ("Time", "timestamp")
                } else {
                    ("date", "date")
                };
                format!(
                    "WITH con AS ( \
                     SELECT comuna, region, {source} AS {alias}, AVG(PM25) AS concentration_pm25 \
                     FROM `{con}` GROUP BY comuna, region, {alias} \
                     ), emi AS ( \
                     SELECT comuna, region, {source} AS {alias}, SUM(EMI_PM25) AS emission_pm25 \
                     FROM `{emi}` GROUP BY comuna, region, {alias} \
                     ) \
                     SELECT con.comuna AS commune, con.region AS region, con.{alias} AS {alias}, \
                     con.concentration_pm25, emi.emission_pm25 \
                     FROM con JOIN emi ON con.comuna = emi.comuna AND con.{alias} = emi.{alias} \
                     WHERE con.region != '{zone}'",
                    source = source,
                    alias = alias,
                    con = tables.concentrations,
                    emi = tables.emissions,
                    zone = UNCLASSIFIED_ZONE,
                )
            }
            Query::Summary => format!(
                "WITH {base}, \
                 per_commune AS ( \
                 SELECT commune, region, AVG(emission_pm25) AS emission_pm25, \
                 AVG(concentration_pm25) AS concentration_pm25 \
                 FROM base GROUP BY commune, region \
                 ) \
                 SELECT pm25.*, hab.personas AS population \
                 FROM per_commune AS pm25 \
                 JOIN `{hab}` AS hab ON pm25.commune = hab.comuna",
                base = commune_hourly_cte(tables),
                hab = tables.population,
            ),
        }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.cache_key())
    }
}

/// `base` CTE: commune means of PM25 and sums of emissions per hour,
/// without the unclassified zone.
fn commune_hourly_cte(tables: &WarehouseTables) -> String {
    format!(
        "con AS ( \
         SELECT Time, comuna, region, AVG(PM25) AS concentration_pm25 \
         FROM `{con}` GROUP BY Time, comuna, region \
         ), emi AS ( \
         SELECT Time, comuna, region, SUM(EMI_PM25) AS emission_pm25 \
         FROM `{emi}` GROUP BY Time, comuna, region \
         ), base AS ( \
         SELECT con.Time AS Time, con.comuna AS commune, con.region AS region, \
         con.concentration_pm25, emi.emission_pm25 \
         FROM con JOIN emi ON con.comuna = emi.comuna AND con.Time = emi.Time \
         WHERE con.region != '{zone}' \
         )",
        con = tables.concentrations,
        emi = tables.emissions,
        zone = UNCLASSIFIED_ZONE,
    )
}

fn cycle_sql(tables: &WarehouseTables, key_expr: &str, key: &str) -> String {
    format!(
        "WITH {base} \
         SELECT {key_expr}, commune, region, \
         AVG(emission_pm25) AS avg_emission_pm25, STDDEV(emission_pm25) AS stddev_emission_pm25, \
         AVG(concentration_pm25) AS avg_concentration_pm25, \
         STDDEV(concentration_pm25) AS stddev_concentration_pm25 \
         FROM base GROUP BY {key}, commune, region \
         ORDER BY {key}, commune, region",
        base = commune_hourly_cte(tables),
        key_expr = key_expr,
        key = key,
    )
}
