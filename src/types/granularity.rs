//! Defines the temporal granularities used to group observations and the typed
//! keys they produce.

use crate::types::columns::{DATE, DAY, HOUR, TIMESTAMP};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use polars::prelude::{col, Column, DataType, Expr, PolarsResult, TimeUnit};
use serde::Serialize;
use std::fmt;

/// Days between 0001-01-01 (chrono's CE day 1) and the Unix epoch, which is
/// where polars `Date` values count from.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// Represents the temporal key observations are grouped by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemporalGranularity {
    /// ISO day of week, 1 = Monday through 7 = Sunday.
    DayOfWeek,
    /// Hour of day, 0 through 23.
    HourOfDay,
    /// Calendar date of the observation.
    CalendarDate,
    /// The raw observation timestamp.
    Timestamp,
}

impl TemporalGranularity {
    pub const ALL: [TemporalGranularity; 4] = [
        TemporalGranularity::DayOfWeek,
        TemporalGranularity::HourOfDay,
        TemporalGranularity::CalendarDate,
        TemporalGranularity::Timestamp,
    ];

    /// Name of the column holding this granularity's key.
    pub fn key_column(&self) -> &'static str {
        match self {
            TemporalGranularity::DayOfWeek => DAY,
            TemporalGranularity::HourOfDay => HOUR,
            TemporalGranularity::CalendarDate => DATE,
            TemporalGranularity::Timestamp => TIMESTAMP,
        }
    }

    /// Expression deriving the key from the `timestamp` column.
    pub(crate) fn key_from_timestamp(&self) -> Expr {
        let ts = col(TIMESTAMP);
        match self {
            TemporalGranularity::DayOfWeek => ts.dt().weekday().cast(DataType::Int32),
            TemporalGranularity::HourOfDay => ts.dt().hour().cast(DataType::Int32),
            TemporalGranularity::CalendarDate => ts.cast(DataType::Date),
            TemporalGranularity::Timestamp => ts,
        }
        .alias(self.key_column())
    }

    /// The granularity whose key column is `name`, if any.
    pub fn from_key_column(name: &str) -> Option<TemporalGranularity> {
        Self::ALL.into_iter().find(|g| g.key_column() == name)
    }
}

impl fmt::Display for TemporalGranularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key_column())
    }
}

/// A typed temporal key value, as found on the x axis of a chart.
///
/// All keys of one table share the same variant, so the derived ordering is
/// the natural chronological (or ordinal) order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(untagged)]
pub enum TemporalKey {
    /// Day of week or hour of day.
    Ordinal(i64),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
}

impl fmt::Display for TemporalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemporalKey::Ordinal(v) => write!(f, "{}", v),
            TemporalKey::Date(d) => write!(f, "{}", d),
            TemporalKey::Timestamp(ts) => write!(f, "{}", ts),
        }
    }
}

/// Reads a key column into typed keys, row by row. Nulls stay `None`.
pub(crate) fn read_temporal_keys(column: &Column) -> PolarsResult<Vec<Option<TemporalKey>>> {
    match column.dtype() {
        DataType::Date => {
            let days = column.cast(&DataType::Int32)?;
            Ok(days
                .i32()?
                .into_iter()
                .map(|d| {
                    d.and_then(|d| {
                        NaiveDate::from_num_days_from_ce_opt(d + UNIX_EPOCH_DAYS_FROM_CE)
                    })
                    .map(TemporalKey::Date)
                })
                .collect())
        }
        DataType::Datetime(unit, _) => {
            let unit = *unit;
            let raw = column.cast(&DataType::Int64)?;
            Ok(raw
                .i64()?
                .into_iter()
                .map(|v| {
                    v.and_then(|v| naive_from_epoch(v, unit))
                        .map(TemporalKey::Timestamp)
                })
                .collect())
        }
        _ => {
            let ordinals = column.cast(&DataType::Int64)?;
            Ok(ordinals
                .i64()?
                .into_iter()
                .map(|v| v.map(TemporalKey::Ordinal))
                .collect())
        }
    }
}

pub(crate) fn naive_from_epoch(value: i64, unit: TimeUnit) -> Option<NaiveDateTime> {
    match unit {
        TimeUnit::Milliseconds => DateTime::from_timestamp_millis(value),
        TimeUnit::Microseconds => DateTime::from_timestamp_micros(value),
        TimeUnit::Nanoseconds => Some(DateTime::from_timestamp_nanos(value)),
    }
    .map(|dt| dt.naive_utc())
}
