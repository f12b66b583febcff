use crate::types::columns::TIMESTAMP;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use polars::prelude::{col, lit, DataType, LazyFrame, TimeUnit};

pub trait TimeWindowFilterExt {
    /// Keeps rows whose `timestamp` lies in `[start, end)`.
    ///
    /// An empty window (`start >= end`) keeps nothing. The column is cast to
    /// millisecond datetimes first, so any datetime unit compares correctly.
    fn filter_time_window(self, start: NaiveDateTime, end: NaiveDateTime) -> LazyFrame;

    /// Keeps rows whose `timestamp` falls on a day in `[start, end)`, i.e. from
    /// midnight of `start` up to but excluding midnight of `end`.
    fn filter_date_window(self, start: NaiveDate, end: NaiveDate) -> LazyFrame;
}

impl TimeWindowFilterExt for LazyFrame {
    fn filter_time_window(self, start: NaiveDateTime, end: NaiveDateTime) -> LazyFrame {
        let ts = || col(TIMESTAMP).cast(DataType::Datetime(TimeUnit::Milliseconds, None));
        self.filter(ts().gt_eq(lit(start)).and(ts().lt(lit(end))))
    }

    fn filter_date_window(self, start: NaiveDate, end: NaiveDate) -> LazyFrame {
        self.filter_time_window(
            start.and_time(NaiveTime::MIN),
            end.and_time(NaiveTime::MIN),
        )
    }
}
