//! Time-series resampling into fixed calendar buckets.
//!
//! Buckets are left-closed and labelled by their start. Weekly buckets always
//! start on Sunday at midnight, whatever weekday the data begins on. The
//! output covers every bucket from the first occupied one to the last, so
//! gaps in the data show up as rows of missing values.

use super::aggregate::AggFunc;
use super::require_numeric;
use crate::error::{PrepError, Result};
use crate::table::{dtype_name, require_columns};
use chrono::{
    DateTime, Datelike as _, Days, Months, NaiveDate, NaiveDateTime, NaiveTime, Timelike as _,
};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Bucket start in epoch milliseconds, joined against the full bucket range.
const BUCKET_KEY: &str = "__bucket_start";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum Frequency {
    Hour,
    Day,
    Week,
    Month,
    Quarter,
    Year,
}

impl Frequency {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hour => "hour",
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
            Self::Quarter => "quarter",
            Self::Year => "year",
        }
    }

    /// Start of the bucket containing `ts`.
    fn bucket_start(self, ts: NaiveDateTime) -> Option<NaiveDateTime> {
        let date = ts.date();
        let start = match self {
            Self::Hour => return date.and_hms_opt(ts.hour(), 0, 0),
            Self::Day => date,
            Self::Week => {
                date.checked_sub_days(Days::new(u64::from(date.weekday().num_days_from_sunday())))?
            }
            Self::Month => NaiveDate::from_ymd_opt(date.year(), date.month(), 1)?,
            Self::Quarter => {
                NaiveDate::from_ymd_opt(date.year(), (date.month() - 1) / 3 * 3 + 1, 1)?
            }
            Self::Year => NaiveDate::from_ymd_opt(date.year(), 1, 1)?,
        };
        Some(start.and_time(NaiveTime::MIN))
    }

    /// Start of the bucket after the one starting at `start`.
    fn next(self, start: NaiveDateTime) -> Option<NaiveDateTime> {
        match self {
            Self::Hour => start.checked_add_signed(chrono::Duration::hours(1)),
            Self::Day => start.checked_add_days(Days::new(1)),
            Self::Week => start.checked_add_days(Days::new(7)),
            Self::Month => start.checked_add_months(Months::new(1)),
            Self::Quarter => start.checked_add_months(Months::new(3)),
            Self::Year => start.checked_add_months(Months::new(12)),
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Frequency {
    type Err = PrepError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "h" | "hour" | "hourly" => Ok(Self::Hour),
            "d" | "day" | "daily" => Ok(Self::Day),
            "w" | "week" | "weekly" => Ok(Self::Week),
            "m" | "ms" | "month" | "monthly" => Ok(Self::Month),
            "q" | "qs" | "quarter" | "quarterly" => Ok(Self::Quarter),
            "y" | "a" | "ys" | "year" | "yearly" | "annual" => Ok(Self::Year),
            _ => Err(PrepError::UnsupportedOperation {
                kind: "resample frequency",
                tag: s.to_owned(),
            }),
        }
    }
}

impl TryFrom<String> for Frequency {
    type Error = PrepError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d.%m.%Y"];

fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
                .map(|d| d.and_time(NaiveTime::MIN))
        })
        .or_else(|| {
            DateTime::parse_from_rfc3339(text)
                .ok()
                .map(|dt| dt.naive_utc())
        })
}

fn from_millis(ms: i64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp_millis(ms).map(|dt| dt.naive_utc())
}

/// Timestamps of `column`, `None` where the cell is missing.
fn timestamps(column: &Column) -> Result<Vec<Option<NaiveDateTime>>> {
    match column.dtype() {
        DataType::Datetime(unit, _) => {
            let per_ms = match unit {
                TimeUnit::Nanoseconds => 1_000_000,
                TimeUnit::Microseconds => 1_000,
                TimeUnit::Milliseconds => 1,
            };
            let raw = column.cast(&DataType::Int64)?;
            Ok(raw
                .i64()?
                .into_iter()
                .map(|v| v.and_then(|t| from_millis(t.div_euclid(per_ms))))
                .collect())
        }
        DataType::Date => {
            let raw = column.cast(&DataType::Int32)?;
            Ok(raw
                .i32()?
                .into_iter()
                .map(|v| v.and_then(|days| from_millis(i64::from(days) * 86_400_000)))
                .collect())
        }
        DataType::String => {
            let mut parsed = Vec::with_capacity(column.len());
            let mut bad: Vec<String> = Vec::new();
            for cell in column.str()? {
                match cell.map(str::trim).filter(|s| !s.is_empty()) {
                    None => parsed.push(None),
                    Some(text) => match parse_timestamp(text) {
                        Some(ts) => parsed.push(Some(ts)),
                        None => {
                            if !bad.iter().any(|b| b == text) {
                                bad.push(text.to_owned());
                            }
                            parsed.push(None);
                        }
                    },
                }
            }
            if bad.is_empty() {
                Ok(parsed)
            } else {
                Err(PrepError::InvalidArgument(format!(
                    "column '{}' has values that are not timestamps: {bad:?}",
                    column.name()
                )))
            }
        }
        other => Err(PrepError::TypeMismatch {
            mismatches: vec![crate::error::TypeMismatch {
                column: column.name().to_string(),
                expected: "datetime, date or text timestamps".to_owned(),
                actual: dtype_name(other),
            }],
        }),
    }
}

/// Bucket rows by `frequency` on `datetime_column` and aggregate each
/// listed column with its function.
///
/// The result has the bucket start as its first column (named after
/// `datetime_column`), followed by one column per aggregation keeping the
/// source column's name. Rows with a missing timestamp are skipped.
///
/// # Errors
///
/// `ColumnNotFound` for every absent column, `InvalidArgument` for an empty
/// aggregation list, a column listed twice, an aggregation on the datetime
/// column itself, or text
/// that does not parse as a timestamp, `TypeMismatch` for numeric-only
/// functions on non-numeric columns or a datetime column of another type.
pub fn resample_time_series(
    df: &DataFrame,
    datetime_column: &str,
    frequency: Frequency,
    aggs: &[(String, AggFunc)],
) -> Result<DataFrame> {
    let dt_name = datetime_column.to_owned();
    require_columns(df, std::iter::once(&dt_name).chain(aggs.iter().map(|(c, _)| c)))?;
    if aggs.is_empty() {
        return Err(PrepError::InvalidArgument(
            "resampling needs at least one aggregated column".to_owned(),
        ));
    }
    if aggs.iter().any(|(c, _)| c == datetime_column) {
        return Err(PrepError::InvalidArgument(format!(
            "cannot aggregate the datetime column '{datetime_column}' itself"
        )));
    }
    let mut seen = HashSet::new();
    if let Some((dup, _)) = aggs.iter().find(|(c, _)| !seen.insert(c.as_str())) {
        return Err(PrepError::InvalidArgument(format!(
            "column '{dup}' is aggregated more than once"
        )));
    }
    require_numeric(
        df,
        aggs.iter()
            .filter(|(_, f)| f.needs_numeric())
            .map(|(c, f)| (c.as_str(), f.as_str())),
    )?;

    let stamps = timestamps(df.column(datetime_column)?)?;
    let bucket_starts: Vec<Option<NaiveDateTime>> = stamps
        .iter()
        .map(|ts| {
            ts.map(|ts| frequency.bucket_start(ts).ok_or_else(|| out_of_range(ts)))
                .transpose()
        })
        .collect::<Result<_>>()?;

    let mut starts: Vec<i64> = Vec::new();
    let first = bucket_starts.iter().flatten().min();
    let last = bucket_starts.iter().flatten().max();
    if let (Some(first), Some(last)) = (first, last) {
        let mut cursor = *first;
        while cursor <= *last {
            starts.push(cursor.and_utc().timestamp_millis());
            cursor = frequency.next(cursor).ok_or_else(|| out_of_range(cursor))?;
        }
    }
    let keys: Vec<Option<i64>> = bucket_starts
        .iter()
        .map(|start| start.map(|s| s.and_utc().timestamp_millis()))
        .collect();

    let agg_names: Vec<String> = aggs.iter().map(|(c, _)| c.clone()).collect();
    let mut keyed = df.select(agg_names.iter().map(String::as_str))?;
    keyed.with_column(Series::new(BUCKET_KEY.into(), keys))?;
    let bucket_frame = DataFrame::new(vec![Column::new(BUCKET_KEY.into(), starts)])?;

    let grouped = keyed
        .lazy()
        .fill_nan(lit(NULL))
        .filter(col(BUCKET_KEY).is_not_null())
        .group_by([col(BUCKET_KEY)])
        .agg(
            aggs.iter()
                .map(|(name, func)| func.expr(name).alias(name.as_str()))
                .collect::<Vec<_>>(),
        );

    // Empty buckets come out of the join as nulls; counts there are 0.
    let filled: Vec<Expr> = aggs
        .iter()
        .filter(|(_, func)| matches!(func, AggFunc::Count | AggFunc::NUnique))
        .map(|(name, _)| {
            col(name.as_str())
                .fill_null(lit(0))
                .cast(DataType::Int64)
                .alias(name.as_str())
        })
        .collect();
    let mut projection = vec![
        col(BUCKET_KEY)
            .cast(DataType::Datetime(TimeUnit::Milliseconds, None))
            .alias(datetime_column),
    ];
    projection.extend(agg_names.iter().map(|name| col(name.as_str())));

    let out = bucket_frame
        .lazy()
        .left_join(grouped, col(BUCKET_KEY), col(BUCKET_KEY))
        .with_columns(filled)
        .sort_by_exprs([col(BUCKET_KEY)], SortMultipleOptions::default())
        .select(projection)
        .collect()?;

    tracing::debug!(
        "Resampled {} rows on '{}' at {} into {} buckets",
        df.height(),
        datetime_column,
        frequency,
        out.height()
    );
    Ok(out)
}

fn out_of_range(ts: NaiveDateTime) -> PrepError {
    PrepError::InvalidArgument(format!("timestamp {ts} is outside the supported range"))
}
