//! Scalar cell values and the row view handed to caller-supplied callbacks.
//!
//! Polars' `AnyValue` borrows from the frame it came from, which makes it
//! awkward to return from a user closure. [`Value`] is the owned counterpart
//! used at the callback boundary: predicates receive a [`RowView`],
//! per-value transforms map `&Value -> Value`, and derived columns are built
//! from `Vec<Value>`.

use polars::prelude::*;
use std::fmt;

/// An owned scalar. `Missing` is the missing-marker: comparisons against it
/// are always false and aggregations skip it.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Missing,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing)
    }

    /// Numeric view of the value. Booleans count as 0/1.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) if !v.is_nan() => Some(*v),
            Self::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric greater-than; false whenever either side is missing or non-numeric.
    pub fn gt(&self, other: f64) -> bool {
        self.as_f64().is_some_and(|v| v > other)
    }

    /// Numeric less-than; false whenever either side is missing or non-numeric.
    pub fn lt(&self, other: f64) -> bool {
        self.as_f64().is_some_and(|v| v < other)
    }

    pub(crate) fn from_any(av: &AnyValue<'_>) -> Self {
        match av {
            AnyValue::Null => Self::Missing,
            AnyValue::Boolean(b) => Self::Bool(*b),
            AnyValue::String(s) => Self::Text((*s).to_owned()),
            AnyValue::StringOwned(s) => Self::Text(s.to_string()),
            AnyValue::Float32(v) if v.is_nan() => Self::Missing,
            AnyValue::Float64(v) if v.is_nan() => Self::Missing,
            AnyValue::Float32(v) => Self::Float(f64::from(*v)),
            AnyValue::Float64(v) => Self::Float(*v),
            AnyValue::Int8(v) => Self::Int(i64::from(*v)),
            AnyValue::Int16(v) => Self::Int(i64::from(*v)),
            AnyValue::Int32(v) => Self::Int(i64::from(*v)),
            AnyValue::Int64(v) => Self::Int(*v),
            AnyValue::UInt8(v) => Self::Int(i64::from(*v)),
            AnyValue::UInt16(v) => Self::Int(i64::from(*v)),
            AnyValue::UInt32(v) => Self::Int(i64::from(*v)),
            AnyValue::UInt64(v) => i64::try_from(*v)
                .map(Self::Int)
                .unwrap_or(Self::Float(*v as f64)),
            // Temporal and nested values surface as their display text.
            other => Self::Text(other.to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => write!(f, ""),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl<T: Into<Self>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Missing, Into::into)
    }
}

/// Read-only view of one row, passed to row predicates.
#[derive(Clone, Copy)]
pub struct RowView<'a> {
    df: &'a DataFrame,
    idx: usize,
}

impl<'a> RowView<'a> {
    pub(crate) fn new(df: &'a DataFrame, idx: usize) -> Self {
        Self { df, idx }
    }

    /// Ordinal position of the row in the table.
    pub fn index(&self) -> usize {
        self.idx
    }

    /// Value in column `name`; `Missing` when the column does not exist.
    pub fn get(&self, name: &str) -> Value {
        self.df
            .column(name)
            .and_then(|c| c.get(self.idx))
            .map(|av| Value::from_any(&av))
            .unwrap_or(Value::Missing)
    }
}

/// Every value of `column` as owned [`Value`]s, in row order.
pub(crate) fn column_values(column: &Column) -> Vec<Value> {
    let series = column.as_materialized_series().rechunk();
    series.iter().map(|av| Value::from_any(&av)).collect()
}

/// Build a series from owned values. The dtype is the narrowest that holds
/// every non-missing value: all bools, all ints, ints and floats (as float),
/// or text. Mixed kinds fall back to their text form.
pub fn values_to_series(name: &str, values: &[Value]) -> Series {
    let name: PlSmallStr = name.into();
    let (mut bools, mut ints, mut floats, mut texts) = (0usize, 0usize, 0usize, 0usize);
    for v in values {
        match v {
            Value::Missing => {}
            Value::Bool(_) => bools += 1,
            Value::Int(_) => ints += 1,
            Value::Float(_) => floats += 1,
            Value::Text(_) => texts += 1,
        }
    }

    let present = bools + ints + floats + texts;
    if present == 0 {
        // No type information at all; store as nullable floats.
        let vals: Vec<Option<f64>> = vec![None; values.len()];
        return Series::new(name, vals);
    }

    if bools == present {
        let vals: Vec<Option<bool>> = values
            .iter()
            .map(|v| match v {
                Value::Bool(b) => Some(*b),
                _ => None,
            })
            .collect();
        Series::new(name, vals)
    } else if ints == present {
        let vals: Vec<Option<i64>> = values.iter().map(Value::as_i64).collect();
        Series::new(name, vals)
    } else if ints + floats == present {
        let vals: Vec<Option<f64>> = values.iter().map(Value::as_f64).collect();
        Series::new(name, vals)
    } else {
        let vals: Vec<Option<String>> = values
            .iter()
            .map(|v| (!v.is_missing()).then(|| v.to_string()))
            .collect();
        Series::new(name, vals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_never_compares() {
        assert!(!Value::Missing.gt(0.0), "missing is never greater");
        assert!(!Value::Missing.lt(0.0), "missing is never smaller");
        assert!(Value::Int(3).gt(2.0), "3 > 2");
    }

    #[test]
    fn test_values_to_series_picks_narrowest_dtype() {
        let ints = values_to_series("a", &[Value::Int(1), Value::Missing, Value::Int(3)]);
        assert_eq!(ints.dtype(), &DataType::Int64);
        assert_eq!(ints.null_count(), 1);

        let mixed = values_to_series("b", &[Value::Int(1), Value::Float(2.5)]);
        assert_eq!(mixed.dtype(), &DataType::Float64);

        let text = values_to_series("c", &[Value::Int(1), Value::from("x")]);
        assert_eq!(text.dtype(), &DataType::String);
    }

    #[test]
    fn test_row_view_reads_cells() -> anyhow::Result<()> {
        let df = df!("name" => ["Alice", "Bob"], "age" => [30i64, 25])?;
        let row = RowView::new(&df, 1);
        assert_eq!(row.get("name"), Value::from("Bob"));
        assert_eq!(row.get("age"), Value::Int(25));
        assert_eq!(row.get("nope"), Value::Missing);
        Ok(())
    }
}
