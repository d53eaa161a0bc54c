//! Column-level edits: drop, add, derive, rename and elementwise arithmetic.

use super::require_numeric;
use crate::error::{PrepError, Result};
use crate::table::{column_names, missing_count, require_column, require_columns};
use crate::value::{Value, column_values, values_to_series};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

/// Remove the named columns.
///
/// # Errors
///
/// `ColumnNotFound` listing every name that is not in the table.
pub fn drop_columns(df: &DataFrame, names: &[String]) -> Result<DataFrame> {
    require_columns(df, names)?;
    let dropped: HashSet<&str> = names.iter().map(String::as_str).collect();
    let keep: Vec<String> = column_names(df)
        .into_iter()
        .filter(|name| !dropped.contains(name.as_str()))
        .collect();
    tracing::debug!("Dropping columns {:?}", names);
    Ok(df.select(keep)?)
}

/// Projection in the given order.
///
/// # Errors
///
/// `ColumnNotFound` listing every absent name.
pub fn select_columns(df: &DataFrame, names: &[String]) -> Result<DataFrame> {
    require_columns(df, names)?;
    Ok(df.select(names.iter().map(String::as_str))?)
}

/// Add (or replace) a column from owned values.
///
/// Shorter input is padded with missing values, longer input is truncated,
/// and an empty slice produces an all-missing column. No length error is
/// raised.
///
/// # Errors
///
/// Only on polars engine failures.
pub fn add_column(df: &DataFrame, name: &str, values: &[Value]) -> Result<DataFrame> {
    let height = df.height();
    let mut fitted: Vec<Value> = values.iter().take(height).cloned().collect();
    if values.len() != height {
        tracing::debug!(
            "Column '{}' given {} values for {} rows; fitting to table height",
            name,
            values.len(),
            height
        );
    }
    fitted.resize(height, Value::Missing);

    let mut out = df.clone();
    out.with_column(values_to_series(name, &fitted))?;
    Ok(out)
}

/// Derive a column from the whole table.
///
/// `derive` must return exactly one value per row.
///
/// # Errors
///
/// `InvalidArgument` when the returned length differs from the row count.
pub fn create_column_from_existing<F>(df: &DataFrame, new_name: &str, derive: F) -> Result<DataFrame>
where
    F: FnOnce(&DataFrame) -> Vec<Value>,
{
    let values = derive(df);
    if values.len() != df.height() {
        return Err(PrepError::InvalidArgument(format!(
            "derived column '{new_name}' has {} values, table has {} rows",
            values.len(),
            df.height()
        )));
    }
    let mut out = df.clone();
    out.with_column(values_to_series(new_name, &values))?;
    Ok(out)
}

/// Replace every value of `column` with `f(value)`.
///
/// # Errors
///
/// `ColumnNotFound` when `column` is absent.
pub fn apply_transformation<F>(df: &DataFrame, column: &str, f: F) -> Result<DataFrame>
where
    F: Fn(&Value) -> Value,
{
    require_column(df, column)?;
    let mapped: Vec<Value> = column_values(df.column(column)?)
        .iter()
        .map(&f)
        .collect();
    let mut out = df.clone();
    out.with_column(values_to_series(column, &mapped))?;
    Ok(out)
}

/// Rename columns through an old-to-new mapping. Unmapped columns keep
/// their names and position.
///
/// # Errors
///
/// `ColumnNotFound` listing every unknown old name, `InvalidArgument` when
/// the result would hold duplicate names.
pub fn rename_columns(df: &DataFrame, mapping: &HashMap<String, String>) -> Result<DataFrame> {
    let mut wanted: Vec<&String> = mapping.keys().collect();
    wanted.sort();
    require_columns(df, wanted)?;

    let renamed: Vec<String> = column_names(df)
        .into_iter()
        .map(|name| mapping.get(&name).cloned().unwrap_or(name))
        .collect();
    let mut seen = HashSet::new();
    let mut duplicates: Vec<&str> = renamed
        .iter()
        .filter(|name| !seen.insert(name.as_str()))
        .map(String::as_str)
        .collect();
    if !duplicates.is_empty() {
        duplicates.sort_unstable();
        duplicates.dedup();
        return Err(PrepError::InvalidArgument(format!(
            "renaming would duplicate column names: {duplicates:?}"
        )));
    }

    let mut out = df.clone();
    out.set_column_names(renamed.iter().map(String::as_str))?;
    Ok(out)
}

/// Remove columns in which every cell is missing. Floating-point NaN counts
/// as missing.
///
/// # Errors
///
/// Only on polars engine failures.
pub fn drop_empty_columns(df: &DataFrame) -> Result<DataFrame> {
    let height = df.height();
    let mut empty = Vec::new();
    for column in df.get_columns() {
        if missing_count(column) == height {
            empty.push(column.name().to_string());
        }
    }
    if empty.is_empty() {
        return Ok(df.clone());
    }
    tracing::debug!("Dropping empty columns {:?}", empty);
    drop_columns(df, &empty)
}

/// Elementwise binary operations for [`math_operation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum MathOp {
    Sum,
    Diff,
    Prod,
    Mean,
}

impl MathOp {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sum => "sum",
            Self::Diff => "diff",
            Self::Prod => "prod",
            Self::Mean => "mean",
        }
    }
}

impl fmt::Display for MathOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MathOp {
    type Err = PrepError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "sum" | "add" => Ok(Self::Sum),
            "diff" | "sub" | "subtract" => Ok(Self::Diff),
            "prod" | "mul" | "multiply" => Ok(Self::Prod),
            "mean" | "avg" => Ok(Self::Mean),
            _ => Err(PrepError::UnsupportedOperation {
                kind: "math operation",
                tag: s.to_owned(),
            }),
        }
    }
}

impl TryFrom<String> for MathOp {
    type Error = PrepError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

/// Combine two columns elementwise into `new_name`. Missing on either side
/// gives missing.
///
/// # Errors
///
/// `ColumnNotFound` naming each absent operand, `TypeMismatch` when an
/// operand is not numeric.
pub fn math_operation(
    df: &DataFrame,
    col_a: &str,
    col_b: &str,
    op: MathOp,
    new_name: &str,
) -> Result<DataFrame> {
    require_columns(df, [&col_a.to_owned(), &col_b.to_owned()])?;
    require_numeric(df, [(col_a, op.as_str()), (col_b, op.as_str())])?;

    let a = operand(df, col_a)?;
    let b = operand(df, col_b)?;
    let expr = match op {
        MathOp::Sum => a + b,
        MathOp::Diff => a - b,
        MathOp::Prod => a * b,
        MathOp::Mean => (a + b) / lit(2.0),
    };

    Ok(df
        .clone()
        .lazy()
        .with_column(expr.alias(new_name))
        .collect()?)
}

/// Booleans take part in arithmetic as 0/1.
fn operand(df: &DataFrame, name: &str) -> Result<Expr> {
    Ok(if df.column(name)?.dtype().is_bool() {
        col(name).cast(DataType::Int64)
    } else {
        col(name)
    })
}
