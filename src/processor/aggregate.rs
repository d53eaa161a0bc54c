//! Grouping and the shared aggregation vocabulary.

use super::require_numeric;
use crate::error::{PrepError, Result};
use crate::table::{column_names, require_columns};
use crate::value::Value;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Aggregation functions. Every one skips missing values; a group with no
/// non-missing value yields missing, except `count` and `nunique` which
/// yield 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum AggFunc {
    Sum,
    Mean,
    Median,
    Min,
    Max,
    Count,
    Std,
    Var,
    First,
    Last,
    #[serde(rename = "nunique")]
    NUnique,
}

impl AggFunc {
    pub const ALL: [Self; 11] = [
        Self::Sum,
        Self::Mean,
        Self::Median,
        Self::Min,
        Self::Max,
        Self::Count,
        Self::Std,
        Self::Var,
        Self::First,
        Self::Last,
        Self::NUnique,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sum => "sum",
            Self::Mean => "mean",
            Self::Median => "median",
            Self::Min => "min",
            Self::Max => "max",
            Self::Count => "count",
            Self::Std => "std",
            Self::Var => "var",
            Self::First => "first",
            Self::Last => "last",
            Self::NUnique => "nunique",
        }
    }

    /// Whether the function only makes sense over numbers.
    pub fn needs_numeric(self) -> bool {
        matches!(
            self,
            Self::Sum | Self::Mean | Self::Median | Self::Std | Self::Var
        )
    }

    /// Polars expression computing this function over `name` inside a group.
    pub(crate) fn expr(self, name: &str) -> Expr {
        let c = col(name);
        match self {
            // Polars sums an all-null group to 0; missing is wanted instead.
            Self::Sum => when(c.clone().count().gt(lit(0)))
                .then(c.sum())
                .otherwise(lit(NULL)),
            Self::Mean => c.mean(),
            Self::Median => c.median(),
            Self::Min => c.min(),
            Self::Max => c.max(),
            Self::Count => c.count(),
            Self::Std => c.std(1),
            Self::Var => c.var(1),
            Self::First => c.drop_nulls().first(),
            Self::Last => c.drop_nulls().last(),
            Self::NUnique => c.drop_nulls().n_unique(),
        }
    }

    /// Reduce owned values, skipping missing ones.
    pub(crate) fn reduce(self, values: &[Value]) -> Value {
        let present: Vec<&Value> = values.iter().filter(|v| !v.is_missing()).collect();
        match self {
            Self::Count => return Value::Int(present.len() as i64),
            Self::NUnique => {
                let distinct: HashSet<String> = present.iter().map(|v| v.to_string()).collect();
                return Value::Int(distinct.len() as i64);
            }
            Self::First => return present.first().map_or(Value::Missing, |v| (*v).clone()),
            Self::Last => return present.last().map_or(Value::Missing, |v| (*v).clone()),
            _ => {}
        }

        let all_int = present.iter().all(|v| matches!(v, Value::Int(_)));
        let nums: Vec<f64> = present.iter().filter_map(|v| v.as_f64()).collect();
        if nums.is_empty() {
            return Value::Missing;
        }

        match self {
            Self::Sum if all_int => present
                .iter()
                .filter_map(|v| v.as_i64())
                .try_fold(0i64, i64::checked_add)
                .map_or_else(|| Value::Float(nums.iter().sum()), Value::Int),
            Self::Min if all_int => present
                .iter()
                .filter_map(|v| v.as_i64())
                .min()
                .map_or(Value::Missing, Value::Int),
            Self::Max if all_int => present
                .iter()
                .filter_map(|v| v.as_i64())
                .max()
                .map_or(Value::Missing, Value::Int),
            Self::Sum => Value::Float(nums.iter().sum()),
            Self::Min => Value::Float(nums.iter().copied().fold(f64::INFINITY, f64::min)),
            Self::Max => Value::Float(nums.iter().copied().fold(f64::NEG_INFINITY, f64::max)),
            Self::Mean => Value::Float(mean(&nums)),
            Self::Median => Value::Float(median(nums)),
            Self::Var => sample_variance(&nums).map_or(Value::Missing, Value::Float),
            Self::Std => sample_variance(&nums).map_or(Value::Missing, |v| Value::Float(v.sqrt())),
            Self::Count | Self::NUnique | Self::First | Self::Last => Value::Missing,
        }
    }
}

fn mean(nums: &[f64]) -> f64 {
    nums.iter().sum::<f64>() / nums.len() as f64
}

fn median(mut nums: Vec<f64>) -> f64 {
    nums.sort_by(f64::total_cmp);
    let mid = nums.len() / 2;
    if nums.len() % 2 == 0 {
        (nums[mid - 1] + nums[mid]) / 2.0
    } else {
        nums[mid]
    }
}

/// Variance with one delta degree of freedom; needs at least two values.
fn sample_variance(nums: &[f64]) -> Option<f64> {
    if nums.len() < 2 {
        return None;
    }
    let m = mean(nums);
    let ss: f64 = nums.iter().map(|x| (x - m).powi(2)).sum();
    Some(ss / (nums.len() - 1) as f64)
}

impl fmt::Display for AggFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AggFunc {
    type Err = PrepError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "sum" => Ok(Self::Sum),
            "mean" | "avg" | "average" => Ok(Self::Mean),
            "median" => Ok(Self::Median),
            "min" => Ok(Self::Min),
            "max" => Ok(Self::Max),
            "count" => Ok(Self::Count),
            "std" | "stdev" => Ok(Self::Std),
            "var" => Ok(Self::Var),
            "first" => Ok(Self::First),
            "last" => Ok(Self::Last),
            "nunique" | "n_unique" => Ok(Self::NUnique),
            _ => Err(PrepError::UnsupportedOperation {
                kind: "aggregation function",
                tag: s.to_owned(),
            }),
        }
    }
}

impl TryFrom<String> for AggFunc {
    type Error = PrepError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

/// Group by the distinct combinations of `by` and apply each listed function
/// to its column.
///
/// Output columns are the group keys followed by one `<column>_<func>` per
/// pair, with one row per group, sorted by key. Rows with a missing key are
/// not grouped. Floating-point NaN is treated as missing.
///
/// # Errors
///
/// `InvalidArgument` for an empty `by` or `aggs`, `ColumnNotFound` for every
/// absent key or value column, `TypeMismatch` for numeric-only functions on
/// non-numeric columns.
pub fn group_and_aggregate(
    df: &DataFrame,
    by: &[String],
    aggs: &[(String, Vec<AggFunc>)],
) -> Result<DataFrame> {
    if by.is_empty() {
        return Err(PrepError::InvalidArgument(
            "at least one group-by column is required".to_owned(),
        ));
    }
    if aggs.is_empty() || aggs.iter().any(|(_, funcs)| funcs.is_empty()) {
        return Err(PrepError::InvalidArgument(
            "every aggregated column needs at least one function".to_owned(),
        ));
    }
    require_columns(df, by.iter().chain(aggs.iter().map(|(name, _)| name)))?;
    require_numeric(
        df,
        aggs.iter().flat_map(|(name, funcs)| {
            funcs
                .iter()
                .filter(|f| f.needs_numeric())
                .map(move |f| (name.as_str(), f.as_str()))
        }),
    )?;

    let keys: Vec<Expr> = by.iter().map(|name| col(name.as_str())).collect();
    let exprs: Vec<Expr> = aggs
        .iter()
        .flat_map(|(name, funcs)| {
            funcs
                .iter()
                .map(move |f| f.expr(name).alias(format!("{name}_{}", f.as_str())))
        })
        .collect();
    let keys_present = by
        .iter()
        .map(|name| col(name.as_str()).is_not_null())
        .reduce(|acc, next| acc.and(next))
        .unwrap_or_else(|| lit(true));

    let out = df
        .clone()
        .lazy()
        .fill_nan(lit(NULL))
        .filter(keys_present)
        .group_by(keys.as_slice())
        .agg(exprs)
        .sort_by_exprs(keys.as_slice(), SortMultipleOptions::default())
        .collect()?;

    tracing::debug!(
        "Grouped {} rows by {:?} into {} groups ({:?})",
        df.height(),
        by,
        out.height(),
        column_names(&out)
    );
    Ok(out)
}
