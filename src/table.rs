//! Helpers over the shared table type.
//!
//! The table is a polars [`DataFrame`]: ordered, uniquely named, equal-length
//! columns with null as the missing-marker. Rows are labelled by their
//! ordinal position, re-derived after every operation.

use crate::error::{PrepError, Result, missing_columns};
use polars::prelude::*;

pub type Table = DataFrame;

/// Column names in table order.
pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names()
        .into_iter()
        .map(|name| name.to_string())
        .collect()
}

/// Fail with every name in `wanted` that `df` lacks.
///
/// # Errors
///
/// `ColumnNotFound` listing all absent names.
pub fn require_columns<'a, I>(df: &DataFrame, wanted: I) -> Result<()>
where
    I: IntoIterator<Item = &'a String>,
{
    let missing = missing_columns(&column_names(df), wanted);
    if missing.is_empty() {
        Ok(())
    } else {
        Err(PrepError::ColumnNotFound { missing })
    }
}

pub fn require_column(df: &DataFrame, name: &str) -> Result<()> {
    if df.column(name).is_ok() {
        Ok(())
    } else {
        Err(PrepError::ColumnNotFound {
            missing: vec![name.to_owned()],
        })
    }
}

/// Missing cells in `column`: nulls plus floating-point NaN.
pub fn missing_count(column: &Column) -> usize {
    let nulls = column.null_count();
    if !column.dtype().is_float() {
        return nulls;
    }
    let nan = column
        .cast(&DataType::Float64)
        .ok()
        .and_then(|c| {
            c.f64()
                .ok()
                .map(|ca| ca.into_iter().filter(|v| v.is_some_and(f64::is_nan)).count())
        })
        .unwrap_or(0);
    nulls + nan
}

/// Stable, lowercase dtype name used in reports and type checks.
pub fn dtype_name(dtype: &DataType) -> String {
    match dtype {
        DataType::Boolean => "bool".to_owned(),
        DataType::Int8 => "int8".to_owned(),
        DataType::Int16 => "int16".to_owned(),
        DataType::Int32 => "int32".to_owned(),
        DataType::Int64 => "int64".to_owned(),
        DataType::UInt8 => "uint8".to_owned(),
        DataType::UInt16 => "uint16".to_owned(),
        DataType::UInt32 => "uint32".to_owned(),
        DataType::UInt64 => "uint64".to_owned(),
        DataType::Float32 => "float32".to_owned(),
        DataType::Float64 => "float64".to_owned(),
        DataType::String => "string".to_owned(),
        DataType::Date => "date".to_owned(),
        DataType::Datetime(_, _) => "datetime".to_owned(),
        DataType::Null => "null".to_owned(),
        other => other.to_string().to_lowercase(),
    }
}

/// Map common spellings of a type name onto [`dtype_name`]'s vocabulary.
pub fn canonical_type_name(name: &str) -> String {
    let lower = name.trim().to_lowercase();
    let canonical = match lower.as_str() {
        "int" | "integer" | "i64" | "long" => "int64",
        "i32" => "int32",
        "float" | "double" | "f64" | "number" => "float64",
        "f32" => "float32",
        "str" | "text" | "utf8" | "object" => "string",
        "boolean" => "bool",
        "timestamp" | "datetime64" | "datetime64[ns]" | "datetime64[ms]" => "datetime",
        _ => return lower,
    };
    canonical.to_owned()
}

/// Cell-for-cell equality, treating two missing cells as equal.
pub fn same_contents(a: &DataFrame, b: &DataFrame) -> bool {
    a.equals_missing(b)
}
