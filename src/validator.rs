//! Predicate checks over a table.
//!
//! Each `validate_*` function returns `Ok(())` when the table satisfies the
//! predicate and otherwise a [`PrepError::Validation`] (or `ColumnNotFound`,
//! `TypeMismatch`) carrying everything needed to explain the failure. None
//! of them modify the table.

pub mod quality;

pub use quality::{ColumnQuality, QualityReport, data_quality_report};

use crate::error::{PrepError, RangeBound, Result, TypeMismatch, ValidationFailure};
use crate::loader::missing_counts;
use crate::processor::is_numeric_like;
use crate::table::{
    canonical_type_name, column_names, dtype_name, missing_count, require_column, require_columns,
};
use crate::value::{Value, column_values};
use polars::prelude::*;
use std::collections::{BTreeSet, HashSet};

/// Missing-value count for every column, in table order.
pub fn check_missing_values(df: &DataFrame) -> Vec<(String, usize)> {
    missing_counts(df)
}

/// Require `columns` (all columns when `None`) to be free of missing values.
///
/// # Errors
///
/// `ColumnNotFound` for absent names, `Validation(MissingValues)` listing
/// each column with missing cells and its count.
pub fn validate_no_missing(df: &DataFrame, columns: Option<&[String]>) -> Result<()> {
    let names = match columns {
        Some(names) => {
            require_columns(df, names)?;
            names.to_vec()
        }
        None => column_names(df),
    };

    let counts: Vec<(String, usize)> = names
        .into_iter()
        .filter_map(|name| {
            let nulls = df.column(&name).map(missing_count).unwrap_or(0);
            (nulls > 0).then_some((name, nulls))
        })
        .collect();

    if counts.is_empty() {
        Ok(())
    } else {
        Err(ValidationFailure::MissingValues { counts }.into())
    }
}

/// Check each column's dtype against an expected type name.
///
/// Names are compared after normalising common spellings (`int`, `float`,
/// `str`, ...); `numeric` accepts any numeric column.
///
/// # Errors
///
/// `ColumnNotFound` for absent names, otherwise `TypeMismatch` with every
/// mismatching column.
pub fn validate_column_types(df: &DataFrame, expected: &[(String, String)]) -> Result<()> {
    require_columns(df, expected.iter().map(|(name, _)| name))?;

    let mut mismatches = Vec::new();
    for (name, want) in expected {
        let dtype = df.column(name)?.dtype();
        let want = canonical_type_name(want);
        let actual = dtype_name(dtype);
        let ok = if want == "numeric" {
            is_numeric_like(dtype)
        } else {
            want == actual
        };
        if !ok {
            mismatches.push(TypeMismatch {
                column: name.clone(),
                expected: want,
                actual,
            });
        }
    }

    if mismatches.is_empty() {
        Ok(())
    } else {
        Err(PrepError::TypeMismatch { mismatches })
    }
}

/// Require the tuple of values across `columns` to be unique per row.
/// Two missing cells count as equal.
///
/// # Errors
///
/// `InvalidArgument` for an empty column list, `ColumnNotFound`, or
/// `Validation(Duplicates)` with the number of repeated rows.
pub fn validate_unique(df: &DataFrame, columns: &[String]) -> Result<()> {
    if columns.is_empty() {
        return Err(PrepError::InvalidArgument(
            "uniqueness needs at least one column".to_owned(),
        ));
    }
    require_columns(df, columns)?;

    let duplicate_rows = count_duplicate_rows(df, columns)?;
    if duplicate_rows == 0 {
        Ok(())
    } else {
        Err(ValidationFailure::Duplicates {
            columns: columns.to_vec(),
            duplicate_rows,
        }
        .into())
    }
}

/// Rows whose key over `columns` already appeared earlier.
pub(crate) fn count_duplicate_rows(df: &DataFrame, columns: &[String]) -> Result<usize> {
    let mut keyed: Vec<Vec<String>> = vec![Vec::with_capacity(columns.len()); df.height()];
    for name in columns {
        for (row, value) in column_values(df.column(name)?).iter().enumerate() {
            if let Some(key) = keyed.get_mut(row) {
                key.push(format!("{value:?}"));
            }
        }
    }
    let mut seen = HashSet::with_capacity(keyed.len());
    Ok(keyed.into_iter().filter(|key| !seen.insert(key.clone())).count())
}

/// Require every present value of `column` to lie within `[min, max]`.
/// Either bound may be omitted.
///
/// # Errors
///
/// `InvalidArgument` when `min > max`, `ColumnNotFound`, `TypeMismatch` for
/// a non-numeric column, or `Validation(OutOfRange)` naming each violated
/// bound.
pub fn validate_value_ranges(
    df: &DataFrame,
    column: &str,
    min: Option<f64>,
    max: Option<f64>,
) -> Result<()> {
    if let (Some(lo), Some(hi)) = (min, max) {
        if lo > hi {
            return Err(PrepError::InvalidArgument(format!(
                "range minimum {lo} exceeds maximum {hi}"
            )));
        }
    }
    require_column(df, column)?;
    let series = df.column(column)?;
    if !is_numeric_like(series.dtype()) {
        return Err(PrepError::TypeMismatch {
            mismatches: vec![TypeMismatch {
                column: column.to_owned(),
                expected: "numeric".to_owned(),
                actual: dtype_name(series.dtype()),
            }],
        });
    }

    let as_f64 = series.cast(&DataType::Float64)?;
    let (mut below, mut above) = (0usize, 0usize);
    for v in as_f64.f64()?.into_iter().flatten().filter(|v| !v.is_nan()) {
        if min.is_some_and(|lo| v < lo) {
            below += 1;
        }
        if max.is_some_and(|hi| v > hi) {
            above += 1;
        }
    }

    let mut violations = Vec::new();
    if let Some(lo) = min.filter(|_| below > 0) {
        violations.push((RangeBound::Min, lo, below));
    }
    if let Some(hi) = max.filter(|_| above > 0) {
        violations.push((RangeBound::Max, hi, above));
    }
    if violations.is_empty() {
        Ok(())
    } else {
        Err(ValidationFailure::OutOfRange {
            column: column.to_owned(),
            violations,
        }
        .into())
    }
}

/// Require the table's column-name set to equal `expected`, ignoring order.
///
/// # Errors
///
/// `Validation(SchemaMismatch)` with both sets, each sorted.
pub fn validate_schema(df: &DataFrame, expected: &[String]) -> Result<()> {
    let want: BTreeSet<&str> = expected.iter().map(String::as_str).collect();
    let names = column_names(df);
    let have: BTreeSet<&str> = names.iter().map(String::as_str).collect();
    if want == have {
        return Ok(());
    }
    Err(ValidationFailure::SchemaMismatch {
        expected: want.into_iter().map(str::to_owned).collect(),
        actual: have.into_iter().map(str::to_owned).collect(),
    }
    .into())
}

/// Require every distinct present value of `column` to be in `allowed`.
/// Values compare by their text form; numeric cells also match any allowed
/// entry that parses to the same number, so `1.0` and `"1"` agree.
///
/// # Errors
///
/// `ColumnNotFound`, or `Validation(DisallowedValues)` listing every
/// offending value once, sorted.
pub fn validate_allowed_values(df: &DataFrame, column: &str, allowed: &[String]) -> Result<()> {
    require_column(df, column)?;
    let allowed_numbers: Vec<f64> = allowed
        .iter()
        .filter_map(|a| a.trim().parse::<f64>().ok())
        .collect();
    let allowed: HashSet<&str> = allowed.iter().map(String::as_str).collect();
    let disallowed: BTreeSet<String> = column_values(df.column(column)?)
        .into_iter()
        .filter(|v| !v.is_missing())
        .filter(|v| {
            let numeric_match = matches!(v, Value::Int(_) | Value::Float(_))
                && v.as_f64().is_some_and(|n| allowed_numbers.contains(&n));
            !numeric_match && !allowed.contains(v.to_string().as_str())
        })
        .map(|v| v.to_string())
        .collect();

    if disallowed.is_empty() {
        Ok(())
    } else {
        Err(ValidationFailure::DisallowedValues {
            column: column.to_owned(),
            values: disallowed.into_iter().collect(),
        }
        .into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    fn people() -> DataFrame {
        df!(
            "id" => [1i64, 2, 3, 3],
            "age" => [Some(30i64), None, Some(17), Some(70)],
            "name" => ["Ann", "Ben", "Cy", "Cy"]
        )
        .expect("fixture frame")
    }

    #[test]
    fn test_check_missing_values() {
        let counts = check_missing_values(&people());
        assert_eq!(
            counts,
            vec![("id".to_owned(), 0), ("age".to_owned(), 1), ("name".to_owned(), 0)]
        );
    }

    #[test]
    fn test_validate_no_missing() -> Result<()> {
        let df = people();
        validate_no_missing(&df, Some(&["id".to_owned(), "name".to_owned()]))?;
        match validate_no_missing(&df, None).unwrap_err() {
            PrepError::Validation(ValidationFailure::MissingValues { counts }) => {
                assert_eq!(counts, vec![("age".to_owned(), 1)]);
            }
            other => panic!("unexpected {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn test_validate_column_types_reports_all() -> Result<()> {
        let df = people();
        validate_column_types(
            &df,
            &[
                ("id".to_owned(), "int".to_owned()),
                ("name".to_owned(), "str".to_owned()),
                ("age".to_owned(), "numeric".to_owned()),
            ],
        )?;
        let err = validate_column_types(
            &df,
            &[
                ("id".to_owned(), "float".to_owned()),
                ("name".to_owned(), "int64".to_owned()),
            ],
        )
        .unwrap_err();
        match err {
            PrepError::TypeMismatch { mismatches } => assert_eq!(mismatches.len(), 2),
            other => panic!("unexpected {other:?}"),
        }
        assert!(
            matches!(
                validate_column_types(&df, &[("zip".to_owned(), "int".to_owned())]),
                Err(PrepError::ColumnNotFound { .. })
            ),
            "absent column"
        );
        Ok(())
    }

    #[test]
    fn test_validate_unique() -> Result<()> {
        let df = people();
        validate_unique(&df, &["id".to_owned(), "age".to_owned()])?;
        match validate_unique(&df, &["id".to_owned(), "name".to_owned()]).unwrap_err() {
            PrepError::Validation(ValidationFailure::Duplicates { duplicate_rows, .. }) => {
                assert_eq!(duplicate_rows, 1);
            }
            other => panic!("unexpected {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn test_validate_value_ranges_names_bound() -> Result<()> {
        let df = people();
        validate_value_ranges(&df, "age", Some(0.0), None)?;
        match validate_value_ranges(&df, "age", Some(18.0), Some(65.0)).unwrap_err() {
            PrepError::Validation(ValidationFailure::OutOfRange { violations, .. }) => {
                assert_eq!(
                    violations,
                    vec![(RangeBound::Min, 18.0, 1), (RangeBound::Max, 65.0, 1)]
                );
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(validate_value_ranges(&df, "name", Some(0.0), None).is_err(), "text column");
        Ok(())
    }

    #[test]
    fn test_validate_schema_reports_both_sets() {
        let df = people();
        let err = validate_schema(&df, &["id".to_owned(), "age".to_owned()]).unwrap_err();
        match &err {
            PrepError::Validation(ValidationFailure::SchemaMismatch { expected, actual }) => {
                assert_eq!(expected, &vec!["age", "id"]);
                assert_eq!(actual, &vec!["age", "id", "name"]);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(
            validate_schema(&df, &["name".to_owned(), "id".to_owned(), "age".to_owned()]).is_ok(),
            "order does not matter"
        );
    }

    #[test]
    fn test_validate_allowed_values() -> Result<()> {
        let df = people();
        validate_allowed_values(&df, "name", &["Ann".into(), "Ben".into(), "Cy".into()])?;
        match validate_allowed_values(&df, "name", &["Ann".into()]).unwrap_err() {
            PrepError::Validation(ValidationFailure::DisallowedValues { values, .. }) => {
                assert_eq!(values, vec!["Ben", "Cy"]);
            }
            other => panic!("unexpected {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn test_allowed_values_compare_numbers_by_value() -> Result<()> {
        let df = df!("grade" => [1.0, 2.0, 2.5], "level" => [1i64, 2, 3])?;
        validate_allowed_values(&df, "grade", &["1.0".into(), "2".into(), "2.50".into()])?;
        validate_allowed_values(&df, "level", &["1.0".into(), "2".into(), "3".into()])?;
        match validate_allowed_values(&df, "grade", &["1".into(), "2".into()]).unwrap_err() {
            PrepError::Validation(ValidationFailure::DisallowedValues { values, .. }) => {
                assert_eq!(values, vec!["2.5"]);
            }
            other => panic!("unexpected {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn test_nan_counts_as_missing() -> Result<()> {
        let df = df!("v" => [f64::NAN, 1.0])?;
        assert_eq!(check_missing_values(&df), vec![("v".to_owned(), 1)]);
        assert!(validate_no_missing(&df, None).is_err(), "NaN is missing");
        Ok(())
    }
}
