//! Diagnostic quality report.

use super::count_duplicate_rows;
use crate::table::{column_names, dtype_name, missing_count};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnQuality {
    pub name: String,
    pub dtype: String,
    pub missing_count: usize,
    /// Share of missing cells, in percent, rounded to two decimals.
    pub missing_percent: f64,
    /// Distinct present values; missing is not counted.
    pub distinct_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub row_count: usize,
    pub column_count: usize,
    pub columns: Vec<ColumnQuality>,
    /// Rows identical to an earlier row across every column.
    pub duplicate_row_count: usize,
    /// Columns with at most one distinct present value.
    pub constant_columns: Vec<String>,
}

impl QualityReport {
    pub fn column(&self, name: &str) -> Option<&ColumnQuality> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn to_json(&self) -> crate::error::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Summarise shape, missingness, dtypes, cardinality and duplication.
/// Never fails; columns whose distinct count cannot be computed report 0.
pub fn data_quality_report(df: &DataFrame) -> QualityReport {
    let rows = df.height();
    let cleaned = df
        .clone()
        .lazy()
        .fill_nan(lit(NULL))
        .collect()
        .unwrap_or_else(|_| df.clone());
    let columns: Vec<ColumnQuality> = cleaned
        .get_columns()
        .iter()
        .map(|column| {
            let missing_count = missing_count(column);
            let missing_percent = if rows == 0 {
                0.0
            } else {
                round2(missing_count as f64 / rows as f64 * 100.0)
            };
            let distinct_count = column
                .as_materialized_series()
                .drop_nulls()
                .n_unique()
                .unwrap_or(0);
            ColumnQuality {
                name: column.name().to_string(),
                dtype: dtype_name(column.dtype()),
                missing_count,
                missing_percent,
                distinct_count,
            }
        })
        .collect();

    let constant_columns = columns
        .iter()
        .filter(|c| c.distinct_count <= 1)
        .map(|c| c.name.clone())
        .collect();

    let duplicate_row_count = count_duplicate_rows(df, &column_names(df)).unwrap_or_else(|err| {
        tracing::warn!("Duplicate scan failed: {}", err);
        0
    });

    QualityReport {
        row_count: rows,
        column_count: df.width(),
        columns,
        duplicate_row_count,
        constant_columns,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[test]
    fn test_quality_report() -> Result<()> {
        let df = df!(
            "id" => [1i64, 2, 3],
            "flag" => ["y", "y", "y"],
            "score" => [Some(1.5), None, None]
        )?;
        let report = data_quality_report(&df);
        assert_eq!((report.row_count, report.column_count), (3, 3));
        assert_eq!(report.duplicate_row_count, 0);
        assert_eq!(report.constant_columns, vec!["flag", "score"]);

        let score = report.column("score").expect("score column reported");
        assert_eq!(score.missing_count, 2);
        assert!((score.missing_percent - 66.67).abs() < 1e-9, "{}", score.missing_percent);
        assert_eq!(score.dtype, "float64");
        assert_eq!(report.column("id").map(|c| c.distinct_count), Some(3));
        Ok(())
    }

    #[test]
    fn test_nan_reported_as_missing() -> Result<()> {
        let df = df!("v" => [f64::NAN, 1.0, 1.0, 2.0])?;
        let v = data_quality_report(&df).columns.remove(0);
        assert_eq!(v.missing_count, 1);
        assert_eq!(v.distinct_count, 2);
        Ok(())
    }

    #[test]
    fn test_duplicate_rows_counted() -> Result<()> {
        let df = df!("a" => [1i64, 1, 2], "b" => ["x", "x", "y"])?;
        assert_eq!(data_quality_report(&df).duplicate_row_count, 1);
        Ok(())
    }

    #[test]
    fn test_report_is_json() -> Result<()> {
        let df = df!("a" => [1i64])?;
        let json = data_quality_report(&df).to_json()?;
        assert!(json.contains("\"duplicate_row_count\": 0"), "{json}");
        Ok(())
    }
}
