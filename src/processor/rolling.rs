//! Trailing-window statistics.

use super::aggregate::AggFunc;
use super::require_numeric;
use crate::error::{PrepError, Result};
use crate::table::require_column;
use crate::value::column_values;
use polars::prelude::*;

/// Trailing-window statistic over `column`, aligned to row order.
///
/// Entry `i` covers rows `i + 1 - window ..= i`; the first `window - 1`
/// entries are missing. Missing cells inside a window are skipped, and a
/// window without enough present values (none, or fewer than two for
/// `std`/`var`) yields missing. The series is named
/// `<column>_rolling_<func>`.
///
/// # Errors
///
/// `InvalidArgument` for a zero window, `UnsupportedOperation` for a
/// function other than `mean`, `sum`, `min`, `max`, `std`, `var` and
/// `median`; `ColumnNotFound` and `TypeMismatch` as usual.
pub fn rolling_stat(df: &DataFrame, column: &str, window: usize, func: AggFunc) -> Result<Series> {
    if window == 0 {
        return Err(PrepError::InvalidArgument(
            "rolling window must be at least 1".to_owned(),
        ));
    }
    if !matches!(
        func,
        AggFunc::Mean | AggFunc::Sum | AggFunc::Min | AggFunc::Max | AggFunc::Std | AggFunc::Var | AggFunc::Median
    ) {
        return Err(PrepError::UnsupportedOperation {
            kind: "rolling statistic",
            tag: func.to_string(),
        });
    }
    require_column(df, column)?;
    require_numeric(df, [(column, func.as_str())])?;

    let values = column_values(df.column(column)?);
    let lead = (window - 1).min(values.len());
    let stats: Vec<Option<f64>> = std::iter::repeat_n(None, lead)
        .chain(values.windows(window).map(|w| func.reduce(w).as_f64()))
        .collect();

    Ok(Series::new(
        format!("{column}_rolling_{func}").into(),
        stats,
    ))
}

/// Store [`rolling_stat`] as a column, named `new_name` or the statistic's
/// default name.
///
/// # Errors
///
/// Those of [`rolling_stat`].
pub fn add_rolling_column(
    df: &DataFrame,
    column: &str,
    window: usize,
    func: AggFunc,
    new_name: Option<&str>,
) -> Result<DataFrame> {
    let mut stats = rolling_stat(df, column, window, func)?;
    if let Some(name) = new_name {
        stats.rename(name.into());
    }
    let mut out = df.clone();
    out.with_column(stats)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    fn stat(values: &[Option<f64>], window: usize, func: AggFunc) -> Result<Vec<Option<f64>>> {
        let df = df!("x" => values)?;
        let out = rolling_stat(&df, "x", window, func)?;
        Ok(out.f64()?.into_iter().collect())
    }

    #[test]
    fn test_rolling_mean() -> Result<()> {
        let out = stat(&[Some(1.0), Some(2.0), Some(3.0)], 2, AggFunc::Mean)?;
        assert_eq!(out, vec![None, Some(1.5), Some(2.5)]);
        Ok(())
    }

    #[test]
    fn test_rolling_skips_missing_inside_window() -> Result<()> {
        let out = stat(&[Some(1.0), None, Some(5.0), None, None], 2, AggFunc::Sum)?;
        assert_eq!(out, vec![None, Some(1.0), Some(5.0), Some(5.0), None]);
        Ok(())
    }

    #[test]
    fn test_rolling_std_needs_two_values() -> Result<()> {
        let out = stat(&[Some(2.0), Some(4.0), None], 2, AggFunc::Std)?;
        assert_eq!(out[0], None);
        assert!(out[1].is_some_and(|v| (v - 2f64.sqrt()).abs() < 1e-12), "{out:?}");
        assert_eq!(out[2], None, "a single value has no sample deviation");
        Ok(())
    }

    #[test]
    fn test_window_longer_than_table() -> Result<()> {
        let out = stat(&[Some(1.0), Some(2.0)], 5, AggFunc::Max)?;
        assert_eq!(out, vec![None, None]);
        Ok(())
    }

    #[test]
    fn test_rolling_name_and_errors() -> Result<()> {
        let df = df!("x" => [1i64, 2, 3], "s" => ["a", "b", "c"])?;
        assert_eq!(rolling_stat(&df, "x", 1, AggFunc::Sum)?.name().as_str(), "x_rolling_sum");
        assert!(rolling_stat(&df, "x", 0, AggFunc::Sum).is_err(), "zero window");
        assert!(
            matches!(
                rolling_stat(&df, "x", 2, AggFunc::Count),
                Err(PrepError::UnsupportedOperation { kind: "rolling statistic", .. })
            ),
            "count is not rolling"
        );
        assert!(rolling_stat(&df, "s", 2, AggFunc::Mean).is_err(), "text column");
        assert!(rolling_stat(&df, "nope", 2, AggFunc::Mean).is_err(), "absent column");
        Ok(())
    }

    #[test]
    fn test_add_rolling_column() -> Result<()> {
        let df = df!("x" => [1i64, 2, 3])?;
        let out = add_rolling_column(&df, "x", 2, AggFunc::Max, Some("peak"))?;
        let peak: Vec<Option<f64>> = out.column("peak")?.f64()?.into_iter().collect();
        assert_eq!(peak, vec![None, Some(2.0), Some(3.0)]);
        let named = add_rolling_column(&df, "x", 2, AggFunc::Mean, None)?;
        assert!(named.column("x_rolling_mean").is_ok(), "default name");
        Ok(())
    }
}
