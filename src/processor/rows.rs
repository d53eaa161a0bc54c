//! Row removal and selection.

use crate::error::{PrepError, Result};
use crate::value::RowView;
use polars::prelude::*;
use std::collections::BTreeSet;

/// Keep the rows for which `keep(row_index)` is true.
pub(crate) fn retain_rows<F>(df: &DataFrame, mut keep: F) -> Result<DataFrame>
where
    F: FnMut(usize) -> bool,
{
    let mask: BooleanChunked = (0..df.height()).map(&mut keep).collect();
    Ok(df.filter(&mask)?)
}

/// Remove rows by ordinal position.
///
/// # Errors
///
/// `InvalidArgument` listing every index outside the table.
pub fn drop_rows_by_index(df: &DataFrame, indices: &[usize]) -> Result<DataFrame> {
    let height = df.height();
    let drop: BTreeSet<usize> = indices.iter().copied().collect();
    let out_of_range: Vec<usize> = drop.iter().copied().filter(|&i| i >= height).collect();
    if !out_of_range.is_empty() {
        return Err(PrepError::InvalidArgument(format!(
            "row indices out of range for {height} rows: {out_of_range:?}"
        )));
    }
    tracing::debug!("Dropping {} rows by index", drop.len());
    retain_rows(df, |i| !drop.contains(&i))
}

/// Remove rows where `predicate` holds.
///
/// # Errors
///
/// Only on polars engine failures.
pub fn drop_rows_by_condition<F>(df: &DataFrame, predicate: F) -> Result<DataFrame>
where
    F: Fn(&RowView<'_>) -> bool,
{
    retain_rows(df, |i| !predicate(&RowView::new(df, i)))
}

/// Keep only rows where `predicate` holds.
///
/// # Errors
///
/// Only on polars engine failures.
pub fn filter_rows<F>(df: &DataFrame, predicate: F) -> Result<DataFrame>
where
    F: Fn(&RowView<'_>) -> bool,
{
    retain_rows(df, |i| predicate(&RowView::new(df, i)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use anyhow::Result;

    fn people() -> DataFrame {
        df!(
            "name" => ["Alice", "Bob", "Cara", "Dan"],
            "age" => [Some(30i64), Some(17), None, Some(45)]
        )
        .expect("fixture frame")
    }

    #[test]
    fn test_drop_rows_by_index() -> Result<()> {
        let out = drop_rows_by_index(&people(), &[0, 2, 2])?;
        let names: Vec<Option<&str>> = out.column("name")?.str()?.into_iter().collect();
        assert_eq!(names, vec![Some("Bob"), Some("Dan")]);
        Ok(())
    }

    #[test]
    fn test_drop_rows_by_index_out_of_range() {
        let err = drop_rows_by_index(&people(), &[1, 9, 4]).unwrap_err();
        assert!(
            matches!(err, PrepError::InvalidArgument(ref msg) if msg.contains("[4, 9]")),
            "got {err:?}"
        );
    }

    #[test]
    fn test_drop_rows_by_condition_skips_missing() -> Result<()> {
        let out = drop_rows_by_condition(&people(), |row| row.get("age").lt(18.0))?;
        assert_eq!(out.height(), 3, "the missing age is not below 18");
        Ok(())
    }

    #[test]
    fn test_filter_rows_is_inverse_selection() -> Result<()> {
        let pred = |row: &RowView<'_>| row.get("age").gt(20.0);
        let kept = filter_rows(&people(), pred)?;
        let dropped = drop_rows_by_condition(&people(), pred)?;
        assert_eq!(kept.height(), 2);
        assert_eq!(dropped.height(), 2);
        assert_eq!(
            RowView::new(&kept, 1).get("name"),
            Value::from("Dan"),
            "order is preserved"
        );
        Ok(())
    }
}
