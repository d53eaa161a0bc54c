//! Pure transformations over a table.
//!
//! Every function borrows the input frame and returns a new one; polars
//! shares column buffers between the two, so callers that need the old state
//! keep their own handle (see [`crate::session`]).

pub mod aggregate;
pub mod columns;
pub mod resample;
pub mod rolling;
pub mod rows;
pub mod text;

pub use aggregate::{AggFunc, group_and_aggregate};
pub use columns::{
    MathOp, add_column, apply_transformation, create_column_from_existing, drop_columns,
    drop_empty_columns, math_operation, rename_columns, select_columns,
};
pub use resample::{Frequency, resample_time_series};
pub use rolling::{add_rolling_column, rolling_stat};
pub use rows::{drop_rows_by_condition, drop_rows_by_index, filter_rows};
pub use text::{TextMatch, filter_text};

use crate::error::{PrepError, Result, TypeMismatch};
use crate::table::dtype_name;
use polars::prelude::*;

pub(crate) fn is_numeric_like(dtype: &DataType) -> bool {
    dtype.is_primitive_numeric() || dtype.is_bool()
}

/// Fail with every `(column, reason)` pair whose column is not numeric.
pub(crate) fn require_numeric<'a, I>(df: &DataFrame, columns: I) -> Result<()>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut mismatches: Vec<TypeMismatch> = Vec::new();
    for (name, reason) in columns {
        let column = df.column(name)?;
        if !is_numeric_like(column.dtype()) {
            mismatches.push(TypeMismatch {
                column: name.to_owned(),
                expected: format!("numeric ({reason})"),
                actual: dtype_name(column.dtype()),
            });
        }
    }
    if mismatches.is_empty() {
        Ok(())
    } else {
        Err(PrepError::TypeMismatch { mismatches })
    }
}
