//! Writing tables to delimited text and `.npy` numeric arrays.

use crate::error::{PrepError, Result, ResultExt as _, TypeMismatch};
use crate::loader::separator_byte;
use crate::processor::{is_numeric_like, select_columns};
use crate::table::dtype_name;
use ndarray::Array2;
use ndarray_npy::write_npy;
use polars::prelude::*;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct CsvExportOptions {
    pub separator: char,
    /// Prepend the ordinal row label as an unnamed first column.
    pub include_row_labels: bool,
    /// Subset and order of columns to write; all columns when `None`.
    pub columns: Option<Vec<String>>,
    pub overwrite: bool,
}

impl Default for CsvExportOptions {
    fn default() -> Self {
        Self {
            separator: ',',
            include_row_labels: false,
            columns: None,
            overwrite: false,
        }
    }
}

impl CsvExportOptions {
    pub fn with_separator(mut self, separator: char) -> Self {
        self.separator = separator;
        self
    }

    pub fn with_row_labels(mut self, include: bool) -> Self {
        self.include_row_labels = include;
        self
    }

    pub fn with_columns(mut self, columns: Vec<String>) -> Self {
        self.columns = Some(columns);
        self
    }

    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }
}

/// Checks shared by every export: rows present, columns known, destination free.
fn prepare(df: &DataFrame, path: &Path, columns: Option<&[String]>, overwrite: bool) -> Result<DataFrame> {
    if df.height() == 0 {
        return Err(PrepError::EmptyTable);
    }
    let subset = match columns {
        Some(names) => select_columns(df, names)?,
        None => df.clone(),
    };
    if path.exists() && !overwrite {
        return Err(PrepError::AlreadyExists {
            path: path.to_path_buf(),
        });
    }
    Ok(subset)
}

/// Write `df` as delimited text with a header row. Missing cells are empty.
///
/// # Errors
///
/// `EmptyTable` for a zero-row table, `ColumnNotFound` for unknown subset
/// columns, `AlreadyExists` when `path` exists and overwrite is off, `Io` on
/// write failure.
pub fn export_csv(df: &DataFrame, path: &Path, opts: &CsvExportOptions) -> Result<()> {
    let mut out = prepare(df, path, opts.columns.as_deref(), opts.overwrite)?;
    if opts.include_row_labels {
        out = out.with_row_index("".into(), None)?;
    }

    let file = File::create(path).context(format!("Failed to create {}", path.display()))?;
    CsvWriter::new(BufWriter::new(file))
        .include_header(true)
        .with_separator(separator_byte(opts.separator)?)
        .with_null_value(String::new())
        .finish(&mut out)?;

    tracing::info!(
        "Exported {} rows x {} columns to {}",
        out.height(),
        out.width(),
        path.display()
    );
    Ok(())
}

/// Dense row-major `f64` matrix of `df`. Booleans become 0/1 and missing
/// cells NaN.
///
/// # Errors
///
/// `TypeMismatch` listing every non-numeric column.
pub fn to_array(df: &DataFrame) -> Result<Array2<f64>> {
    let mismatches: Vec<TypeMismatch> = df
        .get_columns()
        .iter()
        .filter(|c| !is_numeric_like(c.dtype()))
        .map(|c| TypeMismatch {
            column: c.name().to_string(),
            expected: "numeric".to_owned(),
            actual: dtype_name(c.dtype()),
        })
        .collect();
    if !mismatches.is_empty() {
        return Err(PrepError::TypeMismatch { mismatches });
    }

    let mut data: Vec<Vec<f64>> = Vec::with_capacity(df.width());
    for column in df.get_columns() {
        let as_f64 = column.cast(&DataType::Float64)?;
        data.push(
            as_f64
                .f64()?
                .into_iter()
                .map(|v| v.unwrap_or(f64::NAN))
                .collect(),
        );
    }
    Ok(Array2::from_shape_fn((df.height(), df.width()), |(r, c)| {
        data[c][r]
    }))
}

/// Write `df` (or the listed `columns`, in order) as a C-ordered `<f8`
/// `.npy` array of shape `(rows, columns)`.
///
/// # Errors
///
/// The failure modes of [`export_csv`], plus `InvalidArgument` when no
/// columns remain and `TypeMismatch` for non-numeric columns.
pub fn export_array(
    df: &DataFrame,
    path: &Path,
    columns: Option<&[String]>,
    overwrite: bool,
) -> Result<()> {
    let subset = prepare(df, path, columns, overwrite)?;
    if subset.width() == 0 {
        return Err(PrepError::InvalidArgument(
            "no columns to export".to_owned(),
        ));
    }
    let array = to_array(&subset)?;

    write_npy(path, &array)
        .map_err(|e| PrepError::Other(format!("Failed to write {}: {e}", path.display())))?;

    tracing::info!(
        "Exported {}x{} array to {}",
        array.nrows(),
        array.ncols(),
        path.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    fn scores() -> DataFrame {
        df!(
            "id" => [1i64, 2, 3],
            "score" => [Some(0.5), None, Some(2.0)],
            "passed" => [true, false, true]
        )
        .expect("fixture frame")
    }

    #[test]
    fn test_export_csv_with_options() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("out.csv");
        let opts = CsvExportOptions::default()
            .with_separator(';')
            .with_columns(vec!["score".to_owned(), "id".to_owned()]);
        export_csv(&scores(), &path, &opts)?;

        let text = std::fs::read_to_string(&path)?;
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "score;id");
        assert_eq!(lines[1], "0.5;1");
        assert_eq!(lines[2], ";2", "missing score is written empty");
        Ok(())
    }

    #[test]
    fn test_export_csv_row_labels() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("labels.csv");
        export_csv(&scores(), &path, &CsvExportOptions::default().with_row_labels(true))?;
        let text = std::fs::read_to_string(&path)?;
        assert!(text.starts_with("\"\",id,score,passed\n0,1,"), "{text}");
        Ok(())
    }

    #[test]
    fn test_export_refuses_existing_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("taken.csv");
        std::fs::write(&path, "old")?;

        let err = export_csv(&scores(), &path, &CsvExportOptions::default()).unwrap_err();
        assert!(matches!(err, PrepError::AlreadyExists { .. }), "got {err:?}");
        assert_eq!(std::fs::read_to_string(&path)?, "old");

        export_csv(&scores(), &path, &CsvExportOptions::default().overwrite(true))?;
        assert!(std::fs::read_to_string(&path)?.starts_with("id,score,passed"), "replaced");
        Ok(())
    }

    #[test]
    fn test_export_empty_and_unknown_columns() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("x.csv");
        let empty = scores().head(Some(0));
        assert!(matches!(
            export_csv(&empty, &path, &CsvExportOptions::default()),
            Err(PrepError::EmptyTable)
        ), "zero rows");
        let opts = CsvExportOptions::default().with_columns(vec!["nope".to_owned()]);
        assert!(matches!(
            export_csv(&scores(), &path, &opts),
            Err(PrepError::ColumnNotFound { .. })
        ), "unknown column");
        Ok(())
    }

    #[test]
    fn test_npy_layout() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("m.npy");
        export_array(&scores(), &path, None, false)?;

        let bytes = std::fs::read(&path)?;
        assert_eq!(&bytes[..6], b"\x93NUMPY");
        let body_start = bytes.len() - 9 * 8;
        let header = String::from_utf8_lossy(&bytes[..body_start]);
        assert!(header.contains("'<f8'") && header.contains("(3, 3)"), "{header}");

        let body: Vec<f64> = bytes[body_start..]
            .chunks_exact(8)
            .map(|b| f64::from_le_bytes(b.try_into().expect("8-byte chunk")))
            .collect();
        assert_eq!(body.len(), 9);
        assert_eq!(&body[..3], &[1.0, 0.5, 1.0]);
        assert!(body[4].is_nan(), "missing becomes NaN");
        Ok(())
    }

    #[test]
    fn test_npy_rejects_text() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let df = df!("a" => [1i64], "b" => ["x"], "c" => ["y"])?;
        match export_array(&df, &dir.path().join("t.npy"), None, false).unwrap_err() {
            PrepError::TypeMismatch { mismatches } => assert_eq!(mismatches.len(), 2),
            other => panic!("unexpected {other:?}"),
        }
        Ok(())
    }
}
