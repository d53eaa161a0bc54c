//! Centralized error handling for tabprep.
//!
//! Every fallible operation in the library returns [`Result`], whose error is
//! the single [`PrepError`] enum. Variants carry the complete offending detail
//! (every missing column, every type mismatch, every disallowed value) so a
//! front-end can render the failure without going back to the table.
//!
//! ```
//! use tabprep::error::{PrepError, ValidationFailure};
//!
//! fn describe(err: &PrepError) -> String {
//!     match err {
//!         PrepError::ColumnNotFound { missing } => format!("unknown: {}", missing.join(", ")),
//!         PrepError::Validation(ValidationFailure::SchemaMismatch { .. }) => "bad schema".to_owned(),
//!         other => other.to_string(),
//!     }
//! }
//! # let _ = describe(&PrepError::EmptyTable);
//! ```
//!
//! Foreign errors convert through `From`, so `?` works on I/O, polars and JSON
//! results. [`ResultExt::context`] prefixes a message when the raw error would
//! be too terse on its own.

use polars::error::PolarsError;
use std::fmt;
use std::path::PathBuf;

/// Main error type for tabprep operations.
#[derive(Debug)]
pub enum PrepError {
    /// Input path does not resolve to a file.
    NotFound { path: PathBuf },

    /// A loaded table turned out to have zero rows.
    EmptyData(String),

    /// An operation that needs rows (export) was given an empty table.
    EmptyTable,

    /// The byte stream is not valid in the requested encoding.
    Decode { encoding: String, detail: String },

    /// Structurally malformed delimited input.
    Parse(String),

    /// One or more referenced columns are absent. Always the full set.
    ColumnNotFound { missing: Vec<String> },

    /// Out-of-range or shape-mismatched parameter.
    InvalidArgument(String),

    /// Column dtypes differ from expectations. Always every mismatch.
    TypeMismatch { mismatches: Vec<TypeMismatch> },

    /// A validator predicate failed.
    Validation(ValidationFailure),

    /// Export destination exists and overwrite was not requested.
    AlreadyExists { path: PathBuf },

    /// Unknown operation, mode, function or frequency tag.
    UnsupportedOperation { kind: &'static str, tag: String },

    /// I/O errors
    Io(std::io::Error),

    /// Errors raised by the column engine
    Data(String),

    /// Settings file errors
    Config(String),

    /// Generic error with context
    Other(String),
}

/// One column whose dtype did not match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeMismatch {
    pub column: String,
    pub expected: String,
    pub actual: String,
}

/// Which bound of a range check was violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeBound {
    Min,
    Max,
}

impl RangeBound {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Min => "min",
            Self::Max => "max",
        }
    }
}

/// Structured detail of a failed validation.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationFailure {
    /// Columns holding missing values, with their counts.
    MissingValues { counts: Vec<(String, usize)> },

    /// Rows whose key tuple over `columns` repeats an earlier row.
    Duplicates {
        columns: Vec<String>,
        duplicate_rows: usize,
    },

    /// Values outside `[min, max]`. `violations` lists each violated bound
    /// with its limit and the number of offending values.
    OutOfRange {
        column: String,
        violations: Vec<(RangeBound, f64, usize)>,
    },

    /// Column-name set differs from the expected set.
    SchemaMismatch {
        expected: Vec<String>,
        actual: Vec<String>,
    },

    /// Distinct values not in the allowed set, sorted.
    DisallowedValues { column: String, values: Vec<String> },
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingValues { counts } => {
                let parts: Vec<String> = counts.iter().map(|(c, n)| format!("{c}: {n}")).collect();
                write!(f, "missing values found ({})", parts.join(", "))
            }
            Self::Duplicates {
                columns,
                duplicate_rows,
            } => write!(
                f,
                "{duplicate_rows} duplicate row(s) over columns [{}]",
                columns.join(", ")
            ),
            Self::OutOfRange { column, violations } => {
                let parts: Vec<String> = violations
                    .iter()
                    .map(|(bound, limit, count)| {
                        format!("{count} value(s) violate {} = {limit}", bound.as_str())
                    })
                    .collect();
                write!(f, "column '{column}' out of range: {}", parts.join("; "))
            }
            Self::SchemaMismatch { expected, actual } => write!(
                f,
                "schema mismatch: expected [{}], actual [{}]",
                expected.join(", "),
                actual.join(", ")
            ),
            Self::DisallowedValues { column, values } => write!(
                f,
                "column '{column}' contains disallowed values: [{}]",
                values.join(", ")
            ),
        }
    }
}

impl fmt::Display for PrepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { path } => write!(f, "File not found: {}", path.display()),
            Self::EmptyData(msg) => write!(f, "No data: {msg}"),
            Self::EmptyTable => write!(f, "Cannot export an empty table"),
            Self::Decode { encoding, detail } => {
                write!(f, "Could not decode input as {encoding}: {detail}")
            }
            Self::Parse(msg) => write!(f, "Parse error: {msg}"),
            Self::ColumnNotFound { missing } => {
                write!(f, "Columns not found: [{}]", missing.join(", "))
            }
            Self::InvalidArgument(msg) => write!(f, "Invalid argument: {msg}"),
            Self::TypeMismatch { mismatches } => {
                let parts: Vec<String> = mismatches
                    .iter()
                    .map(|m| format!("'{}' expected {} got {}", m.column, m.expected, m.actual))
                    .collect();
                write!(f, "Type mismatch: {}", parts.join("; "))
            }
            Self::Validation(failure) => write!(f, "Validation failed: {failure}"),
            Self::AlreadyExists { path } => {
                write!(f, "Destination already exists: {}", path.display())
            }
            Self::UnsupportedOperation { kind, tag } => write!(f, "Unsupported {kind}: '{tag}'"),
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Data(msg) => write!(f, "Data processing error: {msg}"),
            Self::Config(msg) => write!(f, "Configuration error: {msg}"),
            Self::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for PrepError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for PrepError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<PolarsError> for PrepError {
    fn from(err: PolarsError) -> Self {
        match err {
            PolarsError::ColumnNotFound(msg) => Self::ColumnNotFound {
                missing: vec![msg.to_string()],
            },
            PolarsError::NoData(msg) => Self::EmptyData(msg.to_string()),
            other => Self::Data(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for PrepError {
    fn from(err: serde_json::Error) -> Self {
        Self::Config(format!("JSON error: {err}"))
    }
}

impl From<ValidationFailure> for PrepError {
    fn from(failure: ValidationFailure) -> Self {
        Self::Validation(failure)
    }
}

/// Result type alias for tabprep operations.
pub type Result<T> = std::result::Result<T, PrepError>;

/// Extension trait to add context to results.
pub trait ResultExt<T> {
    /// Add context to an error.
    fn context(self, msg: impl Into<String>) -> Result<T>;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<PrepError>,
{
    fn context(self, msg: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let err: PrepError = e.into();
            PrepError::Other(format!("{}: {}", msg.into(), err))
        })
    }
}

/// Collect every name in `wanted` that `present` does not contain, keeping
/// the caller's order and dropping repeats.
pub(crate) fn missing_columns<'a, I>(present: &[String], wanted: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a String>,
{
    let mut missing: Vec<String> = Vec::new();
    for name in wanted {
        if !present.contains(name) && !missing.contains(name) {
            missing.push(name.clone());
        }
    }
    missing
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PrepError::ColumnNotFound {
            missing: vec!["x".to_owned(), "y".to_owned()],
        };
        assert_eq!(err.to_string(), "Columns not found: [x, y]");
    }

    #[test]
    fn test_validation_display_names_both_sets() {
        let err = PrepError::Validation(ValidationFailure::SchemaMismatch {
            expected: vec!["age".to_owned(), "id".to_owned()],
            actual: vec!["age".to_owned(), "id".to_owned(), "name".to_owned()],
        });
        let msg = err.to_string();
        assert!(msg.contains("expected [age, id]"), "got: {msg}");
        assert!(msg.contains("actual [age, id, name]"), "got: {msg}");
    }

    #[test]
    fn test_result_context() {
        let result: std::result::Result<(), std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "file.txt",
        ));

        let result: Result<()> = result.context("Failed to read settings");
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Failed to read settings"),
            "context prefix should be kept"
        );
    }

    #[test]
    fn test_missing_columns_keeps_order_and_dedups() {
        let present = vec!["a".to_owned(), "b".to_owned()];
        let wanted = vec!["z".to_owned(), "a".to_owned(), "y".to_owned(), "z".to_owned()];
        assert_eq!(missing_columns(&present, &wanted), vec!["z", "y"]);
    }
}
