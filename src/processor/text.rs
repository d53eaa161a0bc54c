//! Substring filtering on a column's text form.

use super::rows::retain_rows;
use crate::error::{PrepError, Result};
use crate::table::require_column;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum TextMatch {
    Contains,
    StartsWith,
    EndsWith,
}

impl TextMatch {
    pub fn matches(self, haystack: &str, pattern: &str) -> bool {
        match self {
            Self::Contains => haystack.contains(pattern),
            Self::StartsWith => haystack.starts_with(pattern),
            Self::EndsWith => haystack.ends_with(pattern),
        }
    }
}

impl FromStr for TextMatch {
    type Err = PrepError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "contains" => Ok(Self::Contains),
            "startswith" | "starts_with" => Ok(Self::StartsWith),
            "endswith" | "ends_with" => Ok(Self::EndsWith),
            _ => Err(PrepError::UnsupportedOperation {
                kind: "text match mode",
                tag: s.to_owned(),
            }),
        }
    }
}

impl TryFrom<String> for TextMatch {
    type Error = PrepError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

/// Keep rows whose stringified `column` value matches `pattern` under `mode`.
/// Missing values never match.
///
/// # Errors
///
/// `ColumnNotFound` when `column` is absent.
pub fn filter_text(
    df: &DataFrame,
    column: &str,
    mode: TextMatch,
    pattern: &str,
) -> Result<DataFrame> {
    require_column(df, column)?;
    let as_text = df.column(column)?.cast(&DataType::String)?;
    let matched: Vec<bool> = as_text
        .str()?
        .into_iter()
        .map(|v| v.is_some_and(|s| mode.matches(s, pattern)))
        .collect();
    let out = retain_rows(df, |i| matched[i])?;
    tracing::debug!(
        "Text filter {:?} '{}' on '{}' kept {} of {} rows",
        mode,
        pattern,
        column,
        out.height(),
        df.height()
    );
    Ok(out)
}
