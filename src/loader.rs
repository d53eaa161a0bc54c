//! Delimited-text loading, previews and cheap pre-flight checks.

use crate::error::{PrepError, Result};
use crate::table::missing_count;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::io::{BufRead as _, BufReader, Cursor};
use std::path::Path;

/// Strings read as missing in addition to empty fields.
pub const DEFAULT_NA_TOKENS: &[&str] = &["NA", "N/A", "NaN", "nan", "null", "NULL"];

/// How many mismatching rows a format error spells out before summarising.
const MAX_REPORTED_ROWS: usize = 20;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadOptions {
    /// Single ASCII field separator.
    pub separator: char,
    /// First line holds column names. When false, columns are named `0, 1, 2, …`.
    pub has_header: bool,
    pub encoding: String,
    /// Extra tokens treated as missing on top of [`DEFAULT_NA_TOKENS`].
    pub na_tokens: Vec<String>,
    /// Reject ragged rows with [`PrepError::Parse`] before parsing. When
    /// off, short rows are padded with missing cells and long rows are
    /// truncated to the header width.
    pub strict: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            separator: ',',
            has_header: true,
            encoding: "utf-8".to_owned(),
            na_tokens: Vec::new(),
            strict: false,
        }
    }
}

impl LoadOptions {
    pub fn with_separator(mut self, separator: char) -> Self {
        self.separator = separator;
        self
    }

    pub fn with_header(mut self, has_header: bool) -> Self {
        self.has_header = has_header;
        self
    }

    pub fn with_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding = encoding.into();
        self
    }

    pub fn with_na_tokens<I, S>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.na_tokens = tokens.into_iter().map(Into::into).collect();
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }
}

/// Shape and per-column missing counts of a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSummary {
    pub row_count: usize,
    pub column_count: usize,
    pub missing: Vec<(String, usize)>,
}

pub(crate) fn separator_byte(separator: char) -> Result<u8> {
    if separator.is_ascii() && separator != '"' && separator != '\n' && separator != '\r' {
        Ok(separator as u8)
    } else {
        Err(PrepError::InvalidArgument(format!(
            "separator must be a single ASCII character other than quote or newline, got {separator:?}"
        )))
    }
}

/// Load a delimited text file into a table.
///
/// # Errors
///
/// `NotFound` if `path` is not a file, `Decode` if the bytes are not valid in
/// `opts.encoding`, `Parse` on malformed structure (ragged rows when strict),
/// `EmptyData` if the result has no rows.
pub fn load(path: &Path, opts: &LoadOptions) -> Result<DataFrame> {
    if !path.is_file() {
        return Err(PrepError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let sep = separator_byte(opts.separator)?;

    let bytes = std::fs::read(path)?;
    let text = decode(&bytes, &opts.encoding)?;
    if text.trim().is_empty() {
        return Err(PrepError::EmptyData(format!("{} is empty", path.display())));
    }

    if opts.strict {
        let mismatches = scan_field_counts(text.lines().map(str::as_bytes), sep, None)?;
        if !mismatches.is_empty() {
            return Err(PrepError::Parse(describe_mismatches(&mismatches)));
        }
    }

    let mut na: Vec<PlSmallStr> = DEFAULT_NA_TOKENS.iter().map(|t| (*t).into()).collect();
    na.extend(opts.na_tokens.iter().map(|t| PlSmallStr::from(t.as_str())));

    let parse_options = CsvParseOptions::default()
        .with_separator(sep)
        .with_truncate_ragged_lines(!opts.strict)
        .with_null_values(Some(NullValues::AllColumns(na)));

    let mut df = CsvReadOptions::default()
        .with_has_header(opts.has_header)
        .with_infer_schema_length(Some(10_000))
        .with_parse_options(parse_options)
        .into_reader_with_file_handle(Cursor::new(text.into_bytes()))
        .finish()
        .map_err(|e| match e {
            PolarsError::NoData(msg) => PrepError::EmptyData(msg.to_string()),
            other => PrepError::Parse(other.to_string()),
        })?;

    if !opts.has_header {
        let names: Vec<String> = (0..df.width()).map(|i| i.to_string()).collect();
        df.set_column_names(names)?;
    }

    if df.height() == 0 {
        return Err(PrepError::EmptyData(format!(
            "{} contains no data rows",
            path.display()
        )));
    }

    tracing::info!(
        "Loaded {} rows x {} columns from {}",
        df.height(),
        df.width(),
        path.display()
    );
    Ok(df)
}

/// Decode raw bytes with a named encoding. A leading byte-order mark is dropped.
pub fn decode(bytes: &[u8], encoding: &str) -> Result<String> {
    let normalized = encoding.trim().to_lowercase().replace('_', "-");
    let decode_err = |detail: String| PrepError::Decode {
        encoding: encoding.to_owned(),
        detail,
    };

    match normalized.as_str() {
        "utf-8" | "utf8" | "utf-8-sig" => {
            let body = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes);
            String::from_utf8(body.to_vec()).map_err(|e| decode_err(e.to_string()))
        }
        "utf-16" | "utf16" => match bytes {
            [0xFE, 0xFF, rest @ ..] => decode_utf16(rest, false).map_err(decode_err),
            [0xFF, 0xFE, rest @ ..] => decode_utf16(rest, true).map_err(decode_err),
            _ => decode_utf16(bytes, true).map_err(decode_err),
        },
        "utf-16le" => {
            let body = bytes.strip_prefix(&[0xFF, 0xFE]).unwrap_or(bytes);
            decode_utf16(body, true).map_err(decode_err)
        }
        "utf-16be" => {
            let body = bytes.strip_prefix(&[0xFE, 0xFF]).unwrap_or(bytes);
            decode_utf16(body, false).map_err(decode_err)
        }
        "latin-1" | "latin1" | "iso-8859-1" => Ok(bytes.iter().map(|&b| char::from(b)).collect()),
        "ascii" | "us-ascii" => match bytes.iter().position(|b| !b.is_ascii()) {
            Some(pos) => Err(decode_err(format!("non-ASCII byte at offset {pos}"))),
            None => Ok(bytes.iter().map(|&b| char::from(b)).collect()),
        },
        _ => Err(PrepError::UnsupportedOperation {
            kind: "encoding",
            tag: encoding.to_owned(),
        }),
    }
}

fn decode_utf16(bytes: &[u8], little_endian: bool) -> std::result::Result<String, String> {
    if bytes.len() % 2 != 0 {
        return Err(format!("odd byte length {} for UTF-16", bytes.len()));
    }
    let units = bytes.chunks_exact(2).map(|pair| {
        let arr = [pair[0], pair[1]];
        if little_endian {
            u16::from_le_bytes(arr)
        } else {
            u16::from_be_bytes(arr)
        }
    });
    char::decode_utf16(units)
        .collect::<std::result::Result<String, _>>()
        .map_err(|e| e.to_string())
}

/// First or last `row_count` rows.
///
/// # Errors
///
/// `InvalidArgument` when `row_count` is zero.
pub fn preview(df: &DataFrame, row_count: usize, from_tail: bool) -> Result<DataFrame> {
    if row_count == 0 {
        return Err(PrepError::InvalidArgument(
            "preview row count must be greater than 0".to_owned(),
        ));
    }
    Ok(if from_tail {
        df.tail(Some(row_count))
    } else {
        df.head(Some(row_count))
    })
}

pub fn summary(df: &DataFrame) -> TableSummary {
    TableSummary {
        row_count: df.height(),
        column_count: df.width(),
        missing: missing_counts(df),
    }
}

/// Missing-cell count (null or NaN) of every column, in column order.
pub fn missing_counts(df: &DataFrame) -> Vec<(String, usize)> {
    df.get_columns()
        .iter()
        .map(|c| (c.name().to_string(), missing_count(c)))
        .collect()
}

/// Rename every column positionally.
///
/// # Errors
///
/// `InvalidArgument` when `names` does not have one entry per column or
/// repeats a name.
pub fn set_column_names(df: &DataFrame, names: &[String]) -> Result<DataFrame> {
    if names.len() != df.width() {
        return Err(PrepError::InvalidArgument(format!(
            "expected {} column names, got {}",
            df.width(),
            names.len()
        )));
    }
    let mut seen = std::collections::HashSet::new();
    if let Some(dup) = names.iter().find(|n| !seen.insert(n.as_str())) {
        return Err(PrepError::InvalidArgument(format!(
            "duplicate column name '{dup}'"
        )));
    }
    let mut out = df.clone();
    out.set_column_names(names.iter().map(String::as_str))?;
    Ok(out)
}

/// One row whose field count differs from the expectation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldCountMismatch {
    /// 1-based line number.
    pub line: usize,
    pub found: usize,
    pub expected: usize,
}

/// Check that every row of a delimited file has the same field count as its
/// header (or as `expected_columns`), without running the full parser.
///
/// Returns `Ok(true)` when every row matches.
///
/// # Errors
///
/// `NotFound` if the path is not a file, `EmptyData` when the file has no
/// lines, `InvalidArgument` describing every mismatching row otherwise.
pub fn validate_format(
    path: &Path,
    separator: char,
    expected_columns: Option<usize>,
) -> Result<bool> {
    if !path.is_file() {
        return Err(PrepError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let sep = separator_byte(separator)?;
    let reader = BufReader::new(std::fs::File::open(path)?);

    let mut lines = Vec::new();
    for line in reader.split(b'\n') {
        lines.push(line?);
    }
    if lines.iter().all(|l| l.trim_ascii().is_empty()) {
        return Err(PrepError::EmptyData(format!("{} is empty", path.display())));
    }

    let mismatches = scan_field_counts(lines.iter().map(Vec::as_slice), sep, expected_columns)?;
    if mismatches.is_empty() {
        tracing::debug!("Format check passed for {}", path.display());
        Ok(true)
    } else {
        Err(PrepError::InvalidArgument(describe_mismatches(&mismatches)))
    }
}

/// Field counts of every non-blank line against the first line's count (or
/// `expected`).
fn scan_field_counts<'a, I>(
    lines: I,
    sep: u8,
    expected: Option<usize>,
) -> Result<Vec<FieldCountMismatch>>
where
    I: IntoIterator<Item = &'a [u8]>,
{
    let mut target = expected;
    let mut mismatches = Vec::new();

    for (idx, raw) in lines.into_iter().enumerate() {
        let line = raw.strip_suffix(b"\r").unwrap_or(raw);
        if line.trim_ascii().is_empty() {
            continue;
        }
        let found = count_fields(line, sep);
        match target {
            None => target = Some(found),
            Some(want) if want != found => mismatches.push(FieldCountMismatch {
                line: idx + 1,
                found,
                expected: want,
            }),
            Some(_) => {}
        }
    }

    if target.is_none() {
        return Err(PrepError::EmptyData("no rows to check".to_owned()));
    }
    Ok(mismatches)
}

/// Count separator-delimited fields, ignoring separators inside double quotes.
fn count_fields(line: &[u8], sep: u8) -> usize {
    let mut in_quotes = false;
    let mut fields = 1;
    for &b in line {
        if b == b'"' {
            in_quotes = !in_quotes;
        } else if b == sep && !in_quotes {
            fields += 1;
        }
    }
    fields
}

fn describe_mismatches(mismatches: &[FieldCountMismatch]) -> String {
    let mut parts: Vec<String> = mismatches
        .iter()
        .take(MAX_REPORTED_ROWS)
        .map(|m| {
            format!(
                "line {} has {} fields, expected {}",
                m.line, m.found, m.expected
            )
        })
        .collect();
    if mismatches.len() > MAX_REPORTED_ROWS {
        parts.push(format!(
            "and {} more",
            mismatches.len() - MAX_REPORTED_ROWS
        ));
    }
    format!(
        "{} row(s) with inconsistent field count: {}",
        mismatches.len(),
        parts.join("; ")
    )
}
