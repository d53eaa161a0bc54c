//! Serializable processing recipes.
//!
//! A recipe is an ordered list of [`Step`]s stored as JSON, so a cleaning
//! sequence worked out interactively can be replayed on the next file:
//!
//! ```json
//! {
//!   "steps": [
//!     { "op": "drop_columns", "columns": ["notes"] },
//!     { "op": "math_operation", "col_a": "a", "col_b": "b", "operation": "diff", "new_name": "d" },
//!     { "op": "group_and_aggregate", "by": ["category"], "aggs": { "value": ["sum", "mean"] } }
//!   ]
//! }
//! ```
//!
//! Each step is deterministic: the same input table and parameters give the
//! same output.

use crate::error::{PrepError, Result, ResultExt as _};
use crate::processor::{self, AggFunc, Frequency, MathOp, TextMatch};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// One processing step, tagged by `"op"` in JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    DropColumns {
        columns: Vec<String>,
    },
    SelectColumns {
        columns: Vec<String>,
    },
    RenameColumns {
        mapping: HashMap<String, String>,
    },
    DropEmptyColumns,
    MathOperation {
        col_a: String,
        col_b: String,
        operation: MathOp,
        new_name: String,
    },
    GroupAndAggregate {
        by: Vec<String>,
        aggs: BTreeMap<String, Vec<AggFunc>>,
    },
    FilterText {
        column: String,
        mode: TextMatch,
        pattern: String,
    },
    Resample {
        datetime_column: String,
        frequency: Frequency,
        aggs: BTreeMap<String, AggFunc>,
    },
    Rolling {
        column: String,
        window: usize,
        func: AggFunc,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        new_name: Option<String>,
    },
    DropRowsByIndex {
        indices: Vec<usize>,
    },
}

impl Step {
    /// Every `"op"` tag a recipe may use.
    pub const NAMES: [&'static str; 10] = [
        "drop_columns",
        "select_columns",
        "rename_columns",
        "drop_empty_columns",
        "math_operation",
        "group_and_aggregate",
        "filter_text",
        "resample",
        "rolling",
        "drop_rows_by_index",
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::DropColumns { .. } => "drop_columns",
            Self::SelectColumns { .. } => "select_columns",
            Self::RenameColumns { .. } => "rename_columns",
            Self::DropEmptyColumns => "drop_empty_columns",
            Self::MathOperation { .. } => "math_operation",
            Self::GroupAndAggregate { .. } => "group_and_aggregate",
            Self::FilterText { .. } => "filter_text",
            Self::Resample { .. } => "resample",
            Self::Rolling { .. } => "rolling",
            Self::DropRowsByIndex { .. } => "drop_rows_by_index",
        }
    }

    /// Short human-readable summary.
    pub fn description(&self) -> String {
        match self {
            Self::DropColumns { columns } => format!("Drop {} column(s)", columns.len()),
            Self::SelectColumns { columns } => format!("Select {} column(s)", columns.len()),
            Self::RenameColumns { mapping } => format!("Rename {} column(s)", mapping.len()),
            Self::DropEmptyColumns => "Drop empty columns".to_owned(),
            Self::MathOperation {
                col_a,
                col_b,
                operation,
                new_name,
            } => format!("{new_name} = {operation}({col_a}, {col_b})"),
            Self::GroupAndAggregate { by, aggs } => {
                format!("Group by [{}], aggregate {} column(s)", by.join(", "), aggs.len())
            }
            Self::FilterText {
                column,
                mode,
                pattern,
            } => format!("Keep rows where '{column}' {mode:?} '{pattern}'"),
            Self::Resample {
                datetime_column,
                frequency,
                ..
            } => format!("Resample '{datetime_column}' by {frequency}"),
            Self::Rolling {
                column,
                window,
                func,
                ..
            } => format!("Rolling {func} of '{column}' over {window} rows"),
            Self::DropRowsByIndex { indices } => format!("Drop {} row(s)", indices.len()),
        }
    }

    /// Run the step against `df`.
    ///
    /// # Errors
    ///
    /// Whatever the underlying processor function reports.
    pub fn apply(&self, df: &DataFrame) -> Result<DataFrame> {
        match self {
            Self::DropColumns { columns } => processor::drop_columns(df, columns),
            Self::SelectColumns { columns } => processor::select_columns(df, columns),
            Self::RenameColumns { mapping } => processor::rename_columns(df, mapping),
            Self::DropEmptyColumns => processor::drop_empty_columns(df),
            Self::MathOperation {
                col_a,
                col_b,
                operation,
                new_name,
            } => processor::math_operation(df, col_a, col_b, *operation, new_name),
            Self::GroupAndAggregate { by, aggs } => {
                let aggs: Vec<(String, Vec<AggFunc>)> =
                    aggs.iter().map(|(c, f)| (c.clone(), f.clone())).collect();
                processor::group_and_aggregate(df, by, &aggs)
            }
            Self::FilterText {
                column,
                mode,
                pattern,
            } => processor::filter_text(df, column, *mode, pattern),
            Self::Resample {
                datetime_column,
                frequency,
                aggs,
            } => {
                let aggs: Vec<(String, AggFunc)> =
                    aggs.iter().map(|(c, f)| (c.clone(), *f)).collect();
                processor::resample_time_series(df, datetime_column, *frequency, &aggs)
            }
            Self::Rolling {
                column,
                window,
                func,
                new_name,
            } => processor::add_rolling_column(df, column, *window, *func, new_name.as_deref()),
            Self::DropRowsByIndex { indices } => processor::drop_rows_by_index(df, indices),
        }
    }
}

/// An ordered list of steps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    steps: Vec<Step>,
}

impl Recipe {
    pub fn new(steps: Vec<Step>) -> Self {
        Self { steps }
    }

    pub fn push(&mut self, step: Step) {
        self.steps.push(step);
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Step> {
        self.steps.iter()
    }

    /// Apply every step in order, outside any session.
    ///
    /// # Errors
    ///
    /// The first failing step's error, prefixed with its position and name.
    pub fn apply(&self, df: &DataFrame) -> Result<DataFrame> {
        let mut current = df.clone();
        for (idx, step) in self.steps.iter().enumerate() {
            current = step
                .apply(&current)
                .context(format!("Step {idx} ({}) failed", step.name()))?;
        }
        Ok(current)
    }

    /// # Errors
    ///
    /// `UnsupportedOperation` for an unknown step, math operation, text mode,
    /// aggregation function or frequency; `Config` for any other malformed
    /// JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: JsonValue = serde_json::from_str(json)?;
        check_tags(&raw)?;
        Ok(serde_json::from_value(raw)?)
    }

    /// # Errors
    ///
    /// `Config` if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// # Errors
    ///
    /// `Io` when the file cannot be read, `Config` when it does not parse.
    pub fn from_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .context(format!("Failed to read recipe {}", path.display()))?;
        Self::from_json(&json)
    }
}

/// Parse every enumerated tag in raw recipe JSON so an unknown one surfaces
/// as its own `UnsupportedOperation` rather than a generic parse error.
fn check_tags(raw: &JsonValue) -> Result<()> {
    let steps = raw
        .get("steps")
        .and_then(JsonValue::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    for step in steps {
        let field = |key: &str| step.get(key).and_then(JsonValue::as_str);
        if let Some(op) = field("op") {
            if !Step::NAMES.contains(&op) {
                return Err(PrepError::UnsupportedOperation {
                    kind: "recipe step",
                    tag: op.to_owned(),
                });
            }
        }
        if let Some(tag) = field("operation") {
            tag.parse::<MathOp>()?;
        }
        if let Some(tag) = field("mode") {
            tag.parse::<TextMatch>()?;
        }
        if let Some(tag) = field("frequency") {
            tag.parse::<Frequency>()?;
        }
        if let Some(tag) = field("func") {
            tag.parse::<AggFunc>()?;
        }
        let aggs = step.get("aggs").and_then(JsonValue::as_object);
        for funcs in aggs.into_iter().flat_map(|m| m.values()) {
            let names: Vec<&str> = match funcs {
                JsonValue::String(name) => vec![name.as_str()],
                JsonValue::Array(list) => list.iter().filter_map(JsonValue::as_str).collect(),
                _ => Vec::new(),
            };
            for name in names {
                name.parse::<AggFunc>()?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::column_names;
    use anyhow::Result;
    use polars::prelude::*;

    #[test]
    fn test_parse_and_apply() -> Result<()> {
        let recipe = Recipe::from_json(
            r#"{
                "steps": [
                    { "op": "math_operation", "col_a": "a", "col_b": "b", "operation": "diff", "new_name": "d" },
                    { "op": "drop_columns", "columns": ["a"] },
                    { "op": "rolling", "column": "b", "window": 2, "func": "mean" }
                ]
            }"#,
        )?;
        assert_eq!(recipe.len(), 3);

        let df = df!("a" => [1i64, 2, 3], "b" => [4i64, 5, 6])?;
        let out = recipe.apply(&df)?;
        assert_eq!(column_names(&out), vec!["b", "d", "b_rolling_mean"]);
        Ok(())
    }

    #[test]
    fn test_json_round_trip() -> Result<()> {
        let mut recipe = Recipe::default();
        recipe.push(Step::GroupAndAggregate {
            by: vec!["k".to_owned()],
            aggs: BTreeMap::from([("v".to_owned(), vec![AggFunc::Sum, AggFunc::NUnique])]),
        });
        recipe.push(Step::DropEmptyColumns);
        let json = recipe.to_json()?;
        assert!(json.contains("\"op\": \"group_and_aggregate\""), "{json}");
        assert!(json.contains("\"nunique\""), "{json}");
        assert_eq!(Recipe::from_json(&json)?, recipe);
        Ok(())
    }

    fn unsupported_tag(json: &str) -> Option<(&'static str, String)> {
        match Recipe::from_json(json) {
            Err(PrepError::UnsupportedOperation { kind, tag }) => Some((kind, tag)),
            _ => None,
        }
    }

    #[test]
    fn test_unknown_tags_are_unsupported() {
        assert_eq!(
            unsupported_tag(r#"{ "steps": [ { "op": "explode" } ] }"#),
            Some(("recipe step", "explode".to_owned()))
        );
        assert_eq!(
            unsupported_tag(
                r#"{ "steps": [ { "op": "math_operation", "col_a": "a", "col_b": "b", "operation": "pow", "new_name": "p" } ] }"#
            ),
            Some(("math operation", "pow".to_owned()))
        );
        assert_eq!(
            unsupported_tag(r#"{ "steps": [ { "op": "rolling", "column": "a", "window": 2, "func": "mode" } ] }"#),
            Some(("aggregation function", "mode".to_owned()))
        );
        assert_eq!(
            unsupported_tag(
                r#"{ "steps": [ { "op": "group_and_aggregate", "by": ["k"], "aggs": { "v": ["sum", "mode"] } } ] }"#
            ),
            Some(("aggregation function", "mode".to_owned()))
        );
        assert_eq!(
            unsupported_tag(
                r#"{ "steps": [ { "op": "resample", "datetime_column": "t", "frequency": "fortnight", "aggs": { "v": "sum" } } ] }"#
            ),
            Some(("resample frequency", "fortnight".to_owned()))
        );
        assert_eq!(
            unsupported_tag(r#"{ "steps": [ { "op": "filter_text", "column": "c", "mode": "regex", "pattern": "x" } ] }"#),
            Some(("text match mode", "regex".to_owned()))
        );
    }

    #[test]
    fn test_aliases_parse_in_recipes() -> Result<()> {
        let recipe = Recipe::from_json(
            r#"{ "steps": [ { "op": "resample", "datetime_column": "t", "frequency": "W", "aggs": { "v": "avg" } } ] }"#,
        )?;
        assert_eq!(
            recipe.iter().next(),
            Some(&Step::Resample {
                datetime_column: "t".to_owned(),
                frequency: Frequency::Week,
                aggs: BTreeMap::from([("v".to_owned(), AggFunc::Mean)]),
            })
        );
        Ok(())
    }

    #[test]
    fn test_failing_step_names_position() -> Result<()> {
        let df = df!("a" => [1i64])?;
        let recipe = Recipe::new(vec![
            Step::DropEmptyColumns,
            Step::DropColumns {
                columns: vec!["zz".to_owned()],
            },
        ]);
        let msg = recipe.apply(&df).unwrap_err().to_string();
        assert!(msg.contains("Step 1 (drop_columns)"), "{msg}");
        Ok(())
    }
}
