//! Session controller: one live table plus its undo/redo history.
//!
//! ```text
//!   Empty ──load──▶ Loaded ──mutate──▶ Modified
//!                     ▲                  │  ▲
//!                     └──undo (last)─────┘  └─ mutate / undo / redo
//! ```
//!
//! Every mutating call goes through [`Session::mutate`], which runs the
//! processor function against the live table and commits only on success.
//! The pre-call table is pushed onto the undo stack and the redo stack is
//! cleared. A failed call leaves the table and both stacks untouched.
//!
//! Snapshots are `DataFrame` clones. Polars columns are reference-counted,
//! so a snapshot shares every buffer the following operation did not
//! rewrite, and since processor functions never mutate their input the
//! shared buffers are never written through.

use crate::error::{PrepError, Result};
use crate::exporter::{self, CsvExportOptions};
use crate::loader::{self, LoadOptions, TableSummary};
use crate::processor::{self, AggFunc, Frequency, MathOp, TextMatch};
use crate::recipe::Recipe;
use crate::validator::{self, QualityReport};
use crate::value::{RowView, Value};
use polars::prelude::*;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No table loaded.
    Empty,
    /// A table is loaded and nothing can be undone.
    Loaded,
    /// At least one committed change can be undone.
    Modified,
}

/// Undo and redo stacks, most recent last.
#[derive(Debug, Default)]
struct History {
    undo: Vec<DataFrame>,
    redo: Vec<DataFrame>,
    /// Maximum undo depth; oldest snapshots are dropped beyond it.
    limit: Option<usize>,
}

impl History {
    fn record(&mut self, snapshot: DataFrame) {
        self.undo.push(snapshot);
        self.redo.clear();
        if let Some(limit) = self.limit {
            let excess = self.undo.len().saturating_sub(limit);
            if excess > 0 {
                self.undo.drain(..excess);
            }
        }
    }

    fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }
}

#[derive(Debug, Default)]
pub struct Session {
    table: Option<DataFrame>,
    source: Option<PathBuf>,
    history: History,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// A session keeping at most `limit` undo steps (`None` = unlimited).
    pub fn with_history_limit(limit: Option<usize>) -> Self {
        Self {
            history: History {
                limit,
                ..History::default()
            },
            ..Self::default()
        }
    }

    // ---- state ------------------------------------------------------------

    pub fn state(&self) -> SessionState {
        match (&self.table, self.history.undo.is_empty()) {
            (None, _) => SessionState::Empty,
            (Some(_), true) => SessionState::Loaded,
            (Some(_), false) => SessionState::Modified,
        }
    }

    pub fn table(&self) -> Option<&DataFrame> {
        self.table.as_ref()
    }

    /// Path of the file the live table was loaded from, if any.
    pub fn source_path(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// `(undo, redo)` stack depths.
    pub fn history_depth(&self) -> (usize, usize) {
        (self.history.undo.len(), self.history.redo.len())
    }

    pub fn can_undo(&self) -> bool {
        !self.history.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.history.redo.is_empty()
    }

    fn require_table(&self) -> Result<&DataFrame> {
        self.table
            .as_ref()
            .ok_or_else(|| PrepError::InvalidArgument("no table loaded".to_owned()))
    }

    // ---- transitions ------------------------------------------------------

    /// Load a file, replacing the live table and clearing history. On
    /// failure the session is left as it was.
    ///
    /// # Errors
    ///
    /// Any [`loader::load`] error.
    pub fn load(&mut self, path: &Path, opts: &LoadOptions) -> Result<()> {
        let df = loader::load(path, opts)?;
        self.install(df, Some(path.to_path_buf()));
        Ok(())
    }

    /// Adopt an in-memory table as if it had been loaded.
    pub fn load_table(&mut self, df: DataFrame) {
        self.install(df, None);
    }

    fn install(&mut self, df: DataFrame, source: Option<PathBuf>) {
        tracing::info!(
            "Session loaded {} rows x {} columns{}",
            df.height(),
            df.width(),
            source
                .as_ref()
                .map(|p| format!(" from {}", p.display()))
                .unwrap_or_default()
        );
        self.table = Some(df);
        self.source = source;
        self.history.clear();
    }

    /// Run `op` on the live table and commit its result.
    fn mutate<F>(&mut self, name: &str, op: F) -> Result<()>
    where
        F: FnOnce(&DataFrame) -> Result<DataFrame>,
    {
        let result = op(self.require_table()?);
        match result {
            Ok(next) => {
                if let Some(previous) = self.table.replace(next) {
                    self.history.record(previous);
                }
                tracing::debug!(
                    "Committed {} (undo depth {})",
                    name,
                    self.history.undo.len()
                );
                Ok(())
            }
            Err(err) => {
                tracing::warn!("{} failed, table unchanged: {}", name, err);
                Err(err)
            }
        }
    }

    /// Restore the previous table. Returns `false` when there is nothing to undo.
    pub fn undo(&mut self) -> bool {
        let Some(previous) = self.history.undo.pop() else {
            return false;
        };
        if let Some(current) = self.table.replace(previous) {
            self.history.redo.push(current);
        }
        tracing::debug!("Undo (undo {}, redo {})", self.history.undo.len(), self.history.redo.len());
        true
    }

    /// Re-apply the most recently undone change. Returns `false` when there
    /// is nothing to redo.
    pub fn redo(&mut self) -> bool {
        let Some(next) = self.history.redo.pop() else {
            return false;
        };
        if let Some(current) = self.table.replace(next) {
            self.history.undo.push(current);
        }
        tracing::debug!("Redo (undo {}, redo {})", self.history.undo.len(), self.history.redo.len());
        true
    }

    // ---- mutating operations ---------------------------------------------

    /// # Errors
    ///
    /// See [`processor::drop_columns`].
    pub fn drop_columns(&mut self, names: &[String]) -> Result<()> {
        self.mutate("drop_columns", |df| processor::drop_columns(df, names))
    }

    /// # Errors
    ///
    /// See [`processor::select_columns`].
    pub fn select_columns(&mut self, names: &[String]) -> Result<()> {
        self.mutate("select_columns", |df| processor::select_columns(df, names))
    }

    /// # Errors
    ///
    /// See [`processor::add_column`].
    pub fn add_column(&mut self, name: &str, values: &[Value]) -> Result<()> {
        self.mutate("add_column", |df| processor::add_column(df, name, values))
    }

    /// # Errors
    ///
    /// See [`processor::create_column_from_existing`].
    pub fn create_column_from_existing<F>(&mut self, new_name: &str, derive: F) -> Result<()>
    where
        F: FnOnce(&DataFrame) -> Vec<Value>,
    {
        self.mutate("create_column_from_existing", |df| {
            processor::create_column_from_existing(df, new_name, derive)
        })
    }

    /// # Errors
    ///
    /// See [`processor::apply_transformation`].
    pub fn apply_transformation<F>(&mut self, column: &str, f: F) -> Result<()>
    where
        F: Fn(&Value) -> Value,
    {
        self.mutate("apply_transformation", |df| {
            processor::apply_transformation(df, column, f)
        })
    }

    /// # Errors
    ///
    /// See [`processor::rename_columns`].
    pub fn rename_columns(&mut self, mapping: &HashMap<String, String>) -> Result<()> {
        self.mutate("rename_columns", |df| processor::rename_columns(df, mapping))
    }

    /// # Errors
    ///
    /// See [`loader::set_column_names`].
    pub fn set_column_names(&mut self, names: &[String]) -> Result<()> {
        self.mutate("set_column_names", |df| loader::set_column_names(df, names))
    }

    /// # Errors
    ///
    /// See [`processor::drop_rows_by_index`].
    pub fn drop_rows_by_index(&mut self, indices: &[usize]) -> Result<()> {
        self.mutate("drop_rows_by_index", |df| {
            processor::drop_rows_by_index(df, indices)
        })
    }

    /// # Errors
    ///
    /// See [`processor::drop_rows_by_condition`].
    pub fn drop_rows_by_condition<F>(&mut self, predicate: F) -> Result<()>
    where
        F: Fn(&RowView<'_>) -> bool,
    {
        self.mutate("drop_rows_by_condition", |df| {
            processor::drop_rows_by_condition(df, predicate)
        })
    }

    /// # Errors
    ///
    /// See [`processor::filter_rows`].
    pub fn filter_rows<F>(&mut self, predicate: F) -> Result<()>
    where
        F: Fn(&RowView<'_>) -> bool,
    {
        self.mutate("filter_rows", |df| processor::filter_rows(df, predicate))
    }

    /// # Errors
    ///
    /// See [`processor::drop_empty_columns`].
    pub fn drop_empty_columns(&mut self) -> Result<()> {
        self.mutate("drop_empty_columns", processor::drop_empty_columns)
    }

    /// # Errors
    ///
    /// See [`processor::math_operation`].
    pub fn math_operation(
        &mut self,
        col_a: &str,
        col_b: &str,
        op: MathOp,
        new_name: &str,
    ) -> Result<()> {
        self.mutate("math_operation", |df| {
            processor::math_operation(df, col_a, col_b, op, new_name)
        })
    }

    /// # Errors
    ///
    /// See [`processor::group_and_aggregate`].
    pub fn group_and_aggregate(
        &mut self,
        by: &[String],
        aggs: &[(String, Vec<AggFunc>)],
    ) -> Result<()> {
        self.mutate("group_and_aggregate", |df| {
            processor::group_and_aggregate(df, by, aggs)
        })
    }

    /// # Errors
    ///
    /// See [`processor::filter_text`].
    pub fn filter_text(&mut self, column: &str, mode: TextMatch, pattern: &str) -> Result<()> {
        self.mutate("filter_text", |df| {
            processor::filter_text(df, column, mode, pattern)
        })
    }

    /// # Errors
    ///
    /// See [`processor::resample_time_series`].
    pub fn resample_time_series(
        &mut self,
        datetime_column: &str,
        frequency: Frequency,
        aggs: &[(String, AggFunc)],
    ) -> Result<()> {
        self.mutate("resample_time_series", |df| {
            processor::resample_time_series(df, datetime_column, frequency, aggs)
        })
    }

    /// Store a rolling statistic as a new column.
    ///
    /// # Errors
    ///
    /// See [`processor::add_rolling_column`].
    pub fn add_rolling_column(
        &mut self,
        column: &str,
        window: usize,
        func: AggFunc,
        new_name: Option<&str>,
    ) -> Result<()> {
        self.mutate("add_rolling_column", |df| {
            processor::add_rolling_column(df, column, window, func, new_name)
        })
    }

    /// Apply each recipe step as its own undoable change. Stops at the first
    /// failing step; the steps before it stay applied.
    ///
    /// # Errors
    ///
    /// The failing step's error.
    pub fn apply_recipe(&mut self, recipe: &Recipe) -> Result<usize> {
        let mut applied = 0;
        for step in recipe.iter() {
            self.mutate(step.name(), |df| step.apply(df))?;
            applied += 1;
        }
        tracing::info!("Applied recipe with {} step(s)", applied);
        Ok(applied)
    }

    // ---- read-only operations ---------------------------------------------

    /// # Errors
    ///
    /// `InvalidArgument` without a table, else see [`loader::preview`].
    pub fn preview(&self, row_count: usize, from_tail: bool) -> Result<DataFrame> {
        loader::preview(self.require_table()?, row_count, from_tail)
    }

    /// # Errors
    ///
    /// `InvalidArgument` without a table.
    pub fn summary(&self) -> Result<TableSummary> {
        Ok(loader::summary(self.require_table()?))
    }

    /// # Errors
    ///
    /// See [`processor::rolling_stat`].
    pub fn rolling_stat(&self, column: &str, window: usize, func: AggFunc) -> Result<Series> {
        processor::rolling_stat(self.require_table()?, column, window, func)
    }

    /// # Errors
    ///
    /// `InvalidArgument` without a table.
    pub fn check_missing_values(&self) -> Result<Vec<(String, usize)>> {
        Ok(validator::check_missing_values(self.require_table()?))
    }

    /// # Errors
    ///
    /// See [`validator::validate_no_missing`].
    pub fn validate_no_missing(&self, columns: Option<&[String]>) -> Result<()> {
        validator::validate_no_missing(self.require_table()?, columns)
    }

    /// # Errors
    ///
    /// See [`validator::validate_column_types`].
    pub fn validate_column_types(&self, expected: &[(String, String)]) -> Result<()> {
        validator::validate_column_types(self.require_table()?, expected)
    }

    /// # Errors
    ///
    /// See [`validator::validate_unique`].
    pub fn validate_unique(&self, columns: &[String]) -> Result<()> {
        validator::validate_unique(self.require_table()?, columns)
    }

    /// # Errors
    ///
    /// See [`validator::validate_value_ranges`].
    pub fn validate_value_ranges(
        &self,
        column: &str,
        min: Option<f64>,
        max: Option<f64>,
    ) -> Result<()> {
        validator::validate_value_ranges(self.require_table()?, column, min, max)
    }

    /// # Errors
    ///
    /// See [`validator::validate_schema`].
    pub fn validate_schema(&self, expected: &[String]) -> Result<()> {
        validator::validate_schema(self.require_table()?, expected)
    }

    /// # Errors
    ///
    /// See [`validator::validate_allowed_values`].
    pub fn validate_allowed_values(&self, column: &str, allowed: &[String]) -> Result<()> {
        validator::validate_allowed_values(self.require_table()?, column, allowed)
    }

    /// # Errors
    ///
    /// `InvalidArgument` without a table.
    pub fn quality_report(&self) -> Result<QualityReport> {
        Ok(validator::data_quality_report(self.require_table()?))
    }

    /// # Errors
    ///
    /// See [`exporter::export_csv`].
    pub fn export_csv(&self, path: &Path, opts: &CsvExportOptions) -> Result<()> {
        exporter::export_csv(self.require_table()?, path, opts)
    }

    /// # Errors
    ///
    /// See [`exporter::export_array`].
    pub fn export_array(
        &self,
        path: &Path,
        columns: Option<&[String]>,
        overwrite: bool,
    ) -> Result<()> {
        exporter::export_array(self.require_table()?, path, columns, overwrite)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{column_names, same_contents};
    use anyhow::Result;

    fn loaded() -> Session {
        let mut session = Session::new();
        session.load_table(df!("a" => [1i64, 2, 3], "b" => [4i64, 5, 6]).expect("fixture frame"));
        session
    }

    #[test]
    fn test_state_transitions() -> Result<()> {
        let mut session = Session::new();
        assert_eq!(session.state(), SessionState::Empty);
        assert!(session.drop_columns(&["a".to_owned()]).is_err(), "no table yet");

        session = loaded();
        assert_eq!(session.state(), SessionState::Loaded);
        session.drop_columns(&["a".to_owned()])?;
        assert_eq!(session.state(), SessionState::Modified);
        assert!(session.undo(), "one change to undo");
        assert_eq!(session.state(), SessionState::Loaded);
        Ok(())
    }

    #[test]
    fn test_undo_redo_inverse() -> Result<()> {
        let mut session = loaded();
        let original = session.table().cloned().expect("table loaded");

        session.math_operation("a", "b", MathOp::Sum, "s")?;
        session.drop_columns(&["a".to_owned()])?;
        session.drop_rows_by_index(&[0])?;
        let last = session.table().cloned().expect("table loaded");
        assert_eq!(session.history_depth(), (3, 0));

        while session.undo() {}
        assert!(same_contents(session.table().expect("table"), &original), "back to start");
        assert_eq!(session.history_depth(), (0, 3));

        while session.redo() {}
        assert!(same_contents(session.table().expect("table"), &last), "back to end");
        Ok(())
    }

    #[test]
    fn test_failed_mutation_changes_nothing() -> Result<()> {
        let mut session = loaded();
        session.drop_columns(&["a".to_owned()])?;
        session.undo();
        let before = session.table().cloned().expect("table loaded");

        let err = session.drop_columns(&["zz".to_owned()]);
        assert!(err.is_err(), "unknown column");
        assert!(same_contents(session.table().expect("table"), &before), "table untouched");
        assert_eq!(session.history_depth(), (0, 1), "redo survives a failed call");
        Ok(())
    }

    #[test]
    fn test_new_mutation_clears_redo() -> Result<()> {
        let mut session = loaded();
        session.drop_columns(&["a".to_owned()])?;
        session.undo();
        assert!(session.can_redo(), "redo available");
        session.drop_columns(&["b".to_owned()])?;
        assert!(!session.can_redo(), "redo cleared by a new change");
        Ok(())
    }

    #[test]
    fn test_load_clears_history() -> Result<()> {
        let mut session = loaded();
        session.drop_columns(&["a".to_owned()])?;
        session.load_table(df!("x" => [1i64])?);
        assert_eq!(session.state(), SessionState::Loaded);
        assert!(!session.undo(), "load is not undoable");
        assert_eq!(column_names(session.table().expect("table")), vec!["x"]);
        Ok(())
    }

    #[test]
    fn test_read_only_calls_leave_history_alone() -> Result<()> {
        let mut session = loaded();
        session.drop_rows_by_index(&[2])?;
        for _ in 0..3 {
            session.preview(1, true)?;
            session.summary()?;
            session.check_missing_values()?;
            session.quality_report()?;
        }
        assert_eq!(session.history_depth(), (1, 0));
        Ok(())
    }

    #[test]
    fn test_history_limit_drops_oldest() -> Result<()> {
        let mut session = Session::with_history_limit(Some(2));
        session.load_table(df!("a" => [1i64, 2, 3, 4])?);
        for _ in 0..3 {
            session.drop_rows_by_index(&[0])?;
        }
        assert_eq!(session.history_depth(), (2, 0));
        while session.undo() {}
        assert_eq!(session.table().map(DataFrame::height), Some(3));
        Ok(())
    }

    #[test]
    fn test_recipe_steps_are_separate_undo_entries() -> Result<()> {
        let mut session = loaded();
        let recipe = Recipe::from_json(
            r#"{ "steps": [
                { "op": "drop_columns", "columns": ["a"] },
                { "op": "drop_rows_by_index", "indices": [0] },
                { "op": "drop_columns", "columns": ["missing"] }
            ] }"#,
        )?;
        assert!(session.apply_recipe(&recipe).is_err(), "third step fails");
        assert_eq!(session.history_depth(), (2, 0));
        assert_eq!(session.table().map(DataFrame::height), Some(2));
        Ok(())
    }
}
