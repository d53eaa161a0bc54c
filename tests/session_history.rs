//! Undo/redo behaviour of the session controller over real files.

use anyhow::Result;
use std::path::PathBuf;
use tabprep::loader::LoadOptions;
use tabprep::processor::{AggFunc, MathOp, TextMatch};
use tabprep::recipe::Recipe;
use tabprep::session::{Session, SessionState};
use tabprep::table::{column_names, same_contents};
use tabprep::value::Value;

fn people_session() -> Result<Session> {
    let mut session = Session::new();
    session.load(&PathBuf::from("testdata/people.csv"), &LoadOptions::default())?;
    Ok(session)
}

#[test]
fn test_undo_n_times_returns_to_start() -> Result<()> {
    let mut session = people_session()?;
    let start = session.table().cloned().expect("table loaded");

    session.math_operation("id", "age", MathOp::Sum, "id_plus_age")?;
    session.filter_text("name", TextMatch::Contains, "a")?;
    session.apply_transformation("age", |v| {
        v.as_i64().map_or(Value::Missing, |age| Value::Int(age + 1))
    })?;
    session.drop_rows_by_condition(|row| row.get("age").gt(40.0))?;
    session.add_rolling_column("id", 2, AggFunc::Sum, None)?;
    let end = session.table().cloned().expect("table loaded");

    for _ in 0..5 {
        assert!(session.undo(), "an entry per operation");
    }
    assert!(!session.undo(), "nothing left");
    assert!(same_contents(session.table().expect("table"), &start), "original restored");
    assert_eq!(session.state(), SessionState::Loaded);

    for _ in 0..5 {
        assert!(session.redo(), "an entry per operation");
    }
    assert!(!session.redo(), "nothing left");
    assert!(same_contents(session.table().expect("table"), &end), "final state restored");
    Ok(())
}

#[test]
fn test_reload_discards_history() -> Result<()> {
    let mut session = people_session()?;
    session.drop_columns(&["city".to_owned()])?;
    assert!(session.can_undo(), "drop is undoable");

    session.load(&PathBuf::from("testdata/sales.csv"), &LoadOptions::default())?;
    assert_eq!(session.history_depth(), (0, 0));
    assert!(!session.undo(), "undo after load is a no-op");
    assert_eq!(
        session.source_path(),
        Some(PathBuf::from("testdata/sales.csv").as_path())
    );
    Ok(())
}

#[test]
fn test_failed_load_keeps_current_table() -> Result<()> {
    let mut session = people_session()?;
    session.drop_columns(&["city".to_owned()])?;
    let err = session.load(&PathBuf::from("testdata/nope.csv"), &LoadOptions::default());
    assert!(err.is_err(), "missing file");
    assert_eq!(session.state(), SessionState::Modified);
    assert_eq!(
        column_names(session.table().expect("table")),
        vec!["id", "name", "age"]
    );
    Ok(())
}

#[test]
fn test_validators_do_not_touch_history() -> Result<()> {
    let mut session = people_session()?;
    session.drop_rows_by_index(&[1])?;
    let before = session.table().cloned().expect("table loaded");

    assert!(session.validate_no_missing(None).is_err(), "Dan has no city");
    session.validate_unique(&["id".to_owned()])?;
    session.validate_value_ranges("age", Some(0.0), Some(120.0))?;
    assert!(
        session
            .validate_allowed_values("city", &["London".to_owned()])
            .is_err(),
        "Paris is not allowed"
    );

    assert_eq!(session.history_depth(), (1, 0));
    assert!(same_contents(session.table().expect("table"), &before), "unchanged");
    Ok(())
}

#[test]
fn test_recipe_file_applied_through_session() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let recipe_path = dir.path().join("recipe.json");
    std::fs::write(
        &recipe_path,
        r#"{ "steps": [
            { "op": "group_and_aggregate", "by": ["category"], "aggs": { "value": ["sum", "count"] } },
            { "op": "rename_columns", "mapping": { "value_sum": "total" } }
        ] }"#,
    )?;

    let mut session = Session::new();
    session.load(&PathBuf::from("testdata/sales.csv"), &LoadOptions::default())?;
    let applied = session.apply_recipe(&Recipe::from_file(&recipe_path)?)?;
    assert_eq!(applied, 2);
    assert_eq!(
        column_names(session.table().expect("table")),
        vec!["category", "total", "value_count"]
    );

    let out = dir.path().join("summary.csv");
    session.export_csv(&out, &Default::default())?;
    assert!(std::fs::read_to_string(&out)?.starts_with("category,total,value_count"), "header");

    assert!(session.undo(), "rename undone");
    assert!(session.undo(), "grouping undone");
    assert_eq!(session.table().map(|t| t.height()), Some(4));
    Ok(())
}
