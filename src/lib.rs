//! # tabprep - tabular data preparation
//!
//! tabprep loads delimited text files into an in-memory table, applies
//! column and row transformations, validates the result and exports it as
//! CSV or a NumPy `.npy` array. Tables are polars [`DataFrame`]s with null
//! as the missing-value marker.
//!
//! ## Quick Start
//!
//! ```no_run
//! use tabprep::loader::LoadOptions;
//! use tabprep::processor::MathOp;
//! use tabprep::session::Session;
//!
//! # fn example() -> tabprep::error::Result<()> {
//! let mut session = Session::new();
//! session.load("data.csv".as_ref(), &LoadOptions::default())?;
//! session.math_operation("a", "b", MathOp::Diff, "d")?;
//! session.validate_no_missing(None)?;
//! session.undo();
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`loader`]: parsing, previews, summaries and format pre-flight checks
//! - [`processor`]: pure table transformations (columns, rows, grouping,
//!   text filters, resampling, rolling statistics)
//! - [`validator`]: predicate checks and the quality report
//! - [`exporter`]: CSV and `.npy` output
//! - [`session`]: the live table with undo/redo history
//! - [`recipe`]: JSON-serializable step lists replayed through a session
//! - [`config`], [`logging`], [`error`]: the ambient plumbing
//!
//! Processor, validator and exporter functions take `&DataFrame` and never
//! mutate it. [`session::Session`] wraps them, snapshotting before each
//! mutating call and committing only on success.
//!
//! [`DataFrame`]: polars::prelude::DataFrame

pub mod config;
pub mod error;
pub mod exporter;
pub mod loader;
pub mod logging;
pub mod processor;
pub mod recipe;
pub mod session;
pub mod table;
pub mod validator;
pub mod value;
