//! # tabprep command-line entry point
//!
//! ```bash
//! tabprep inspect data.csv -n 5
//! tabprep validate data.csv --schema id,age,name --no-missing
//! tabprep apply data.csv --recipe clean.json --output clean.csv
//! tabprep export data.csv --format npy --columns x,y --output xy.npy
//! ```
//!
//! Set `RUST_LOG=debug` to see every session transition.

#![expect(clippy::print_stdout)] // the CLI reports results on stdout

mod cli;

use anyhow::Result;
use clap::Parser as _;

fn main() -> Result<()> {
    tabprep::logging::init()?;
    let cli = cli::Cli::parse();
    cli::run_command(cli.command)
}
