use anyhow::{Context as _, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tabprep::config::{self, Settings};
use tabprep::exporter::CsvExportOptions;
use tabprep::loader::{self, LoadOptions};
use tabprep::recipe::Recipe;
use tabprep::session::Session;

#[derive(Parser)]
#[command(name = "tabprep", about = "Tabular data preparation tool", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every command that loads a file.
#[derive(Args, Clone)]
pub struct LoadArgs {
    /// Delimited text file to read
    pub file: PathBuf,

    /// Field separator (defaults to the configured one)
    #[arg(short, long)]
    pub separator: Option<char>,

    /// The file has no header row; columns are named 0, 1, 2, ...
    #[arg(long)]
    pub no_header: bool,

    /// Text encoding (utf-8, utf-8-sig, utf-16, utf-16le, utf-16be, latin-1)
    #[arg(short, long)]
    pub encoding: Option<String>,

    /// Additional strings to read as missing
    #[arg(long = "na", value_delimiter = ',')]
    pub na_tokens: Vec<String>,

    /// Reject files with ragged rows instead of padding or truncating them
    #[arg(long)]
    pub strict: bool,
}

impl LoadArgs {
    fn options(&self, settings: &Settings) -> LoadOptions {
        let mut opts = settings.load_options().with_header(!self.no_header).strict(self.strict);
        if let Some(sep) = self.separator {
            opts = opts.with_separator(sep);
        }
        if let Some(encoding) = &self.encoding {
            opts = opts.with_encoding(encoding.clone());
        }
        if !self.na_tokens.is_empty() {
            let mut tokens = opts.na_tokens.clone();
            tokens.extend(self.na_tokens.iter().cloned());
            opts = opts.with_na_tokens(tokens);
        }
        opts
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum ExportFormat {
    Csv,
    Npy,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Load a file and print a preview with its summary
    Inspect {
        #[command(flatten)]
        load: LoadArgs,

        /// Rows to preview (defaults to the configured count)
        #[arg(short = 'n', long)]
        rows: Option<usize>,

        /// Preview the last rows instead of the first
        #[arg(long)]
        tail: bool,
    },
    /// Check that every line has the same number of fields, without parsing
    CheckFormat {
        file: PathBuf,

        #[arg(short, long, default_value_t = ',')]
        separator: char,

        /// Expected field count; defaults to the header's
        #[arg(long)]
        columns: Option<usize>,
    },
    /// Run validation checks and report the first failure
    Validate {
        #[command(flatten)]
        load: LoadArgs,

        /// Exact set of column names expected
        #[arg(long, value_delimiter = ',')]
        schema: Vec<String>,

        /// Require no missing values in any column
        #[arg(long)]
        no_missing: bool,

        /// Columns whose combined values must be unique per row
        #[arg(long, value_delimiter = ',')]
        unique: Vec<String>,
    },
    /// Print the data quality report as JSON
    Quality {
        #[command(flatten)]
        load: LoadArgs,
    },
    /// Drop columns and write the result as CSV
    Drop {
        #[command(flatten)]
        load: LoadArgs,

        #[arg(short, long, value_delimiter = ',', required = true)]
        columns: Vec<String>,

        #[arg(short, long)]
        output: PathBuf,

        #[arg(long)]
        overwrite: bool,
    },
    /// Apply a JSON recipe and write the result as CSV
    Apply {
        #[command(flatten)]
        load: LoadArgs,

        #[arg(short, long)]
        recipe: PathBuf,

        #[arg(short, long)]
        output: PathBuf,

        #[arg(long)]
        overwrite: bool,
    },
    /// Convert a file to CSV or a NumPy array
    Export {
        #[command(flatten)]
        load: LoadArgs,

        #[arg(short, long)]
        output: PathBuf,

        #[arg(short, long, value_enum, default_value_t = ExportFormat::Csv)]
        format: ExportFormat,

        /// Subset of columns to write, in order
        #[arg(long, value_delimiter = ',')]
        columns: Vec<String>,

        /// Separator for CSV output
        #[arg(long, default_value_t = ',')]
        out_separator: char,

        /// Write the row labels as the first CSV column
        #[arg(long)]
        row_labels: bool,

        #[arg(long)]
        overwrite: bool,
    },
}

pub fn run_command(command: Commands) -> Result<()> {
    let settings = config::load_settings();
    match command {
        Commands::Inspect { load, rows, tail } => handle_inspect(&settings, &load, rows, tail),
        Commands::CheckFormat {
            file,
            separator,
            columns,
        } => handle_check_format(file, separator, columns),
        Commands::Validate {
            load,
            schema,
            no_missing,
            unique,
        } => handle_validate(&settings, &load, &schema, no_missing, &unique),
        Commands::Quality { load } => handle_quality(&settings, &load),
        Commands::Drop {
            load,
            columns,
            output,
            overwrite,
        } => handle_drop(&settings, &load, &columns, output, overwrite),
        Commands::Apply {
            load,
            recipe,
            output,
            overwrite,
        } => handle_apply(&settings, &load, recipe, output, overwrite),
        Commands::Export {
            load,
            output,
            format,
            columns,
            out_separator,
            row_labels,
            overwrite,
        } => {
            let session = open_session(&settings, &load)?;
            let columns = (!columns.is_empty()).then_some(columns);
            let overwrite = overwrite || settings.overwrite_exports;
            match format {
                ExportFormat::Csv => {
                    let mut opts = CsvExportOptions::default()
                        .with_separator(out_separator)
                        .with_row_labels(row_labels)
                        .overwrite(overwrite);
                    opts.columns = columns;
                    session.export_csv(&output, &opts)?;
                }
                ExportFormat::Npy => {
                    session.export_array(&output, columns.as_deref(), overwrite)?;
                }
            }
            println!("Wrote {}", output.display());
            Ok(())
        }
    }
}

fn open_session(settings: &Settings, load: &LoadArgs) -> Result<Session> {
    let mut session = Session::with_history_limit(settings.history_limit);
    session
        .load(&load.file, &load.options(settings))
        .with_context(|| format!("Failed to load {}", load.file.display()))?;
    Ok(session)
}

fn handle_inspect(settings: &Settings, load: &LoadArgs, rows: Option<usize>, tail: bool) -> Result<()> {
    let session = open_session(settings, load)?;
    let preview = session.preview(rows.unwrap_or(settings.preview_rows), tail)?;
    let summary = session.summary()?;

    println!("{preview}");
    println!(
        "{} rows x {} columns",
        summary.row_count, summary.column_count
    );
    for (name, missing) in summary.missing.iter().filter(|(_, n)| *n > 0) {
        println!("  {name}: {missing} missing");
    }
    Ok(())
}

fn handle_check_format(file: PathBuf, separator: char, columns: Option<usize>) -> Result<()> {
    loader::validate_format(&file, separator, columns)?;
    println!("{}: format OK", file.display());
    Ok(())
}

fn handle_validate(
    settings: &Settings,
    load: &LoadArgs,
    schema: &[String],
    no_missing: bool,
    unique: &[String],
) -> Result<()> {
    let session = open_session(settings, load)?;
    let mut checks = 0;
    if !schema.is_empty() {
        session.validate_schema(schema)?;
        checks += 1;
    }
    if no_missing {
        session.validate_no_missing(None)?;
        checks += 1;
    }
    if !unique.is_empty() {
        session.validate_unique(unique)?;
        checks += 1;
    }
    println!("{checks} check(s) passed");
    Ok(())
}

fn handle_quality(settings: &Settings, load: &LoadArgs) -> Result<()> {
    let session = open_session(settings, load)?;
    println!("{}", session.quality_report()?.to_json()?);
    Ok(())
}

fn handle_drop(
    settings: &Settings,
    load: &LoadArgs,
    columns: &[String],
    output: PathBuf,
    overwrite: bool,
) -> Result<()> {
    let mut session = open_session(settings, load)?;
    session.drop_columns(columns)?;
    write_csv(settings, &session, output, overwrite)
}

fn handle_apply(
    settings: &Settings,
    load: &LoadArgs,
    recipe: PathBuf,
    output: PathBuf,
    overwrite: bool,
) -> Result<()> {
    let recipe = Recipe::from_file(&recipe)?;
    let mut session = open_session(settings, load)?;
    for step in recipe.iter() {
        println!("- {}", step.description());
    }
    let applied = session.apply_recipe(&recipe)?;
    println!("Applied {applied} step(s)");
    write_csv(settings, &session, output, overwrite)
}

fn write_csv(settings: &Settings, session: &Session, output: PathBuf, overwrite: bool) -> Result<()> {
    let opts = CsvExportOptions::default()
        .with_separator(settings.separator)
        .overwrite(overwrite || settings.overwrite_exports);
    session.export_csv(&output, &opts)?;
    println!("Wrote {}", output.display());
    Ok(())
}
