use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::options::{
    DEFAULT_BATCH_SIZE, DEFAULT_COMPLETENESS_THRESHOLD, DEFAULT_DISPLAY_CLAMP,
    DEFAULT_PREVIEW_RECORDS, DEFAULT_SAMPLE_RECORDS, DisplayOptions, ImportOptions,
    StagingOptions,
};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Stage exports, map them onto a target schema, and import them",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List the target collections and their fields
    Targets(TargetsArgs),
    /// Detect an export's shape and show its tables, columns, and preview records
    Stage(StageArgs),
    /// Write a template export for one or more target collections
    Template(TemplateArgs),
    /// Write a starter mapping plan for an export
    Plan(PlanArgs),
    /// Show transformed preview records per target collection
    Preview(PreviewArgs),
    /// Transform every mapped table and write it to a sink
    Import(ImportArgs),
}

#[derive(Debug, Clone, Args)]
pub struct SchemaArgs {
    /// Target schema YAML file (defaults to the built-in example schema)
    #[arg(long)]
    pub schema: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
pub struct StagingArgs {
    /// Records sampled from the head of each table for column discovery
    #[arg(long, default_value_t = DEFAULT_SAMPLE_RECORDS)]
    pub sample_rows: usize,
    /// Maximum preview records kept per table
    #[arg(long, default_value_t = DEFAULT_PREVIEW_RECORDS)]
    pub preview_rows: usize,
    /// Minimum fraction of filled columns for a preferred preview record
    #[arg(long, default_value_t = DEFAULT_COMPLETENESS_THRESHOLD, value_parser = parse_fraction)]
    pub completeness: f64,
}

impl StagingArgs {
    pub fn options(&self) -> StagingOptions {
        StagingOptions {
            sample_records: self.sample_rows,
            preview_records: self.preview_rows,
            completeness_threshold: self.completeness,
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct DisplayArgs {
    /// Maximum characters per rendered cell (0 disables clamping)
    #[arg(long, default_value_t = DEFAULT_DISPLAY_CLAMP)]
    pub clamp: usize,
}

impl DisplayArgs {
    pub fn options(&self) -> DisplayOptions {
        DisplayOptions { clamp: self.clamp }
    }
}

#[derive(Debug, Args)]
pub struct TargetsArgs {
    #[command(flatten)]
    pub schema: SchemaArgs,
    /// Also write the schema as YAML to this path
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct StageArgs {
    /// Export file to stage ('-' reads stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    #[command(flatten)]
    pub schema: SchemaArgs,
    #[command(flatten)]
    pub staging: StagingArgs,
    #[command(flatten)]
    pub display: DisplayArgs,
}

#[derive(Debug, Args)]
pub struct TemplateArgs {
    /// Target collection keys to include
    #[arg(short = 'c', long = "collections", value_delimiter = ',', required = true)]
    pub collections: Vec<String>,
    /// Destination file ('-' or omitted writes stdout)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    #[command(flatten)]
    pub schema: SchemaArgs,
}

#[derive(Debug, Args)]
pub struct PlanArgs {
    /// Export file to plan for ('-' reads stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Destination mapping plan YAML file
    #[arg(short = 'o', long = "output")]
    pub output: PathBuf,
    #[command(flatten)]
    pub schema: SchemaArgs,
    #[command(flatten)]
    pub staging: StagingArgs,
}

#[derive(Debug, Args)]
pub struct PreviewArgs {
    /// Export file ('-' reads stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Mapping plan YAML file
    #[arg(short = 'p', long = "plan")]
    pub plan: PathBuf,
    #[command(flatten)]
    pub schema: SchemaArgs,
    #[command(flatten)]
    pub staging: StagingArgs,
    #[command(flatten)]
    pub display: DisplayArgs,
}

#[derive(Debug, Args)]
pub struct ImportArgs {
    /// Export file ('-' reads stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Mapping plan YAML file
    #[arg(short = 'p', long = "plan")]
    pub plan: PathBuf,
    /// Transform and count without writing anything
    #[arg(long, conflicts_with = "output_dir", required_unless_present = "output_dir")]
    pub dry_run: bool,
    /// Directory receiving one <collection>.ndjson file per target collection
    #[arg(long = "output-dir")]
    pub output_dir: Option<PathBuf>,
    /// Records per sink write
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,
    #[command(flatten)]
    pub schema: SchemaArgs,
    #[command(flatten)]
    pub staging: StagingArgs,
}

impl ImportArgs {
    pub fn options(&self) -> ImportOptions {
        ImportOptions {
            batch_size: self.batch_size,
        }
    }
}

fn parse_fraction(value: &str) -> Result<f64, String> {
    let parsed: f64 = value
        .trim()
        .parse()
        .map_err(|_| format!("'{value}' is not a number"))?;
    if (0.0..=1.0).contains(&parsed) {
        Ok(parsed)
    } else {
        Err(format!("expected a fraction between 0 and 1, found {parsed}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fraction_parser_rejects_out_of_range() {
        assert_eq!(parse_fraction("0.5"), Ok(0.5));
        assert!(parse_fraction("1.5").is_err());
        assert!(parse_fraction("high").is_err());
    }

    #[test]
    fn import_requires_a_sink_choice() {
        assert!(Cli::try_parse_from(["export-migrate", "import", "-i", "x.json", "-p", "p.yml"]).is_err());
        assert!(
            Cli::try_parse_from([
                "export-migrate",
                "import",
                "-i",
                "x.json",
                "-p",
                "p.yml",
                "--dry-run",
                "--output-dir",
                "out"
            ])
            .is_err()
        );
        let cli = Cli::try_parse_from(["export-migrate", "import", "-i", "x.json", "-p", "p.yml", "--dry-run"])
            .expect("parse");
        let Commands::Import(args) = cli.command else {
            panic!("expected import");
        };
        assert!(args.dry_run);
        assert_eq!(args.options().batch_size, DEFAULT_BATCH_SIZE);
    }
}
