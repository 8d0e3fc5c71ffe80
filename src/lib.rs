pub mod cli;
pub mod display;
pub mod driver;
pub mod error;
pub mod extract;
pub mod import;
pub mod io_utils;
pub mod mapping;
pub mod options;
pub mod preview;
pub mod sink;
pub mod staging;
pub mod table;
pub mod target;
pub mod template;
pub mod transform;
pub mod wizard;
pub mod yaml;

use std::{env, path::Path, sync::OnceLock};

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::{LevelFilter, info};

use crate::{
    cli::{Cli, Commands, SchemaArgs, StagingArgs},
    display::RecordView,
    import::ImportStatus,
    io_utils::SourceFile,
    mapping::MappingPlan,
    options::ImportOptions,
    sink::{DryRunSink, NdjsonSink, RecordSink},
    target::TargetSchema,
    wizard::{Step, Wizard},
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("export_migrate", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Targets(args) => handle_targets(&args),
        Commands::Stage(args) => handle_stage(&args),
        Commands::Template(args) => handle_template(&args),
        Commands::Plan(args) => handle_plan(&args),
        Commands::Preview(args) => handle_preview(&args),
        Commands::Import(args) => handle_import(&args),
    }
}

fn load_schema(args: &SchemaArgs) -> Result<TargetSchema> {
    match &args.schema {
        Some(path) => TargetSchema::load(path),
        None => Ok(TargetSchema::example()),
    }
}

/// A wizard that has loaded the schema and staged `input`.
fn staged_wizard(
    input: &Path,
    schema: &SchemaArgs,
    staging: &StagingArgs,
    import: ImportOptions,
) -> Result<Wizard> {
    let schema = load_schema(schema)?;
    let mut wizard = Wizard::new(staging.options(), import);
    wizard.load_target_schema(&schema)?;
    wizard.advance()?;
    let file = SourceFile::read(input)?;
    wizard.select_file(file)?;
    wizard
        .advance()
        .with_context(|| format!("Staging {input:?}"))?;
    Ok(wizard)
}

/// A staged wizard with `plan` applied and the preview generated.
fn previewed_wizard(
    input: &Path,
    plan: &Path,
    schema: &SchemaArgs,
    staging: &StagingArgs,
    import: ImportOptions,
) -> Result<Wizard> {
    let mut wizard = staged_wizard(input, schema, staging, import)?;
    let plan = MappingPlan::load(plan)?;
    wizard
        .apply_plan(&plan)
        .context("Applying mapping plan")?;
    wizard.go_to(Step::Preview)?;
    Ok(wizard)
}

fn handle_targets(args: &cli::TargetsArgs) -> Result<()> {
    let schema = load_schema(&args.schema)?;
    let headers = ["key", "storage", "label", "fields"].map(str::to_string);
    let rows = schema
        .collections
        .iter()
        .map(|c| {
            let fields = c
                .fields
                .iter()
                .map(|f| format!("{}:{}", f.name, f.field_type))
                .collect::<Vec<_>>()
                .join(", ");
            vec![c.key.clone(), c.name.clone(), c.display_label().to_string(), fields]
        })
        .collect::<Vec<_>>();
    print!("{}", table::render_table(&headers, &rows));
    if let Some(path) = &args.output {
        schema.save(path)?;
        info!("Target schema written to {path:?}");
    }
    Ok(())
}

fn handle_stage(args: &cli::StageArgs) -> Result<()> {
    let wizard = staged_wizard(
        &args.input,
        &args.schema,
        &args.staging,
        ImportOptions::default(),
    )?;
    let Some(dataset) = wizard.dataset() else {
        bail!("Staging {:?} produced no dataset", args.input);
    };
    println!("File:        {}", dataset.file_name);
    println!("Driver:      {}", dataset.driver_label);
    println!("Fingerprint: {}", dataset.fingerprint);
    println!();

    let headers = ["table", "records", "columns", "preview", "suggested"].map(str::to_string);
    let rows = dataset
        .tables
        .iter()
        .map(|t| {
            vec![
                t.source_name.clone(),
                t.record_count().to_string(),
                t.detected_columns.len().to_string(),
                t.preview_records.len().to_string(),
                wizard.table_target(&t.source_name).to_string(),
            ]
        })
        .collect::<Vec<_>>();
    print!("{}", table::render_table(&headers, &rows));

    let clamp = args.display.options().clamp;
    for staged in &dataset.tables {
        println!("\n== {} ==", staged.source_name);
        if staged.preview_records.is_empty() {
            println!("(no records)");
            continue;
        }
        print!(
            "{}",
            table::render_records(
                &staged.detected_columns,
                &staged.preview_records,
                RecordView::Staged(dataset.driver_kind),
                clamp,
            )
        );
    }
    Ok(())
}

fn handle_template(args: &cli::TemplateArgs) -> Result<()> {
    let schema = load_schema(&args.schema)?;
    let keys = args
        .collections
        .iter()
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
        .collect::<Vec<_>>();
    let document = template::generate(&schema.collections, &keys)?;
    io_utils::write_json(args.output.as_deref(), &document)?;
    if let Some(path) = args.output.as_deref().filter(|p| !io_utils::is_dash(p)) {
        info!("Template for {} collection(s) written to {path:?}", keys.len());
    }
    Ok(())
}

fn handle_plan(args: &cli::PlanArgs) -> Result<()> {
    let wizard = staged_wizard(
        &args.input,
        &args.schema,
        &args.staging,
        ImportOptions::default(),
    )?;
    wizard.plan().save(&args.output)?;
    let mapped = wizard
        .plan()
        .tables
        .values()
        .filter(|t| t.collection().is_some())
        .count();
    info!(
        "Starter plan for {} table(s) ({mapped} suggested) written to {:?}",
        wizard.plan().tables.len(),
        args.output
    );
    Ok(())
}

fn handle_preview(args: &cli::PreviewArgs) -> Result<()> {
    let wizard = previewed_wizard(
        &args.input,
        &args.plan,
        &args.schema,
        &args.staging,
        ImportOptions::default(),
    )?;
    let Some(preview) = wizard.preview() else {
        bail!("No preview was generated for {:?}", args.input);
    };
    print!("{}", preview.render(&args.display.options()));
    Ok(())
}

fn handle_import(args: &cli::ImportArgs) -> Result<()> {
    let mut wizard = previewed_wizard(
        &args.input,
        &args.plan,
        &args.schema,
        &args.staging,
        args.options(),
    )?;
    let mut sink: Box<dyn RecordSink> = match &args.output_dir {
        Some(dir) if !args.dry_run => {
            info!("Writing collections to {dir:?}");
            Box::new(NdjsonSink::new(dir.clone()))
        }
        _ => {
            info!("Dry run: nothing will be written");
            Box::new(DryRunSink::new())
        }
    };
    let status = wizard.run_import(sink.as_mut())?.status;
    wizard.advance()?;
    if let Some(outcome) = wizard.outcome() {
        print!("{}", outcome.render());
    }
    if status == ImportStatus::Failure {
        bail!("Import failed: no mapped table produced any written records");
    }
    Ok(())
}
