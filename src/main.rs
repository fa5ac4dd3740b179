use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use clue_extract::{
    extract_demographics, load_record_files, logging, reconcile_purchases, stack_tables,
    unify_timeline, write_csv_file, CsvRow, EngineError, ExportKind, ExtractConfig, Extraction,
    FailurePolicy, LoadReport, LocationFilter, RecordTable, VERSION,
};

#[derive(Parser)]
#[command(name = "clue-extract", version, about = "Panel JSON → analysis-ready CSV extracts")]
struct Cli {
    /// TOML config file (defaults apply when omitted)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ExtractArgs {
    /// Input JSON files
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Regions to keep (repeatable)
    #[arg(short, long = "location")]
    locations: Vec<String>,

    /// Directory for the exported CSV
    #[arg(short, long)]
    out_dir: Option<PathBuf>,

    /// Drop broken records instead of aborting the batch
    #[arg(long)]
    isolate: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarise input files
    Inspect {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// One demographic row per person
    Demographics {
        #[command(flatten)]
        args: ExtractArgs,
    },
    /// Purchases from a given year, tagged with concurrent life events
    Purchases {
        #[command(flatten)]
        args: ExtractArgs,

        /// First purchase year to include
        #[arg(short = 'y', long)]
        min_year: Option<i64>,

        #[arg(short, long)]
        price_file: Option<PathBuf>,
    },
    /// Unified life-event timeline per person
    Timeline {
        #[command(flatten)]
        args: ExtractArgs,

        #[arg(short, long)]
        price_file: Option<PathBuf>,
    },
    /// Concatenate raw record tables into one CSV
    Stack {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        #[arg(long)]
        out: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.log_json);

    let mut config = match &cli.config {
        Some(path) => ExtractConfig::from_file(path)?,
        None => ExtractConfig::default(),
    };
    info!(version = VERSION, "clue-extract starting");

    match cli.command {
        Commands::Inspect { files } => run_inspect(&config, &files),
        Commands::Demographics { args } => {
            apply_args(&mut config, &args);
            let tables = load_tables(&config, &args.files)?;
            let out = extract_demographics(&config, &tables)?;
            export(&config, &tables, ExportKind::Demographics, out)
        }
        Commands::Purchases {
            args,
            min_year,
            price_file,
        } => {
            apply_args(&mut config, &args);
            if let Some(year) = min_year {
                config.min_year = year;
            }
            if let Some(path) = price_file {
                config.price_file = path;
            }
            let tables = load_tables(&config, &args.files)?;
            let out = reconcile_purchases(&config, &tables)?;
            let kind = ExportKind::Purchases {
                min_year: config.min_year,
            };
            export(&config, &tables, kind, out)
        }
        Commands::Timeline { args, price_file } => {
            apply_args(&mut config, &args);
            if let Some(path) = price_file {
                config.price_file = path;
            }
            let tables = load_tables(&config, &args.files)?;
            let out = unify_timeline(&config, &tables)?;
            export(&config, &tables, ExportKind::Timeline, out)
        }
        Commands::Stack { files, out } => run_stack(&config, &files, &out),
    }
}

fn apply_args(config: &mut ExtractConfig, args: &ExtractArgs) {
    if !args.locations.is_empty() {
        config.locations = LocationFilter::new(args.locations.iter().cloned());
    }
    if let Some(dir) = &args.out_dir {
        config.output_dir = dir.clone();
    }
    if args.isolate {
        config.failure_policy = FailurePolicy::Isolate;
    }
    if config.locations.is_empty() {
        warn!("location filter is empty; region-filtered extracts will be empty");
    }
}

fn load_tables(config: &ExtractConfig, files: &[PathBuf]) -> Result<Vec<RecordTable>> {
    let LoadReport { tables, skipped } = load_record_files(files, &config.registry());
    if tables.is_empty() {
        bail!("No valid JSON files were loaded ({} skipped)", skipped.len());
    }
    info!(loaded = tables.len(), skipped = skipped.len(), "input files ready");
    Ok(tables)
}

fn report<R>(out: &Extraction<R>) {
    for warning in &out.warnings {
        warn!("{}", warning);
    }
    for failure in &out.failures {
        warn!(
            source = %failure.source,
            record_index = failure.record_index,
            "record dropped: {}",
            failure.error
        );
    }
}

fn export<R: CsvRow>(
    config: &ExtractConfig,
    tables: &[RecordTable],
    kind: ExportKind,
    out: Extraction<R>,
) -> Result<()> {
    report(&out);

    // Exports are named after the first selected file
    let short = tables
        .first()
        .map(|t| t.source.short())
        .unwrap_or_else(|| "extract".to_string());
    let path = kind.path_in(&config.output_dir, &short);

    write_csv_file(&path, &out.rows)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("{} → {}", out.summary(), path.display());
    Ok(())
}

fn run_inspect(config: &ExtractConfig, files: &[PathBuf]) -> Result<()> {
    let LoadReport { tables, skipped } = load_record_files(files, &config.registry());

    for table in &tables {
        let lacks = if table.profile.lacks.is_empty() {
            "-".to_string()
        } else {
            table.profile.lacks.join(",")
        };
        println!(
            "{}  source={} records={} lacks={}",
            table.source.file_name(),
            table.source.qualified(),
            table.len(),
            lacks
        );
        println!("    columns: {}", table.columns().join(", "));
    }
    for err in &skipped {
        if let EngineError::Parse { file, reason } = err {
            println!("{}  skipped: {}", file, reason);
        }
    }
    Ok(())
}

fn run_stack(config: &ExtractConfig, files: &[PathBuf], out: &Path) -> Result<()> {
    let tables = load_tables(config, files)?;
    let stacked = stack_tables(&tables);

    let file = File::create(out).with_context(|| format!("Failed to create {}", out.display()))?;
    stacked.write_csv(BufWriter::new(file))?;
    println!("{} rows → {}", stacked.rows.len(), out.display());
    Ok(())
}
