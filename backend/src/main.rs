//! Starload CLI - load order extracts into a star schema
//!
//! # Main Commands
//!
//! ```bash
//! starload run --bucket ./uploads --name ordersdf.csv     # Full ETL run for one upload
//! starload run --event '{"bucket":"./uploads","name":"ordersdf.csv"}'
//! ```
//!
//! # Debug Commands (for development)
//!
//! ```bash
//! starload preview ./uploads                    # Build the star schema without loading it
//! starload preview ./uploads --table sales_fact # Show the first rows of one table
//! starload parse ordersdf.csv                   # Just parse CSV to JSON
//! ```

use clap::{Parser, Subcommand};
use starload::logs::{LogLevel, LOG_BROADCASTER};
use starload::{
    build_star_schema, extract, format_delimiter, parse_csv_file, run, DirectorySink,
    DirectorySource, OutputFormat, PipelineOptions, TriggerEvent, WarehouseConfig,
};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "starload")]
#[command(about = "Load order extracts into a star schema warehouse", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the ETL pipeline for one uploaded file
    Run {
        /// Trigger event as JSON: {"bucket": "<dir>", "name": "<file>"}
        #[arg(long, conflicts_with_all = ["bucket", "name"], required_unless_present = "bucket")]
        event: Option<String>,

        /// Directory holding the input files
        #[arg(short, long, requires = "name")]
        bucket: Option<PathBuf>,

        /// Name of the uploaded file
        #[arg(short, long, requires = "bucket")]
        name: Option<String>,

        /// Warehouse root directory (default: $STARLOAD_WAREHOUSE_DIR or ./warehouse)
        #[arg(short, long)]
        warehouse: Option<PathBuf>,

        /// Dataset to load into (default: $STARLOAD_DATASET_ID or etl_output)
        #[arg(long)]
        dataset: Option<String>,

        /// Output table format (default: $STARLOAD_OUTPUT_FORMAT or csv)
        #[arg(short, long, value_enum)]
        format: Option<OutputFormat>,

        /// Input CSV delimiter (auto-detect if not specified)
        #[arg(short, long)]
        delimiter: Option<char>,
    },

    /// Build the star schema from a directory and show it, without loading
    Preview {
        /// Directory holding the input files
        input: PathBuf,

        /// Show rows of this table (output or feature table)
        #[arg(short, long)]
        table: Option<String>,

        /// Number of rows to show
        #[arg(short, long, default_value = "10")]
        limit: usize,

        /// Input CSV delimiter (auto-detect if not specified)
        #[arg(short, long)]
        delimiter: Option<char>,
    },

    /// Parse a CSV file and output JSON
    Parse {
        /// Input CSV file
        input: PathBuf,

        /// CSV delimiter (auto-detect if not specified)
        #[arg(short, long)]
        delimiter: Option<char>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            event,
            bucket,
            name,
            warehouse,
            dataset,
            format,
            delimiter,
        } => {
            let config = WarehouseConfig::from_env();
            let config = WarehouseConfig {
                root: warehouse.unwrap_or(config.root),
                dataset_id: dataset.unwrap_or(config.dataset_id),
                format: format.unwrap_or(config.format),
            };
            cmd_run(event, bucket, name, config, delimiter).await
        }

        Commands::Preview {
            input,
            table,
            limit,
            delimiter,
        } => cmd_preview(&input, table.as_deref(), limit, delimiter).await,

        Commands::Parse {
            input,
            delimiter,
            output,
        } => cmd_parse(&input, delimiter, output.as_deref()),
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

async fn cmd_run(
    event: Option<String>,
    bucket: Option<PathBuf>,
    name: Option<String>,
    config: WarehouseConfig,
    delimiter: Option<char>,
) -> Result<(), Box<dyn std::error::Error>> {
    let event = match (event, bucket, name) {
        (Some(json), _, _) => TriggerEvent::from_json(&json)?,
        (None, Some(bucket), Some(name)) => TriggerEvent::new(bucket.to_string_lossy(), name),
        _ => return Err("either --event or both --bucket and --name are required".into()),
    };

    eprintln!("📦 Warehouse: {} ({})", config.root.display(), config.dataset_id);

    let source = DirectorySource::new(&event.bucket);
    let sink = DirectorySink::from_config(&config);
    let options = PipelineOptions { delimiter };

    let mut logs = LOG_BROADCASTER.subscribe();
    let report = run(&event, &source, &sink, &options).await;

    let mut warnings = 0;
    while let Ok(entry) = logs.try_recv() {
        if entry.level == LogLevel::Warning {
            warnings += 1;
        }
    }

    println!("{}", serde_json::to_string_pretty(&report)?);

    if report.is_success() {
        for table in &report.tables {
            let path = sink.table_path(&table.name);
            eprintln!("   {} -> {}", config.table_id(&table.name), path.display());
        }
        if warnings > 0 {
            eprintln!("⚠️  Completed with {} warning(s)", warnings);
        }
        eprintln!("\n✨ Done!");
        Ok(())
    } else {
        std::process::exit(1);
    }
}

async fn cmd_preview(
    input: &Path,
    table: Option<&str>,
    limit: usize,
    delimiter: Option<char>,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("🔎 Previewing: {}", input.display());

    let source = DirectorySource::new(input);
    let data = extract(&source, delimiter).await?;
    let schema = build_star_schema(&data)?;

    match table {
        Some(name) => {
            let table = schema
                .table(name)
                .ok_or_else(|| format!("Unknown table: {}", name))?;
            let rows: Vec<_> = table.records().into_iter().take(limit).collect();
            eprintln!("   {} of {} rows", rows.len(), table.len());
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        None => {
            for (name, table) in schema.tables().into_iter().chain(schema.features.tables()) {
                println!("  📄 {} ({} rows)", name, table.len());
                println!("     Columns: {}", table.columns.join(", "));
            }
        }
    }

    Ok(())
}

fn cmd_parse(
    input: &Path,
    delimiter: Option<char>,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Parsing CSV: {}", input.display());

    let result = parse_csv_file(input, delimiter)?;

    eprintln!("   Encoding: {}", result.encoding);
    eprintln!(
        "   Delimiter: '{}'{}",
        format_delimiter(result.delimiter),
        if delimiter.is_none() { " (auto-detected)" } else { "" }
    );
    eprintln!("   Columns: {}", result.headers.join(", "));
    eprintln!("✅ Parsed {} records", result.rows.len());

    let json = serde_json::to_string_pretty(&result.records())?;
    write_output(&json, output)?;

    Ok(())
}

fn write_output(content: &str, path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            eprintln!("💾 Output written to: {}", p.display());
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}
