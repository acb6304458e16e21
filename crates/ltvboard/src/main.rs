//! ltvboard - Customer lifetime value analytics for e-commerce order exports

mod cli;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use cli::CliError;
use ltvboard_core::analytics::AnalyticsData;
use ltvboard_core::models::{CustomerAggregate, ItemMaster};
use ltvboard_core::parsers::{read_customer_summaries, CsvIngest};
use ltvboard_core::error::{ErrorSeverity, LoadError};
use ltvboard_core::{export_view, AnalysisConfig, DataStore, ExportFormat, ExportKind, LoadReport};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "ltvboard",
    version,
    about = "Customer lifetime value analytics for e-commerce order exports",
    long_about = "Imports order CSV exports with unknown column layouts and derives customer\n\
                  lifetime-value analytics from them.\n\
                  \n\
                  Columns are recognized by header name (Japanese and English) or by content.\n\
                  Imported orders persist in the data directory and accumulate across imports.\n\
                  \n\
                  Examples:\n\
                    ltvboard import orders.csv           # Add an export to the store\n\
                    ltvboard summary                     # Headline figures and LTV metrics\n\
                    ltvboard monthly --year 2024         # Monthly revenue for one year\n\
                    ltvboard rfm --cell 0,5              # Customers in one RFM cell\n\
                    ltvboard routes                      # Top golden purchase routes\n\
                    ltvboard analyze orders.csv          # One-shot analysis, nothing stored\n\
                    ltvboard export monthly out.csv      # Write a view to disk\n\
                  \n\
                  Environment Variables:\n\
                    LTVBOARD_DATA_DIR                    # Override data directory\n\
                    LTVBOARD_ANCHOR_DATE                 # Reference date for recency (YYYY-MM-DD)\n\
                    LTVBOARD_FORMAT                      # Force output format: json|table\n\
                    LTVBOARD_NO_COLOR                    # Disable ANSI colors (log-friendly)\n\
                    RUST_LOG                             # Log filter (default: warn)"
)]
struct Cli {
    #[command(subcommand)]
    mode: Mode,

    /// Data directory holding the order store and ltvboard.toml
    #[arg(long, env = "LTVBOARD_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Reference date for recency (overrides ltvboard.toml)
    #[arg(long, env = "LTVBOARD_ANCHOR_DATE")]
    anchor_date: Option<NaiveDate>,

    /// Force output format (json|table)
    #[arg(long, env = "LTVBOARD_FORMAT", value_parser = ["json", "table"])]
    format: Option<String>,

    /// Disable ANSI colors (log-friendly)
    #[arg(long, env = "LTVBOARD_NO_COLOR")]
    no_color: bool,
}

#[derive(Subcommand)]
enum Mode {
    /// Import order CSV files into the store
    Import {
        /// CSV files to import
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Analyze a CSV file without touching the store
    Analyze {
        /// Order CSV, or per-customer summary CSV with --customers
        file: PathBuf,

        /// Treat the file as a per-customer summary export
        #[arg(long)]
        customers: bool,
    },
    /// Show headline figures and LTV metrics
    Summary,
    /// Show monthly revenue, customers and repeat rate
    Monthly {
        /// Restrict to one year (YYYY)
        #[arg(long)]
        year: Option<String>,
    },
    /// Show revenue and LTV by acquisition day
    Daily,
    /// Show yearly revenue and average LTV
    Yearly,
    /// Show the 6x6 recency/frequency grid
    Rfm {
        /// List the members of one cell (R,F with both 0-5)
        #[arg(long)]
        cell: Option<String>,
    },
    /// Show top golden purchase routes
    Routes,
    /// Show the item ranking
    Items,
    /// List customers by lifetime value
    Customers {
        /// Maximum number of customers to show
        #[arg(long, short = 'n', default_value = "20")]
        limit: usize,
    },
    /// Set a display name for an item code
    RenameItem {
        /// Item code as it appears in the data
        code: String,
        /// Display name to use in routes and rankings
        name: String,
    },
    /// Delete every stored order and item name
    Reset {
        /// Confirm the reset
        #[arg(long)]
        yes: bool,
    },
    /// Write one view to a CSV or JSON file
    Export {
        /// View: customers, monthly, daily, yearly, routes, items or rfm
        kind: String,
        /// Output file
        path: PathBuf,
        /// Write JSON instead of CSV
        #[arg(long)]
        json: bool,
    },
}

/// Flags shared by every command handler
struct RunContext {
    data_dir: PathBuf,
    config: AnalysisConfig,
    json: bool,
    no_color: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .with_ansi(!cli.no_color)
        .init();

    let data_dir = cli
        .data_dir
        .or_else(|| dirs::data_dir().map(|d: PathBuf| d.join("ltvboard")))
        .context("Could not determine data directory")?;

    let mut config = AnalysisConfig::load(&data_dir);
    if let Some(anchor) = cli.anchor_date {
        config = config.with_anchor_date(anchor);
    }
    config.validate()?;

    let ctx = RunContext {
        data_dir,
        config,
        json: cli.format.as_deref() == Some("json"),
        no_color: cli.no_color,
    };

    let result = match cli.mode {
        Mode::Import { files } => run_import(&ctx, files).await,
        Mode::Analyze { file, customers } => run_analyze(&ctx, &file, customers).await,
        Mode::Summary => run_view(&ctx, |data, ctx| cli::format_summary(data, ctx.json)),
        Mode::Monthly { year } => run_view(&ctx, |data, ctx| match &year {
            Some(year) => {
                let points = data.monthly.for_year(year);
                cli::format_monthly(&data.monthly, &points, ctx.json, ctx.no_color)
            }
            None => cli::format_monthly(&data.monthly, &data.monthly.points, ctx.json, ctx.no_color),
        }),
        Mode::Daily => run_view(&ctx, |data, ctx| {
            cli::format_daily(&data.daily, ctx.json, ctx.no_color)
        }),
        Mode::Yearly => run_view(&ctx, |data, ctx| {
            cli::format_yearly(&data.yearly, ctx.json, ctx.no_color)
        }),
        Mode::Rfm { cell } => run_rfm(&ctx, cell.as_deref()),
        Mode::Routes => run_view(&ctx, |data, ctx| {
            cli::format_routes(&data.routes, ctx.json, ctx.no_color)
        }),
        Mode::Items => run_view(&ctx, |data, ctx| {
            cli::format_items(&data.items, ctx.json, ctx.no_color)
        }),
        Mode::Customers { limit } => run_view(&ctx, |data, ctx| {
            cli::format_customers(&data.top_customers(limit), ctx.json, ctx.no_color)
        }),
        Mode::RenameItem { code, name } => run_rename_item(&ctx, &code, &name),
        Mode::Reset { yes } => run_reset(&ctx, yes),
        Mode::Export { kind, path, json } => run_export(&ctx, &kind, &path, json),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Open the session and print what went wrong while reading the store
fn open_store(ctx: &RunContext) -> (DataStore, LoadReport) {
    let store = DataStore::new(ctx.config.clone(), &ctx.data_dir);
    let report = store.load();
    for error in &report.errors {
        match error.severity {
            ErrorSeverity::Warning => tracing::warn!(source = %error.source, "{}", error.message),
            _ => eprintln!("{}", cli::format_load_error(error)),
        }
    }
    (store, report)
}

/// Like [`open_store`], but refuses to work on a store that could not be read
fn load_store(ctx: &RunContext) -> Result<DataStore, CliError> {
    let (store, report) = open_store(ctx);
    if report.has_fatal_errors() {
        return Err(CliError::StoreUnreadable);
    }
    Ok(store)
}

/// Load the store, compute analytics and print one rendered view
fn run_view<F>(ctx: &RunContext, render: F) -> Result<(), CliError>
where
    F: FnOnce(&AnalyticsData, &RunContext) -> String,
{
    let store = load_store(ctx)?;
    let data = store.analytics();
    println!("{}", render(&data, ctx));
    Ok(())
}

async fn run_import(ctx: &RunContext, files: Vec<PathBuf>) -> Result<(), CliError> {
    let store = load_store(ctx)?;
    let mut total = LoadReport::new();
    let mut failed = 0;

    for file in &files {
        let source = file.display().to_string();
        match store.import_csv(file).await {
            Ok(report) => {
                println!("{}", cli::format_load_report(&source, &report));
                let (_, errors, fatal) = report.error_count();
                if errors + fatal > 0 {
                    failed += 1;
                }
                total.merge(report);
            }
            Err(e) => {
                failed += 1;
                eprintln!("{}:", source);
                eprintln!("{}", cli::format_load_error(&LoadError::from_core_error(source.as_str(), &e)));
            }
        }
    }

    println!();
    if files.len() > 1 {
        println!(
            "Total: {} rows read, {} admitted, {} dropped",
            cli::format_count(total.rows_read),
            cli::format_count(total.records_admitted),
            cli::format_count(total.records_dropped)
        );
    }
    println!(
        "Store now holds {} records ({} customers)",
        cli::format_count(store.record_count()),
        cli::format_count(store.analytics().metrics.customer_count)
    );

    if failed > 0 {
        return Err(CliError::ImportFailed {
            failed,
            total: files.len(),
        });
    }
    Ok(())
}

async fn run_analyze(ctx: &RunContext, file: &Path, customers: bool) -> Result<(), CliError> {
    let data = if customers {
        let handle = std::fs::File::open(file)
            .with_context(|| format!("Failed to open {}", file.display()))?;
        let summaries: Vec<CustomerAggregate> = read_customer_summaries(handle)
            .with_context(|| format!("Failed to parse {}", file.display()))?
            .into_iter()
            .map(CustomerAggregate::from_summary)
            .collect();
        AnalyticsData::from_customers(summaries, &[], &ItemMaster::new(), &ctx.config)
    } else {
        let outcome = CsvIngest::ingest_file(file).await?;
        if !ctx.json {
            println!("{}", cli::format_load_report(&file.display().to_string(), &outcome.report));
            println!();
        }
        AnalyticsData::compute(&outcome.records, &ItemMaster::new(), &ctx.config)
    };

    println!("{}", cli::format_summary(&data, ctx.json));
    Ok(())
}

fn run_rfm(ctx: &RunContext, cell: Option<&str>) -> Result<(), CliError> {
    let address = cell.map(cli::parse_cell).transpose()?;

    let store = load_store(ctx)?;
    let data = store.analytics();

    match address {
        Some((r, f)) => {
            let cell = data.rfm.cell(r, f).ok_or_else(|| CliError::InvalidArgument {
                message: format!("No RFM cell at {},{}", r, f),
            })?;
            println!("{}", cli::format_rfm_cell(cell, ctx.json, ctx.no_color));
        }
        None => println!("{}", cli::format_rfm_grid(&data.rfm, ctx.json, ctx.no_color)),
    }
    Ok(())
}

fn run_rename_item(ctx: &RunContext, code: &str, name: &str) -> Result<(), CliError> {
    let store = load_store(ctx)?;
    store.rename_item(code, name)?;
    println!("{} -> {}", code, name);
    Ok(())
}

fn run_reset(ctx: &RunContext, yes: bool) -> Result<(), CliError> {
    if !yes {
        return Err(CliError::InvalidArgument {
            message: "Reset deletes every stored order; re-run with --yes to confirm".to_string(),
        });
    }

    // Tolerates an unreadable store: wiping is how it gets rebuilt
    let (store, _) = open_store(ctx);
    let removed = store.record_count();
    store.wipe()?;
    println!("Removed {} records", cli::format_count(removed));
    Ok(())
}

fn run_export(ctx: &RunContext, kind: &str, path: &Path, json: bool) -> Result<(), CliError> {
    let kind: ExportKind = kind.parse()?;
    let format = if json { ExportFormat::Json } else { ExportFormat::Csv };

    let store = load_store(ctx)?;
    let data = store.analytics();
    if data.is_empty() {
        return Err(CliError::NoData);
    }

    export_view(&data, kind, format, path)?;
    println!("Wrote {} to {}", kind.as_str(), path.display());
    Ok(())
}
