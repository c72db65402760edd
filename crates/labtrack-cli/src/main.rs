use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::builder::RangedU64ValueParser;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use labtrack_core::models::DEFAULT_PREFIX;
use labtrack_core::sequence::DEFAULT_MAX_ATTEMPTS;
use labtrack_core::{
    AllocationStrategy, AllocatorConfig, CatalogEntry, Database, MigrationConfig,
    MigrationRunner, NewOrder, OrderBook, TestLineItem,
};

#[derive(Parser)]
#[command(name = "labtrack")]
#[command(about = "Lab order identifiers and test record normalization")]
struct Cli {
    /// SQLite database file
    #[arg(long, global = true, env = "LABTRACK_DATABASE", default_value = "labtrack.db")]
    database: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Normalize the test line items of every order (default)
    Migrate {
        /// Orders fetched per page and between checkpoints
        #[arg(
            long,
            default_value_t = labtrack_core::migration::DEFAULT_PAGE_SIZE,
            value_parser = RangedU64ValueParser::<usize>::new().range(1..)
        )]
        page_size: usize,
        /// Report what would change without writing
        #[arg(long)]
        dry_run: bool,
        /// Continue an interrupted run from its checkpoint
        #[arg(long)]
        resume: bool,
        /// Print the full report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Create an order with a same-day sequential identifier
    CreateOrder {
        /// Test names to order
        #[arg(required = true)]
        tests: Vec<String>,
        /// Identifier allocation strategy
        #[arg(long, value_enum, default_value_t = StrategyArg::Cas)]
        strategy: StrategyArg,
        /// Identifier prefix
        #[arg(long, env = "LABTRACK_PREFIX", default_value = DEFAULT_PREFIX)]
        prefix: String,
    },
    /// Load test catalog entries from a JSON array file
    ImportCatalog {
        /// Path to the catalog JSON
        path: PathBuf,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum StrategyArg {
    /// Read the latest order and add one
    ReadLatest,
    /// Insert only if the identifier is free, retrying otherwise
    Cas,
    /// Draw from an atomic per-day counter
    Ticket,
}

impl From<StrategyArg> for AllocationStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::ReadLatest => AllocationStrategy::ReadLatest,
            StrategyArg::Cas => AllocationStrategy::CompareAndSwap {
                max_attempts: DEFAULT_MAX_ATTEMPTS,
            },
            StrategyArg::Ticket => AllocationStrategy::Ticket,
        }
    }
}

fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("labtrack=info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %format!("{err:#}"), "labtrack failed");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let mut db = Database::open(&cli.database)
        .with_context(|| format!("cannot open database {}", cli.database.display()))?;

    match cli.command {
        None => migrate(&db, MigrationConfig::default(), false),
        Some(Commands::Migrate {
            page_size,
            dry_run,
            resume,
            json,
        }) => {
            let config = MigrationConfig {
                page_size,
                dry_run,
                resume,
            };
            migrate(&db, config, json)
        }
        Some(Commands::CreateOrder {
            tests,
            strategy,
            prefix,
        }) => {
            let config = AllocatorConfig {
                prefix,
                strategy: strategy.into(),
            };
            let tests = tests.into_iter().map(TestLineItem::Unresolved).collect();
            let order = OrderBook::new(&db, config).create_order(NewOrder::new(tests))?;
            println!("{}", order.order_id);
            Ok(())
        }
        Some(Commands::ImportCatalog { path }) => import_catalog(&mut db, &path),
    }
}

fn migrate(db: &Database, config: MigrationConfig, json: bool) -> anyhow::Result<()> {
    let report = MigrationRunner::new(db, config).run()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    println!("{}", report.summary_line());
    Ok(())
}

fn import_catalog(db: &mut Database, path: &Path) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read catalog file {}", path.display()))?;
    let entries: Vec<CatalogEntry> = serde_json::from_str(&raw)
        .with_context(|| format!("invalid catalog file {}", path.display()))?;

    let imported = db.import_catalog(&entries)?;
    tracing::info!(imported, "catalog imported");
    println!("Imported {} catalog entries.", imported);
    Ok(())
}
