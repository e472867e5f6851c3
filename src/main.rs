use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use clap::{Parser, Subcommand};

use checksuite::catalog;
use checksuite::config::Config;
use checksuite::engine::{Engine, ExecutorRegistry, RunMode, StatusTracker};
use checksuite::report::ReportGenerator;
use checksuite::scheduler::{RunRequest, RunScheduler};
use checksuite::storage;

#[derive(Parser)]
#[command(
    name = "checksuite",
    about = "Scheduled regression-check runner for UI and API test suites",
    version,
    long_about = None
)]
struct Cli {
    /// Path to a TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database path (overrides the config file)
    #[arg(long, global = true)]
    db: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the daemon (API server + recurring trigger + run engine)
    Serve {
        /// Bind address (overrides the config file)
        #[arg(long)]
        bind: Option<String>,
    },

    /// Execute a suite or explicit case ids once and print the outcome
    Run {
        /// Suite id: BLAZE_SMOKE, REQRES_SMOKE, or COMBINED_SMOKE
        #[arg(long)]
        suite: Option<String>,

        /// Explicit catalog ids, comma separated (wins over --suite)
        #[arg(long, value_delimiter = ',')]
        ids: Vec<i64>,

        /// Execution mode: sequential or parallel
        #[arg(long, default_value = "sequential")]
        mode: String,

        /// Worker cap for parallel mode
        #[arg(long)]
        max_parallel: Option<usize>,

        /// Run UI checks headless (overrides the config file)
        #[arg(long)]
        headless: Option<bool>,
    },

    /// Inspect or seed the test-case catalog
    Catalog {
        #[command(subcommand)]
        action: CatalogAction,
    },

    /// Generate a report for a finished run
    Report {
        /// Execution id
        execution_id: String,

        /// Report format: html, csv, or log
        #[arg(long, default_value = "html")]
        format: String,
    },
}

#[derive(Subcommand)]
enum CatalogAction {
    /// List all catalog entries
    List,

    /// Seed the standard checks into an empty catalog
    Seed,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default(),
    };
    if let Some(db) = cli.db {
        config.database.path = db;
    }

    // Initialize tracing; RUST_LOG wins over the configured level
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.logging.level.clone())),
        )
        .init();

    match cli.command {
        Commands::Serve { bind } => {
            if let Some(bind) = bind {
                config.server.bind = bind;
            }
            tracing::info!(bind = %config.server.bind, "Starting checksuite daemon");
            checksuite::serve(config).await?;
        }
        Commands::Run {
            suite,
            ids,
            mode,
            max_parallel,
            headless,
        } => {
            let mode = RunMode::parse(&mode)
                .ok_or_else(|| anyhow!("mode must be 'sequential' or 'parallel'"))?;
            run_once(&config, suite, ids, mode, max_parallel, headless).await?;
        }
        Commands::Catalog { action } => {
            let pool = storage::open_pool(&config.database.path)?;
            match action {
                CatalogAction::List => {
                    let cases = storage::list_cases(&pool)?;
                    if cases.is_empty() {
                        println!("Catalog is empty. Run 'checksuite catalog seed' first.");
                    } else {
                        println!("{:<5} | {:<40} | {:<5} | Status", "ID", "Name", "Kind");
                        println!("{:-<5}-|-{:-<40}-|-{:-<5}-|-{:-<8}", "", "", "", "");
                        for case in cases {
                            println!(
                                "{:<5} | {:<40} | {:<5} | {}",
                                case.id,
                                case.name,
                                case.kind.as_str(),
                                case.status.as_str()
                            );
                        }
                    }
                }
                CatalogAction::Seed => {
                    let created = catalog::seed::seed(&pool)?;
                    println!("Seeded {created} test cases.");
                }
            }
        }
        Commands::Report {
            execution_id,
            format,
        } => {
            let pool = storage::open_pool(&config.database.path)?;
            let generator = ReportGenerator::new(pool, PathBuf::from(&config.reports.dir));
            let report = match format.as_str() {
                "html" => generator.html(&execution_id)?,
                "csv" => generator.csv(&execution_id)?,
                "log" => generator.log(&execution_id)?,
                other => bail!("unknown report format '{other}' (expected html, csv, or log)"),
            };
            println!("Report written to {}", report.path.display());
        }
    }

    Ok(())
}

/// Submit one run, wait for it to finish, and print a result table.
async fn run_once(
    config: &Config,
    suite: Option<String>,
    ids: Vec<i64>,
    mode: RunMode,
    max_parallel: Option<usize>,
    headless: Option<bool>,
) -> Result<()> {
    let pool = storage::open_pool(&config.database.path)?;
    catalog::seed::seed(&pool)?;

    let registry = Arc::new(ExecutorRegistry::standard());
    let notifier = checksuite::alert::from_config(&pool, &config.alerts);
    let tracker = Arc::new(StatusTracker::new(pool.clone()));
    let engine = Arc::new(Engine::new(
        pool.clone(),
        registry,
        notifier.clone(),
        tracker.clone(),
    ));
    let scheduler = RunScheduler::new(
        pool,
        engine,
        tracker.clone(),
        notifier,
        config.exec_options(),
        PathBuf::from(&config.artifacts.dir),
    );

    let request = RunRequest {
        test_case_ids: ids,
        suite_id: suite,
        mode,
        max_parallel_tests: max_parallel,
        headless,
        ..Default::default()
    };
    let execution_id = scheduler.submit(request).await?;

    let status = loop {
        tokio::time::sleep(Duration::from_millis(200)).await;
        match tracker.get(&execution_id).await {
            Some(status) if status.record.state.is_terminal() => break status,
            Some(_) => continue,
            None => bail!("run {execution_id} disappeared from the status tracker"),
        }
    };

    println!("\nRun {} finished: {}", execution_id, status.record.state);
    println!("{:<40} | {:<8} | Message", "Test Case", "Status");
    println!("{:-<40}-|-{:-<8}-|-{:-<40}", "", "", "");
    for result in &status.results {
        println!(
            "{:<40} | {:<8} | {}",
            result.case_name,
            result.status.to_string(),
            result.message
        );
    }

    let failed = status.record.failed_tests.unwrap_or(0);
    println!(
        "\nTotal: {}  Passed: {}  Failed: {}",
        status.record.total_tests.unwrap_or(0),
        status.record.passed_tests.unwrap_or(0),
        failed
    );
    if let Some(error) = &status.record.error_message {
        bail!("run failed: {error}");
    }
    if failed > 0 {
        bail!("{failed} checks failed");
    }
    Ok(())
}
