use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use quarry_compile::{load_models, MacroRegistry};
use quarry_core::{format_elapsed, Config, Model, ModelStatus, RunReport};
use quarry_engine::{DuckDbEngine, Executor, QueryEngine};
use quarry_graph::{plan, write_svg, DependencyGraph};

const DEFAULT_CONFIG: &str = "quarry.yaml";

/// Quarry - SQL pipeline orchestrator for a local analytical store
#[derive(Parser)]
#[command(name = "quarry")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file (default: quarry.yaml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Discover, plan, and execute the full pipeline
    Run,

    /// Build the dependency graph and write it as an SVG diagram
    Viz {
        /// Output path for the rendered diagram
        output: PathBuf,
    },

    /// Execute raw SQL script files verbatim
    RunFile {
        /// Paths of script files to execute
        paths: Vec<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if cli.verbose { "debug" } else { "warn" }));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli
        .config
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG));
    let config = Config::from_file(&config_path)
        .with_context(|| format!("cannot load config file {}", config_path.display()))?;

    match cli.command {
        Commands::Run => run_command(&config).await,
        Commands::Viz { output } => viz_command(&config, &output),
        Commands::RunFile { paths } => run_file_command(&config, &paths).await,
    }
}

/// Load macros and models, returning the compiled model set.
fn compile_project(config: &Config) -> Result<Vec<Model>> {
    let mut registry = MacroRegistry::new();
    if let Some(macros_path) = config.macros_path() {
        if macros_path.is_dir() {
            let defined = registry.load_dir(&macros_path)?;
            tracing::debug!(count = defined, "loaded macros");
        }
    }

    let models = load_models(&config.models_path(), &registry)?;
    println!(
        "Found {} model{}, {} macro{}",
        models.len(),
        plural(models.len()),
        registry.len(),
        plural(registry.len()),
    );
    Ok(models)
}

async fn run_command(config: &Config) -> Result<()> {
    let mut models = compile_project(config)?;
    let graph = DependencyGraph::build(&mut models)?;
    let execution_plan = plan(&graph)?;

    let engine = DuckDbEngine::open(
        &config.database_path(),
        config.workers,
        &config.db_settings,
    )?;
    let executor = Executor::new(Arc::new(engine), config.workers);

    println!(
        "Start pipeline execution on {}\n",
        chrono::Local::now().format("%Y-%m-%d")
    );
    let report = executor.execute(&execution_plan, &graph, &mut models).await?;
    print_report(&report);

    if !report.is_success() {
        std::process::exit(1);
    }
    Ok(())
}

fn viz_command(config: &Config, output: &Path) -> Result<()> {
    let mut models = compile_project(config)?;
    let graph = DependencyGraph::build(&mut models)?;
    write_svg(&graph, &models, output)?;
    println!("Dependency diagram written to {}", output.display());
    Ok(())
}

async fn run_file_command(config: &Config, paths: &[PathBuf]) -> Result<()> {
    let engine = DuckDbEngine::open(
        &config.database_path(),
        config.workers,
        &config.db_settings,
    )?;

    for path in paths {
        match std::fs::read_to_string(path) {
            Ok(contents) => {
                print!("Running {}... ", path.display());
                std::io::stdout().flush().ok();
                match engine.execute_batch(&contents).await {
                    Ok(()) => println!("{}", "OK".green()),
                    Err(e) => println!("{}: {}\nSkipping {}", "ERROR".red(), e, path.display()),
                }
            }
            Err(_) => println!("Cannot open {}, skipping", path.display()),
        }
    }
    Ok(())
}

/// One line per model plus the aggregate summary, in plan order.
fn print_report(report: &RunReport) {
    let total = report.outcomes.len();
    for (nth, outcome) in report.outcomes.iter().enumerate() {
        let mut line = format!(
            "{}  {} of {}: {} {} model",
            chrono::Local::now().format("%H:%M:%S"),
            nth + 1,
            total,
            outcome.identity.blue(),
            outcome.materialization,
        );
        // pad with dots so status columns line up
        let width = 80;
        if line.len() < width {
            line.extend(std::iter::repeat('.').take(width - line.len()));
        }

        let status = match outcome.status {
            ModelStatus::Succeeded => match outcome.rows {
                Some(rows) => format!("SELECT {}", rows).green(),
                None => "OK".green(),
            },
            ModelStatus::Failed => "ERROR".red(),
            ModelStatus::Skipped => "SKIPPED".yellow(),
            // terminal statuses only; a finished run never reports these
            ModelStatus::Pending | ModelStatus::Running => "PENDING".normal(),
        };
        println!("{}[{} in {}]", line, status, format_elapsed(outcome.duration));
    }

    let failures: Vec<_> = report
        .outcomes
        .iter()
        .filter(|o| o.status == ModelStatus::Failed)
        .collect();
    if !failures.is_empty() {
        println!("\nErrors:");
        for outcome in failures {
            println!("Model : {}", outcome.identity);
            println!(
                "Error : {}\n",
                outcome.error.as_deref().unwrap_or("unknown").red()
            );
        }
    }

    println!(
        "\nPipeline completed in {} with {} succeeded, {} failed, {} skipped",
        format_elapsed(report.elapsed),
        report.count(ModelStatus::Succeeded),
        report.count(ModelStatus::Failed),
        report.count(ModelStatus::Skipped),
    );
}

fn plural(n: usize) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}
