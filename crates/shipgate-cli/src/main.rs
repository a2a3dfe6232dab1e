//! shipgate - staged change pipeline CLI
//!
//! Runs a change through BUILD, CI, REVIEW and SECURITY and decides whether
//! it may be promoted.
//!
//! ## Commands
//!
//! - `init`: Write a configuration template for a project kind
//! - `run`: Run a task through the pipeline (or `--dry-run` to show the plan)
//! - `status`: Show configuration summary and recent runs
//! - `test`: Run only CI, probe tools, or validate configuration
//! - `benchmark`: Record a benchmark delta in `ci/BENCH_SUMMARY.txt`
//! - `export-config`: Print the configuration as JSON or YAML

mod config;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, Level};

use shipgate_core::metrics::METRICS;
use shipgate_core::{render_run_report, Decision, PipelineConfig, ProjectKind, StageKind, Task};
use shipgate_pipeline::{
    parse, tool_key, CancellationFlag, CommandInvoker, JsonDirSink, Orchestrator, StageRunner,
};
use shipgate_state::{bench_summary, FileRunLog, RunLog, DEFAULT_LOG_PATH};

use crate::config::{ExportFormat, DEFAULT_CONFIG_PATH};

/// Directory receiving one JSON report per run.
const REPORTS_DIR: &str = ".shipgate/reports";

#[derive(Parser)]
#[command(name = "shipgate")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Staged change pipeline with promote/hold quality gates", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Pipeline configuration file
    #[arg(short, long, global = true, env = "SHIPGATE_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a configuration template
    Init {
        /// Project kind: rust, python, typescript or go
        #[arg(short, long)]
        project_type: ProjectKind,

        /// Project name (default: current directory name)
        #[arg(short, long)]
        name: Option<String>,

        /// Overwrite an existing configuration
        #[arg(long)]
        force: bool,
    },

    /// Run a task through the pipeline
    Run {
        /// What the change does
        description: String,

        /// Target file (repeatable)
        #[arg(short, long = "file")]
        files: Vec<PathBuf>,

        /// Show the planned stages without running anything
        #[arg(long)]
        dry_run: bool,

        /// Task identifier (default: generated)
        #[arg(long)]
        id: Option<String>,
    },

    /// Show configuration summary and recent runs
    Status {
        /// Number of recent runs to show
        #[arg(short, long, default_value = "5")]
        limit: usize,
    },

    /// Targeted checks
    Test {
        #[command(subcommand)]
        action: TestAction,
    },

    /// Record a benchmark delta (percent) for a metric
    Benchmark {
        /// Metric name, e.g. response_time
        metric: String,

        /// Signed percentage change, e.g. -2.5
        #[arg(allow_hyphen_values = true)]
        delta: f64,

        /// Summary file
        #[arg(long, default_value = bench_summary::DEFAULT_BENCH_PATH)]
        file: PathBuf,
    },

    /// Print the configuration
    ExportConfig {
        #[arg(short, long, value_enum, default_value = "json")]
        format: ExportFormat,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum TestAction {
    /// Run only the CI stage
    Ci,
    /// Check that every configured tool is installed
    Tools,
    /// Validate the configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    shipgate_core::telemetry::init_tracing(cli.json, level);

    let root = std::env::current_dir().context("Failed to resolve working directory")?;
    let result = match cli.command {
        Commands::Init {
            project_type,
            name,
            force,
        } => cmd_init(&root, &cli.config, project_type, name, force),
        Commands::Run {
            description,
            files,
            dry_run,
            id,
        } => cmd_run(&root, &cli.config, description, files, dry_run, id).await,
        Commands::Status { limit } => cmd_status(&root, &cli.config, limit).await,
        Commands::Test { action } => match action {
            TestAction::Ci => cmd_test_ci(&root, &cli.config).await,
            TestAction::Tools => cmd_test_tools(&root, &cli.config).await,
            TestAction::Config => cmd_test_config(&root, &cli.config),
        },
        Commands::Benchmark {
            metric,
            delta,
            file,
        } => cmd_benchmark(&root.join(file), &metric, delta),
        Commands::ExportConfig { format, output } => {
            cmd_export_config(&root, &cli.config, format, output.as_deref())
        }
    };

    METRICS.flush();
    result
}

fn cmd_init(
    root: &Path,
    config_path: &Path,
    kind: ProjectKind,
    name: Option<String>,
    force: bool,
) -> Result<()> {
    let path = root.join(config_path);
    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }

    let name = name
        .or_else(|| {
            root.file_name()
                .map(|n| n.to_string_lossy().into_owned())
        })
        .unwrap_or_else(|| "project".to_string());
    let template = PipelineConfig::template(kind, &name);
    config::save(&path, &template)?;

    info!(kind = %kind, path = %path.display(), "configuration written");
    println!("Initialized {kind} pipeline for {name}");
    println!("Config: {}", path.display());
    Ok(())
}

fn load_validated(root: &Path, config_path: &Path) -> Result<PipelineConfig> {
    let config = config::load(&root.join(config_path))?;
    config.validate()?;
    Ok(config)
}

async fn cmd_run(
    root: &Path,
    config_path: &Path,
    description: String,
    files: Vec<PathBuf>,
    dry_run: bool,
    id: Option<String>,
) -> Result<()> {
    let config = load_validated(root, config_path)?;

    let mut task = Task::new(description).with_targets(files);
    if let Some(id) = id {
        task = task.with_id(id);
    }

    let log = Arc::new(FileRunLog::new(root.join(DEFAULT_LOG_PATH)));
    let orchestrator = Orchestrator::new(config, Arc::new(CommandInvoker::new(root)), log)
        .with_sink(Arc::new(JsonDirSink::new(root.join(REPORTS_DIR))));

    if dry_run {
        print!("{}", orchestrator.plan(&task)?);
        return Ok(());
    }

    let cancel = CancellationFlag::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let record = orchestrator
        .run(task, &cancel)
        .await
        .context("Pipeline refused to start")?;
    print!("{}", render_run_report(&record));

    match record.decision() {
        Decision::Promote => Ok(()),
        Decision::Hold => anyhow::bail!(
            "{} held: {} blocking gate(s)",
            record.task().id,
            record.blocking_verdicts().count()
        ),
    }
}

async fn cmd_status(root: &Path, config_path: &Path, limit: usize) -> Result<()> {
    let config = config::load(&root.join(config_path))?;
    let project = &config.project;

    println!("Project: {}", project.name);
    if !project.language.is_empty() {
        println!("Language: {} ({})", project.language, project.project_type);
    }

    println!("\nTools:");
    for (key, command) in &project.tools {
        println!("  {key:<10} {command}");
    }

    if !config.metrics.is_empty() {
        println!("\nMetrics:");
        for spec in &config.metrics {
            let cap = spec
                .cap
                .map_or_else(String::new, |c| format!(", cap {c}"));
            println!(
                "  {:<18} target {}{}{cap}{}",
                spec.name,
                spec.target,
                spec.unit,
                spec.category
                    .as_deref()
                    .map_or_else(String::new, |c| format!(" [{c}]")),
            );
        }
    }

    let standards = &config.standards;
    println!("\nStandards:");
    if let Some(min) = standards.min_coverage {
        println!("  min coverage        {min}%");
    }
    if let Some(max) = standards.max_function_lines {
        println!("  max function lines  {max}");
    }
    println!("  max high severity   {}", standards.max_high_severity);
    println!("  retry cap           {}", config.retry.retry_cap);
    println!("  strict              {}", config.strict);

    let log = FileRunLog::new(root.join(DEFAULT_LOG_PATH));
    let runs = log
        .latest(limit)
        .await
        .with_context(|| format!("Failed to read run log {}", log.path().display()))?;

    println!("\nRecent runs:");
    if runs.is_empty() {
        println!("  (none)");
    }
    for record in &runs {
        println!(
            "  {}  {:<7}  {}  {}ms  {}",
            record.task().id,
            record.decision(),
            record.sealed_at().format("%Y-%m-%d %H:%M:%S"),
            record.duration_ms(),
            record.task().description,
        );
    }
    Ok(())
}

async fn cmd_test_ci(root: &Path, config_path: &Path) -> Result<()> {
    let config = load_validated(root, config_path)?;
    let runner = StageRunner::new(
        Arc::new(CommandInvoker::new(root)),
        Arc::new(config.project.clone()),
        config.timeouts.clone(),
    );

    let result = runner
        .run(StageKind::Ci, &Task::new("test ci"), 1)
        .await;

    for message in &result.messages {
        println!("  {message}");
    }
    for (name, value) in &result.metrics {
        println!("  {name} = {value}");
    }
    println!("CI: {} ({}ms)", if result.success { "OK" } else { "FAILED" }, result.duration_ms);

    if result.success {
        Ok(())
    } else {
        anyhow::bail!("CI stage failed")
    }
}

async fn cmd_test_tools(root: &Path, config_path: &Path) -> Result<()> {
    let config = config::load(&root.join(config_path))?;
    let invoker = CommandInvoker::new(root);

    let mut missing = Vec::new();
    for kind in StageKind::GATED.iter().chain([StageKind::Docs].iter()) {
        let key = tool_key(*kind);
        let Some(command) = config.project.tools.get(key) else {
            println!("  - {key:<10} not configured");
            continue;
        };
        match invoker.probe(command).await {
            Ok(version) => println!("  ✓ {key:<10} {version}"),
            Err(e) => {
                println!("  ✗ {key:<10} {e:#}");
                missing.push(key);
            }
        }
    }

    if missing.is_empty() {
        Ok(())
    } else {
        anyhow::bail!("Unavailable tools: {}", missing.join(", "))
    }
}

fn cmd_test_config(root: &Path, config_path: &Path) -> Result<()> {
    let config = config::load(&root.join(config_path))?;
    match config.validate() {
        Ok(()) => {
            println!("Configuration OK (digest {})", &config.digest()[..12]);
            Ok(())
        }
        Err(invalid) => {
            for issue in invalid.issues() {
                println!("  ✗ {issue}");
            }
            Err(invalid).context("Configuration is invalid")
        }
    }
}

fn cmd_benchmark(path: &Path, metric: &str, delta: f64) -> Result<()> {
    if !parse::is_bench_name(metric) {
        anyhow::bail!(
            "Invalid metric name '{metric}' (use letters, digits, '_', '.' or '-', not starting with a digit)"
        );
    }
    if !delta.is_finite() {
        anyhow::bail!("Benchmark delta must be a finite number");
    }
    let written = bench_summary::record(path, metric, delta)
        .with_context(|| format!("Failed to update {}", path.display()))?;
    println!("{metric}: {written} ({})", path.display());
    Ok(())
}

fn cmd_export_config(
    root: &Path,
    config_path: &Path,
    format: ExportFormat,
    output: Option<&Path>,
) -> Result<()> {
    let config = config::load(&root.join(config_path))?;
    let text = config::render(&config, format)?;
    match output {
        Some(path) => std::fs::write(path, text)
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => print!("{text}"),
    }
    Ok(())
}
