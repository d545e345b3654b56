use mutant_engine::adapter::CommandAdapter;
use mutant_engine::config::RunConfig;
use mutant_engine::copy_tree;
use mutant_engine::coverage::CoverageIndex;
use mutant_engine::error::ConfigError;
use mutant_engine::events::{EventBus, LogSubscriber};
use mutant_engine::generator::{self, MutationsGenerator};
use mutant_engine::materializer::MutantMaterializer;
use mutant_engine::mutants::MutantStatus;
use mutant_engine::operators::MutatorCatalog;
use mutant_engine::output;
use mutant_engine::runner::{self, ExecutionEngine};
use mutant_engine::state::{self, RunSummary};

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mutant-engine", version, about = "Mutation testing driven by line coverage")]
struct Cli {
    /// More log output (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate mutants and run the test suite against each of them
    Run(RunArgs),
    /// Summary of the last run
    Status {
        /// Output JSON
        #[arg(long)]
        json: bool,
    },
    /// List the available mutation operators
    Mutators {
        /// Output JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Config file (default: ./mutant-engine.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Project root copied into each mutant workspace
    #[arg(long)]
    project_root: Option<PathBuf>,
    /// Source directory to mutate (repeatable)
    #[arg(long = "src")]
    source_dirs: Vec<PathBuf>,
    /// Path to leave out (repeatable)
    #[arg(long = "exclude")]
    excludes: Vec<PathBuf>,
    /// File name glob, e.g. "*_service.py"
    #[arg(long)]
    filter: Option<String>,
    /// Comma separated operator names to enable (case-insensitive)
    #[arg(long, value_delimiter = ',')]
    mutators: Vec<String>,
    /// Only mutate lines executed by at least one test
    #[arg(long)]
    only_covered: bool,
    /// Coverage report (LCOV, or JSON when the file ends in .json)
    #[arg(long, env = "MUTANT_ENGINE_COVERAGE")]
    coverage: Option<PathBuf>,
    /// Test command; `{tests}` expands to the covering tests
    #[arg(long)]
    test_cmd: Option<String>,
    /// Parallel workers
    #[arg(short = 'j', long)]
    jobs: Option<usize>,
    /// Per-mutant timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,
    /// Keep mutant workspaces after the run
    #[arg(long)]
    keep_workspaces: bool,
    /// Output JSON instead of human-readable text
    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Run(args) => cmd_run(args),
        Commands::Status { json } => cmd_status(json),
        Commands::Mutators { json } => cmd_mutators(json),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            output::print_error(&format!("{e:#}"));
            if e.downcast_ref::<ConfigError>().is_some() {
                ExitCode::from(2)
            } else {
                ExitCode::from(3)
            }
        }
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config(args: &RunArgs, cwd: &std::path::Path) -> Result<RunConfig, ConfigError> {
    let mut config = match &args.config {
        Some(path) => RunConfig::load(path)?,
        None => RunConfig::discover(cwd)?,
    };

    if args.project_root.is_some() {
        config.project_root = args.project_root.clone();
    }
    if !args.source_dirs.is_empty() {
        config.source_dirs = args.source_dirs.clone();
    }
    if !args.excludes.is_empty() {
        config.excludes = args.excludes.clone();
    }
    if args.filter.is_some() {
        config.filter = args.filter.clone();
    }
    if !args.mutators.is_empty() {
        config.mutators = args.mutators.clone();
    }
    if args.coverage.is_some() {
        config.coverage = args.coverage.clone();
    }
    if let Some(cmd) = &args.test_cmd {
        config.test_command = cmd.clone();
    }
    if let Some(jobs) = args.jobs {
        config.concurrency = jobs;
    }
    if let Some(timeout) = args.timeout {
        config.timeout_secs = timeout;
    }
    config.only_covered |= args.only_covered;
    config.keep_workspaces |= args.keep_workspaces;

    config.validate()?;
    Ok(config)
}

fn cmd_run(args: RunArgs) -> anyhow::Result<ExitCode> {
    let cwd = std::env::current_dir().context("failed to get current directory")?;
    let config = load_config(&args, &cwd)?;

    let project_root = match &config.project_root {
        Some(root) => cwd.join(root),
        None => copy_tree::find_project_root(&cwd),
    };
    let coverage = match &config.coverage {
        Some(path) => CoverageIndex::load(&cwd.join(path)).map_err(ConfigError::from)?,
        None => CoverageIndex::new(),
    };

    let catalog = MutatorCatalog::builtin();
    let operators = catalog.active_operators(&config.mutators);
    if operators.is_empty() {
        return Err(ConfigError::NoOperators(config.mutators.clone()).into());
    }
    let files = generator::discover_sources(&project_root, &config.selection())?;

    let mut events = EventBus::new();
    events.subscribe(LogSubscriber::default());

    let generated = MutationsGenerator::new(operators, &coverage, &events).generate(&files, config.only_covered);
    if generated.mutations.is_empty() {
        events.shutdown();
        if args.json {
            println!("{}", serde_json::to_string(&RunSummary::from_results(&[], Duration::ZERO))?);
        } else {
            output::print_success("No mutable code found.");
        }
        return Ok(ExitCode::SUCCESS);
    }

    let adapter = CommandAdapter::from_command_line(&config.test_command, &cwd)?;
    let session_id = runner::generate_session_id();
    let workspace_root = runner::create_workspace_root(&session_id).map_err(ConfigError::Workspace)?;
    let materializer = MutantMaterializer::new(&project_root, workspace_root.path());

    runner::run_baseline(&adapter, &materializer, config.run_options().timeout)?;

    let started = Instant::now();
    let engine = ExecutionEngine::new(&adapter, &materializer, &events, config.run_options());
    let results = engine.run(&generated.mutations, &generated.sources);
    events.shutdown();

    if config.keep_workspaces {
        let kept = workspace_root.keep();
        tracing::info!("mutant workspaces kept in {}", kept.display());
    }

    let summary = RunSummary::from_results(&results, started.elapsed());
    if let Err(e) = state::save_to_path(&summary, &state::state_path(&cwd)) {
        tracing::warn!("failed to save run state: {}", e);
    }

    if args.json {
        let report = serde_json::json!({ "summary": &summary, "results": &results });
        println!("{}", serde_json::to_string(&report)?);
    } else {
        output::print_run_summary(&summary);
    }

    let escaped = results.iter().any(|r| r.status == MutantStatus::Escaped);
    Ok(if escaped { ExitCode::from(1) } else { ExitCode::SUCCESS })
}

fn cmd_status(json: bool) -> anyhow::Result<ExitCode> {
    let cwd = std::env::current_dir().context("failed to get current directory")?;
    match state::load_from_path(&state::state_path(&cwd)) {
        Some(summary) => {
            if json {
                println!("{}", serde_json::to_string(&summary)?);
            } else {
                output::print_status(&summary);
            }
            Ok(ExitCode::SUCCESS)
        }
        None => {
            output::print_error("No previous run found. Run `mutant-engine run` first.");
            Ok(ExitCode::from(2))
        }
    }
}

fn cmd_mutators(json: bool) -> anyhow::Result<ExitCode> {
    let catalog = MutatorCatalog::builtin();
    if json {
        println!("{}", serde_json::to_string(&catalog.descriptors())?);
        return Ok(ExitCode::SUCCESS);
    }
    for d in catalog.descriptors() {
        println!("{:<22} {:<26} {:?}", d.id, d.display_name, d.category);
    }
    Ok(ExitCode::SUCCESS)
}
