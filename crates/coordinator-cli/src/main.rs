use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use agent_coordination::backend::SharedBackendAdapter;
use agent_coordination::events::SharedCoordinationLog;
use agent_coordination::{
    Coordination, CoordinationLog, EchoBackend, ExecutionMode, HttpBackend, ModelRouter,
    OrchestrationRequest, Orchestrator, OrchestratorConfig, QualityValidator, TaskContext,
    TextKind,
};
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Answer every query with an offline echo instead of calling backends
    #[arg(long, global = true, default_value_t = false)]
    dry_run: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Classify a query
    Classify {
        query: String,
        /// Context as a JSON object
        #[arg(long)]
        context: Option<String>,
    },

    /// Show which backend a query would be routed to
    Route {
        query: String,
        /// Explicit backend preference
        #[arg(long)]
        backend: Option<String>,
        #[arg(long)]
        context: Option<String>,
    },

    /// Validate code or prose read from a file, or stdin with `-`
    Validate {
        file: PathBuf,
        /// Language of the code (python, rust, go, typescript, ...)
        #[arg(long, conflicts_with = "text")]
        language: Option<String>,
        /// Validate as prose
        #[arg(long, default_value_t = false)]
        text: bool,
        /// Expected prose kind: general, documentation or explanation
        #[arg(long, default_value = "general")]
        expected_type: String,
    },

    /// Orchestrate one query
    Run {
        query: String,
        #[arg(long)]
        mode: Option<ExecutionMode>,
        #[arg(long)]
        coordination: Option<Coordination>,
        /// Explicit subtask, repeatable
        #[arg(long = "subtask")]
        subtasks: Vec<String>,
        #[arg(long)]
        context: Option<String>,
        #[arg(long)]
        task_id: Option<String>,
        /// Per-call timeout, overriding the configured default
        #[arg(long)]
        timeout_secs: Option<u64>,
    },

    /// Orchestrate a JSON array of requests concurrently
    Batch { file: PathBuf },

    /// Show agents, modes and coordination types
    Stats,
}

fn parse_context(raw: Option<&str>) -> Result<TaskContext> {
    match raw {
        None => Ok(TaskContext::new()),
        Some(raw) => serde_json::from_str(raw).context("--context must be a JSON object"),
    }
}

fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read stdin")?;
        Ok(buffer)
    } else {
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
    }
}

fn print_json(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

struct Runtime {
    router: Arc<ModelRouter>,
    orchestrator: Orchestrator,
    log: SharedCoordinationLog,
}

fn build_runtime(config: &OrchestratorConfig, dry_run: bool) -> Result<Runtime> {
    let registry = config
        .registry()
        .context("Invalid backend configuration")?
        .shared();
    let agents = config.roster(&registry);
    let router = Arc::new(ModelRouter::new(registry));

    let adapter: SharedBackendAdapter = if dry_run {
        Arc::new(EchoBackend)
    } else {
        Arc::new(HttpBackend::new(config.endpoint.clone()).context("Failed to build HTTP client")?)
    };

    let log = CoordinationLog::new(config.log_capacity).shared();
    let orchestrator = Orchestrator::new(Arc::clone(&router), adapter, agents)
        .context("Failed to build orchestrator")?
        .with_sink(log.clone())
        .with_default_timeout_secs(config.default_timeout_secs);

    Ok(Runtime {
        router,
        orchestrator,
        log,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = OrchestratorConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    let runtime = build_runtime(&config, args.dry_run)?;
    info!(
        backends = config.backends.len(),
        endpoint = %config.endpoint.url,
        dry_run = args.dry_run,
        "Coordinator starting"
    );

    match args.command {
        Command::Classify { query, context } => {
            let context = parse_context(context.as_deref())?;
            print_json(&runtime.router.classifier().classify(&query, &context))?;
        }
        Command::Route {
            query,
            backend,
            context,
        } => {
            let context = parse_context(context.as_deref())?;
            print_json(&runtime.router.route_task(&query, &context, backend.as_deref()))?;
        }
        Command::Validate {
            file,
            language,
            text,
            expected_type,
        } => {
            let input = read_input(&file)?;
            let validator = QualityValidator::new();
            let result = match language {
                Some(language) => validator.validate_code(&input, &language),
                None if text => {
                    let kind: TextKind = expected_type.parse().map_err(anyhow::Error::msg)?;
                    validator.validate_text(&input, kind)
                }
                None => bail!("pass --language for code or --text for prose"),
            };
            print_json(&result)?;
        }
        Command::Run {
            query,
            mode,
            coordination,
            subtasks,
            context,
            task_id,
            timeout_secs,
        } => {
            let mut request = OrchestrationRequest::new(query)
                .with_context(parse_context(context.as_deref())?)
                .with_subtasks(subtasks);
            request.execution_mode = mode;
            request.coordination_type = coordination;
            request.task_id = task_id;
            request.timeout_secs = timeout_secs;

            let report = runtime.orchestrator.orchestrate(request).await;
            info!(summary = %report.summary(), "Run finished");
            print_json(&report)?;
        }
        Command::Batch { file } => {
            let requests: Vec<OrchestrationRequest> = serde_json::from_str(&read_input(&file)?)
                .context("Batch file must be a JSON array of requests")?;
            let reports = runtime
                .orchestrator
                .manage_parallel_execution(requests)
                .await;
            print_json(&serde_json::json!({
                "reports": reports,
                "metrics": runtime.log.metrics(),
            }))?;
        }
        Command::Stats => {
            print_json(&runtime.orchestrator.stats())?;
        }
    }

    Ok(())
}
