//! `arbiter run`: loads a config, executes a full sampling run against the
//! mock or live executor, and writes the receipt.

use std::path::PathBuf;

use anyhow::{bail, Context};
use arbiter_config::loader::Strictness;
use arbiter_executor::{ExecutedTrial, ExecutionContext, LiveExecutor, MockExecutor, TrialExecutor};
use arbiter_finalizer::EmbeddingsProvenance;
use arbiter_providers::{OpenRouterClient, ProviderConfig, RateLimiter};
use arbiter_types::plan::TrialPlanEntry;
use arbiter_writer::RunPaths;
use serde_json::{json, Value};

use crate::{ContractFailureArg, ExecMode, RunArgs};

enum AnyExecutor {
    Mock(MockExecutor),
    Live(LiveExecutor),
}

impl TrialExecutor for AnyExecutor {
    async fn execute(&self, entry: TrialPlanEntry, ctx: &ExecutionContext<'_>) -> ExecutedTrial {
        match self {
            AnyExecutor::Mock(executor) => executor.execute(entry, ctx).await,
            AnyExecutor::Live(executor) => executor.execute(entry, ctx).await,
        }
    }
}

fn contract_failure_arg_to_str(arg: ContractFailureArg) -> &'static str {
    match arg {
        ContractFailureArg::Warn => "warn",
        ContractFailureArg::Exclude => "exclude",
        ContractFailureArg::Fail => "fail",
    }
}

fn build_cli_overrides(args: &RunArgs) -> Value {
    let mut execution = serde_json::Map::new();
    if let Some(workers) = args.workers {
        execution.insert("workers".to_string(), json!(workers));
    }
    if let Some(batch_size) = args.batch_size {
        execution.insert("batch_size".to_string(), json!(batch_size));
    }
    if let Some(max_trials) = args.max_trials {
        execution.insert("k_max".to_string(), json!(max_trials));
    }
    if let Some(contract_failure) = args.contract_failure {
        execution.insert(
            "contract_failure_policy".to_string(),
            json!(contract_failure_arg_to_str(contract_failure)),
        );
    }

    let mut root = serde_json::Map::new();
    if !execution.is_empty() {
        root.insert("execution".to_string(), Value::Object(execution));
    }
    Value::Object(root)
}

fn resolve_mode(args: &RunArgs) -> ExecMode {
    if let Some(mode) = args.mode {
        return mode;
    }
    if args.live {
        return ExecMode::Live;
    }
    ExecMode::Mock
}

pub async fn run(args: RunArgs) -> anyhow::Result<()> {
    let strictness = if args.strict {
        Strictness::Strict
    } else {
        Strictness::Permissive
    };

    let raw_source_config = arbiter_config::read_file_layer(&args.config)
        .with_context(|| format!("failed to read {}", args.config.display()))?;

    let cli_overrides = build_cli_overrides(&args);
    let resolved = arbiter_config::load_config(&args.config, cli_overrides, strictness)
        .with_context(|| format!("failed to resolve {}", args.config.display()))?;

    let mode = resolve_mode(&args);
    if matches!(mode, ExecMode::Live) && !args.yes {
        bail!("--live requires --yes (confirm you intend to spend real provider budget)");
    }

    let run_dir: PathBuf = args
        .out
        .clone()
        .unwrap_or_else(|| PathBuf::from("runs").join(&resolved.run.run_id));
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create {}", run_dir.display()))?;

    let paths = RunPaths::new(&run_dir);
    let (_guard, logging_info) =
        arbiter_observability::init_run_logging(&resolved.run.run_id, Some(&paths.logs_dir()), args.debug)
            .context("failed to initialize logging")?;
    if !args.quiet {
        tracing::info!(run_id = %resolved.run.run_id, mode = ?mode, "starting run");
        if let Some(logs_dir) = &logging_info.logs_dir {
            tracing::debug!(logs_dir = logs_dir.as_str(), "writing debug json log");
        }
    }

    let executor = match mode {
        ExecMode::Mock => AnyExecutor::Mock(MockExecutor::new()),
        ExecMode::Live => {
            let provider_config = ProviderConfig::from_env()
                .map_err(|err| anyhow::anyhow!(err))
                .context("failed to build provider config from environment")?;
            let rate_limit = std::env::var("OPENROUTER_RATE_LIMIT")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .and_then(|v| v.trim().parse::<f64>().ok());
            let limiter = RateLimiter::new(rate_limit);
            let client = OpenRouterClient::new(provider_config, limiter);
            AnyExecutor::Live(LiveExecutor::new(client))
        }
    };

    let mut options = arbiter_orchestrator::RunOptions::new(&run_dir);
    options.debug = args.debug;

    let report = arbiter_orchestrator::run(&resolved, &raw_source_config, &executor, options)
        .await
        .context("run failed")?;

    // `arbiter_orchestrator::run` already finalizes embeddings and writes
    // `embeddings.provenance.json`; read it back rather than finalizing twice.
    let provenance = std::fs::read_to_string(paths.embeddings_provenance_json())
        .ok()
        .and_then(|raw| serde_json::from_str::<EmbeddingsProvenance>(&raw).ok());

    let rendered = crate::receipt::render(&report.manifest, provenance.as_ref());
    std::fs::write(paths.root().join("receipt.txt"), &rendered)
        .context("failed to write receipt.txt")?;

    if !args.quiet {
        print!("{rendered}");
    }

    if report.succeeded() {
        Ok(())
    } else {
        bail!(
            "run {} did not complete cleanly (stop_reason={:?}, incomplete={})",
            resolved.run.run_id,
            report.manifest.stop_reason,
            report.manifest.incomplete
        )
    }
}
