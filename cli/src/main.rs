//! `arbiter`: the command-line surface over the run engine (§6).
//!
//! Subcommands mirror the documented CLI surface: `init` scaffolds a config,
//! `validate`/`resolve` exercise the config loader without running anything,
//! `run` executes a full sampling run, and `report`/`verify`/`receipt` read
//! an existing run directory back.

mod commands;
mod receipt;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "arbiter", about = "Sample an LLM's distribution of answers to a question")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scaffold a starter config file.
    Init(InitArgs),
    /// Run a full sampling run.
    Run(RunArgs),
    /// Validate a config file without running anything.
    Validate(ValidateArgs),
    /// Print a run's manifest summary.
    Report(ReportArgs),
    /// Re-check a run directory's artifact hashes against its manifest.
    Verify(VerifyArgs),
    /// Render (or re-render) a run's human-readable receipt.
    Receipt(ReceiptArgs),
    /// Load, merge, and print a fully resolved config.
    Resolve(ResolveArgs),
}

#[derive(clap::Args, Debug)]
struct InitArgs {
    /// Where to write the starter config.
    #[arg(long, default_value = "arbiter.config.yaml")]
    out: PathBuf,
    #[arg(long)]
    force: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ExecMode {
    Mock,
    Live,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ContractFailureArg {
    Warn,
    Exclude,
    Fail,
}

#[derive(clap::Args, Debug)]
struct RunArgs {
    #[arg(long)]
    config: PathBuf,
    /// Run directory; defaults to `runs/<run_id>`.
    #[arg(long)]
    out: Option<PathBuf>,
    #[arg(long, conflicts_with = "live")]
    mock: bool,
    #[arg(long, conflicts_with = "mock")]
    live: bool,
    #[arg(long, value_enum)]
    mode: Option<ExecMode>,
    /// Required to run live outside an interactive terminal.
    #[arg(long)]
    yes: bool,
    #[arg(long)]
    workers: Option<u32>,
    #[arg(long = "batch-size")]
    batch_size: Option<u32>,
    #[arg(long = "max-trials")]
    max_trials: Option<u32>,
    #[arg(long, conflicts_with = "permissive")]
    strict: bool,
    #[arg(long, conflicts_with = "strict")]
    permissive: bool,
    #[arg(long = "allow-free")]
    allow_free: bool,
    #[arg(long = "allow-aliased")]
    allow_aliased: bool,
    #[arg(long = "contract-failure", value_enum)]
    contract_failure: Option<ContractFailureArg>,
    #[arg(long)]
    debug: bool,
    #[arg(long)]
    quiet: bool,
}

#[derive(clap::Args, Debug)]
struct ValidateArgs {
    #[arg(long)]
    config: PathBuf,
    #[arg(long, conflicts_with = "permissive")]
    strict: bool,
    #[arg(long, conflicts_with = "strict")]
    permissive: bool,
}

#[derive(clap::Args, Debug)]
struct ResolveArgs {
    #[arg(long)]
    config: PathBuf,
    #[arg(long, conflicts_with = "permissive")]
    strict: bool,
    #[arg(long, conflicts_with = "strict")]
    permissive: bool,
}

#[derive(clap::Args, Debug)]
struct ReportArgs {
    /// Path to the run directory.
    run_dir: PathBuf,
}

#[derive(clap::Args, Debug)]
struct VerifyArgs {
    run_dir: PathBuf,
}

#[derive(clap::Args, Debug)]
struct ReceiptArgs {
    run_dir: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Init(args) => commands::init::run(args),
        Command::Run(args) => commands::run::run(args).await,
        Command::Validate(args) => commands::validate::run(args),
        Command::Report(args) => commands::report::run(args),
        Command::Verify(args) => commands::verify::run(args),
        Command::Receipt(args) => commands::receipt::run(args),
        Command::Resolve(args) => commands::resolve::run(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
