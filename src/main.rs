//! SealVM - Sandboxed Crypto-DSL Runtime
//!
//! Main CLI entry point for executing sealed scripts.

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info, warn};
use sealvm::config::VmConfig;
use sealvm::input::{load_file, load_stdin, InputBuffer};
use sealvm::interp::{Interpreter, Value};
use sealvm::modules::ModuleCatalog;
use sealvm::sandbox::{run_sandboxed, ExecutionOutcome, SandboxPolicy};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

#[derive(Parser)]
#[command(name = "sealvm")]
#[command(version)]
#[command(about = "Sandboxed crypto-DSL runtime", long_about = None)]
struct Cli {
    /// Script to execute; reads standard input when omitted or "-"
    script: Option<PathBuf>,

    /// File with key material, exposed to the script as KEYS
    #[arg(short = 'k', long = "keys")]
    keys: Option<PathBuf>,

    /// File with input data, exposed to the script as DATA
    #[arg(short = 'a', long = "data")]
    data: Option<PathBuf>,

    /// Configuration file (default: search for sealvm.toml upwards)
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Hex-encoded deterministic random seed, overrides the configuration
    #[arg(short = 'S', long = "seed")]
    seed: Option<String>,

    /// Execute in the host process without the syscall filter
    #[arg(long = "no-isolation")]
    no_isolation: bool,

    /// Suppress the startup banner
    #[arg(short = 'q', long = "quiet")]
    quiet: bool,
}

fn main() {
    let code = match run() {
        Ok(outcome) => {
            // A sandbox kill is an expected outcome, already reported as a
            // notice; only a failing exit is an error here.
            if let ExecutionOutcome::Exited(code) = outcome {
                if code != 0 {
                    error!("script run {}", outcome);
                }
            }
            outcome.exit_code()
        }
        Err(e) => {
            // Logging may not be initialized yet when setup fails.
            eprintln!("sealvm error: {:#}", e);
            1
        }
    };
    std::process::exit(code);
}

fn run() -> Result<ExecutionOutcome> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => VmConfig::load(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => VmConfig::load_from_cwd().context("loading configuration")?,
    };

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.logging.level.as_str()),
    )
    .init();

    if !cli.quiet {
        info!("sealvm v{}", sealvm::VERSION);
    }

    let catalog = Arc::new(ModuleCatalog::standard());
    let mut interp = Interpreter::new(Arc::clone(&catalog));
    interp.init().context("interpreter initialization")?;

    if let Some(path) = &cli.keys {
        let mut buf = InputBuffer::large();
        load_file(&mut buf, path)
            .with_context(|| format!("loading keys from {}", path.display()))?;
        info!("reading KEYS from file: {}", path.display());
        interp.set_keys(&buf.to_text());
    }
    if let Some(path) = &cli.data {
        let mut buf = InputBuffer::large();
        load_file(&mut buf, path)
            .with_context(|| format!("loading data from {}", path.display()))?;
        info!("reading DATA from file: {}", path.display());
        interp.set_data(&buf.to_text());
    }

    let seed = match &cli.seed {
        Some(text) => {
            let bytes = hex::decode(text.trim()).context("decoding --seed")?;
            Some(bytes)
        }
        None => config.seed_bytes().context("decoding configured seed")?,
    };
    if let Some(bytes) = seed {
        warn!("deterministic random seed in use, runs are reproducible");
        interp.set_global("SEED", Value::Bytes(bytes));
    }

    let mut script = InputBuffer::large();
    match &cli.script {
        Some(path) if path.as_os_str() != "-" => {
            load_file(&mut script, path)
                .with_context(|| format!("loading script from {}", path.display()))?;
            info!("executing script: {}", path.display());
        }
        _ => {
            load_stdin(&mut script).context("loading script from standard input")?;
            info!("executing script from standard input");
        }
    }

    let policy = SandboxPolicy {
        isolate: config.security.isolation && !cli.no_isolation,
    };

    let started = Instant::now();
    let outcome = run_sandboxed(&policy, move || interp.execute_reporting(script.as_bytes()))
        .context("supervising script execution")?;
    info!("execution time: {}us", started.elapsed().as_micros());

    if let ExecutionOutcome::Signaled(signal) = outcome {
        info!("execution interrupted by signal {}", signal);
    }
    Ok(outcome)
}
