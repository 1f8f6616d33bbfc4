use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use collider_config::{BackendKind, ColliderConfig, HumanDuration};
use tracing::error;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(
    name = "lwt-collider",
    version,
    about = "Race workers on IF NOT EXISTS inserts and report slots claimed twice"
)]
struct Cli {
    /// Contact points, space or comma separated (defaults to 127.0.0.1)
    hosts: Vec<String>,

    /// Path to the configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of concurrent workers
    #[arg(short, long)]
    workers: Option<usize>,

    /// Size of the slot space
    #[arg(short = 'n', long)]
    iterations: Option<u32>,

    /// Storage backend (scylla, memory)
    #[arg(short, long)]
    backend: Option<BackendKind>,

    /// Seed for the per-worker shuffles
    #[arg(long)]
    seed: Option<u64>,

    /// Per-request timeout (e.g. 500ms, 12s)
    #[arg(long)]
    op_timeout: Option<HumanDuration>,

    /// Extra attempts for claims that failed transiently
    #[arg(long)]
    max_retries: Option<u32>,

    /// Print the run report as JSON on stdout
    #[arg(long)]
    json: bool,

    /// Exit with status 3 if any slot was never claimed
    #[arg(long)]
    require_coverage: bool,

    /// Print the effective configuration and exit
    #[arg(long)]
    print_config: bool,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

fn find_config() -> Option<PathBuf> {
    // 1. LWT_COLLIDER_CONFIG environment variable
    if let Ok(path) = std::env::var("LWT_COLLIDER_CONFIG") {
        let path = PathBuf::from(path);
        if path.exists() {
            return Some(path);
        }
    }

    // 2. lwt-collider.yaml in current directory
    let cwd_config = PathBuf::from("lwt-collider.yaml");
    if cwd_config.exists() {
        return Some(cwd_config);
    }

    None
}

fn init_tracing(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => Some("warn"),
        (false, 0) => None,
        (false, 1) => Some("debug"),
        _ => Some("trace"),
    };
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config(cli: &Cli) -> Result<ColliderConfig, Box<dyn std::error::Error>> {
    let mut config = match cli.config.clone().or_else(find_config) {
        Some(path) => ColliderConfig::from_file(&path)?,
        None => ColliderConfig::default(),
    };

    // Command-line flags override the file
    if !cli.hosts.is_empty() {
        config.endpoints = cli.hosts.clone();
    }
    if let Some(workers) = cli.workers {
        config.workers = workers;
    }
    if let Some(iterations) = cli.iterations {
        config.iterations = iterations;
    }
    if let Some(backend) = cli.backend {
        config.backend = backend;
    }
    if let Some(seed) = cli.seed {
        config.seed = Some(seed);
    }
    if let Some(timeout) = cli.op_timeout {
        config.op_timeout = Some(timeout);
    }
    if let Some(max_retries) = cli.max_retries {
        config.max_retries = max_retries;
    }

    config.apply_defaults();
    config.validate_or_err()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            return ExitCode::from(commands::EXIT_STARTUP);
        }
    };

    let result = if cli.print_config {
        commands::config::run(&config).map(|()| commands::EXIT_CLEAN)
    } else {
        commands::run::run(&config, cli.json, cli.require_coverage).await
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            error!(error = %e, "collider run could not start");
            ExitCode::from(commands::EXIT_STARTUP)
        }
    }
}
