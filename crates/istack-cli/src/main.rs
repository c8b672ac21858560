//! int-stack: drive the shared integer stack device.
//!
//! # Usage
//!
//! ```bash
//! # Run a script (file or stdin)
//! int-stack run ops.txt
//! printf 'push 1\npush 2\nunwind\n' | int-stack --capacity 4 run
//!
//! # Concurrent stress run with invariant checks, JSON report on stdout
//! int-stack stress --threads 8 --ops 10000 --resize-every 50 --seed 7
//!
//! # Exhaustive model check of the locking protocol
//! int-stack model --threads 2 --values 3
//! ```
//!
//! Exits with the errno of the first failure (`ERANGE` for a full stack,
//! `EINVAL` for bad input), 1 when a check finds violations.

use std::fs::File;
use std::io::{self, BufReader, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use istack::{Capacity, DeviceConfig, StackDevice};
use istack_cli::stress::{self, StressConfig};
use istack_cli::{model, script, CliError};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Most simulated threads the model check accepts.
const MODEL_THREADS_MAX: u8 = 4;

/// Fewest pushed values the model check accepts.
const MODEL_VALUES_MIN: u8 = model::VALUES_MIN as u8;

/// Most pushed values the model check accepts.
const MODEL_VALUES_MAX: u8 = 6;

#[derive(Parser, Debug)]
#[command(name = "int-stack")]
#[command(about = "Shared bounded integer stack: scripts, stress runs and model checks")]
struct Cli {
    /// Initial stack capacity (overrides INT_STACK_CAPACITY).
    #[arg(long, global = true)]
    capacity: Option<Capacity>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Execute a script of set-size / push / pop / unwind lines.
    Run {
        /// Script file; stdin when omitted.
        file: Option<PathBuf>,
    },

    /// Hammer one stack from several threads and check invariants.
    Stress {
        #[arg(long, default_value_t = 4)]
        threads: usize,

        /// Operations per thread.
        #[arg(long, default_value_t = 10_000)]
        ops: usize,

        /// Every Nth operation of a thread is a resize (0 = never).
        #[arg(long, default_value_t = 50)]
        resize_every: usize,

        /// Seed for the per-thread workloads (random if not set).
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Model-check the locking protocol.
    Model {
        #[arg(long, default_value_t = 2, value_parser = clap::value_parser!(u8).range(1..=MODEL_THREADS_MAX as i64))]
        threads: u8,

        #[arg(long, default_value_t = 3, value_parser = clap::value_parser!(u8).range(MODEL_VALUES_MIN as i64..=MODEL_VALUES_MAX as i64))]
        values: u8,
    },
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "istack=info".into()))
        .with(fmt::layer().with_writer(io::stderr))
        .init();
}

fn device_config(capacity: Option<Capacity>) -> Result<DeviceConfig, CliError> {
    let config = DeviceConfig::from_env().map_err(CliError::Config)?;
    Ok(match capacity {
        Some(capacity) => config.with_capacity(capacity),
        None => config,
    })
}

fn run(cli: Cli) -> Result<(), CliError> {
    let config = device_config(cli.capacity)?;
    let stdout = io::stdout();
    let mut out = stdout.lock();

    match cli.command {
        Command::Run { file } => {
            let device = StackDevice::new(&config).map_err(CliError::Config)?;
            match file {
                Some(path) => {
                    let file = File::open(&path).map_err(|source| CliError::Io {
                        path: path.display().to_string(),
                        source,
                    })?;
                    script::run_script(&device, BufReader::new(file), &mut out)?;
                }
                None => {
                    script::run_script(&device, io::stdin().lock(), &mut out)?;
                }
            }
        }
        Command::Stress {
            threads,
            ops,
            resize_every,
            seed,
        } => {
            let config = StressConfig {
                threads: threads.max(1),
                ops_per_thread: ops,
                resize_every,
                seed: seed.unwrap_or_else(rand::random),
                capacity: config.default_capacity,
            };
            let report = stress::run(&config)?;
            serde_json::to_writer_pretty(&mut out, &report)?;
            writeln!(out)?;
            if !report.passed {
                return Err(CliError::Violations(report.violations_count()));
            }
        }
        Command::Model { threads, values } => {
            let report = model::run(usize::from(threads), usize::from(values))?;
            serde_json::to_writer_pretty(&mut out, &report)?;
            writeln!(out)?;
            if !report.passed {
                let failed = report.properties.iter().filter(|p| !p.holds).count();
                return Err(CliError::Violations(failed));
            }
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            ExitCode::from(u8::try_from(e.errno()).unwrap_or(1))
        }
    }
}
