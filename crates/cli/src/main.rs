//! Memory controller simulator CLI.
//!
//! This binary drives the controller model from the command line. It provides:
//! 1. **Run:** Build a controller from a JSON config, issue a synthetic workload from several
//!    requester threads, and print the statistics report.
//! 2. **Map:** Print where lines land under a given interleaving, without building devices.

use std::error::Error;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use mcsim_core::common::LineAddr;
use mcsim_core::mc::Interleaver;
use mcsim_core::sim::{Pattern, Workload};
use mcsim_core::{ConfigTree, ControllerParams, MemoryController};

#[derive(Parser, Debug)]
#[command(
    name = "mcsim",
    author,
    version,
    about = "Multi-channel memory controller simulator",
    long_about = "Run a synthetic workload against a configured memory controller, or inspect an interleaving.\n\nLogging is controlled with RUST_LOG (default: info).\n\nExamples:\n  mcsim run --config mc.json --threads 4 --requests 100000 --pattern sweep\n  mcsim run --config mc.json --writeback-ratio 0.25 --json\n  mcsim map --granularity 64 --devices 4 10 138 0x1000"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum PatternArg {
    Sequential,
    Strided,
    Sweep,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build a controller from a config file and run a synthetic workload against it.
    Run {
        /// JSON configuration file.
        #[arg(short, long)]
        config: String,

        /// Controller name used in logs and stats.
        #[arg(long, default_value = "mem-0")]
        name: String,

        /// System clock frequency in MHz.
        #[arg(long, default_value_t = 2000)]
        frequency: u32,

        /// Concurrent requester threads.
        #[arg(short, long, default_value_t = 1)]
        threads: usize,

        /// Requests issued by each thread.
        #[arg(short = 'n', long, default_value_t = 1024)]
        requests: u64,

        /// Address pattern.
        #[arg(short, long, value_enum, default_value_t = PatternArg::Sequential)]
        pattern: PatternArg,

        /// Line distance for the strided pattern.
        #[arg(long, default_value_t = 16)]
        stride: u64,

        /// Buffer length in lines for the sweep pattern.
        #[arg(long, default_value_t = 65536)]
        sweep_lines: u64,

        /// Fraction of requests that are writebacks (0 to 1).
        #[arg(long, default_value_t = 0.0)]
        writeback_ratio: f64,

        /// Cycles between a completion and the thread's next request.
        #[arg(long, default_value_t = 1)]
        issue_gap: u64,

        /// Print the run summary and statistics as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Print the device and device-local line of each given line.
    Map {
        /// Interleaving granularity in lines.
        #[arg(short, long, default_value_t = 64)]
        granularity: u64,

        /// Number of devices.
        #[arg(short, long)]
        devices: usize,

        /// Line addresses, decimal or 0x-prefixed hex.
        #[arg(required = true, value_parser = parse_line)]
        lines: Vec<u64>,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing();

    let result = match cli.command {
        Commands::Run {
            config,
            name,
            frequency,
            threads,
            requests,
            pattern,
            stride,
            sweep_lines,
            writeback_ratio,
            issue_gap,
            json,
        } => {
            let pattern = match pattern {
                PatternArg::Sequential => Pattern::Sequential,
                PatternArg::Strided => Pattern::Strided { stride },
                PatternArg::Sweep => Pattern::Sweep { lines: sweep_lines },
            };
            let workload = Workload {
                pattern,
                threads,
                requests_per_thread: requests,
                writeback_ratio,
                issue_gap,
            };
            cmd_run(&config, ControllerParams::new(name, frequency), &workload, json)
        }
        Commands::Map {
            granularity,
            devices,
            lines,
        } => cmd_map(granularity, devices, &lines),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

/// Installs the log subscriber on stderr, so that `--json` output on stdout stays parseable.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Builds the controller, runs the workload and prints the report.
///
/// # Arguments
///
/// * `config_path` - JSON configuration file.
/// * `params` - Controller name and clock.
/// * `workload` - Traffic to issue.
/// * `json` - Emit JSON instead of the text report.
fn cmd_run(
    config_path: &str,
    params: ControllerParams,
    workload: &Workload,
    json: bool,
) -> Result<(), Box<dyn Error>> {
    let cfg = ConfigTree::from_file(config_path)?;
    let ctrl = MemoryController::new(params, &cfg)?;
    let summary = workload.run(&ctrl)?;
    let stats = ctrl.stats();

    if json {
        let out = serde_json::json!({
            "controller": ctrl.name(),
            "routing": ctrl.routing().as_str(),
            "workload": workload,
            "summary": summary,
            "footprint": ctrl.footprint(),
            "stats": stats.root(),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!(
            "[*] {} ({} external, {} in-package, routing {})",
            ctrl.name(),
            ctrl.external_devices(),
            ctrl.in_package_devices(),
            ctrl.routing()
        );
        println!("{summary}");
        let footprint = ctrl.footprint();
        println!(
            "footprint        {} pages, {} bytes",
            footprint.pages_touched,
            footprint.footprint_bytes()
        );
        println!();
        print!("{}", stats.render());
    }
    Ok(())
}

/// Prints `line -> device, local` for every line.
fn cmd_map(granularity: u64, devices: usize, lines: &[u64]) -> Result<(), Box<dyn Error>> {
    let interleaver = Interleaver::new(granularity, devices)?;
    for &line in lines {
        let (device, local) = interleaver.map(LineAddr::new(line));
        println!("{line:#x} -> device {device}, local {local}");
    }
    Ok(())
}

fn parse_line(s: &str) -> Result<u64, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid line address `{s}`: {e}"))
}
