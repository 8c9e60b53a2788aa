//! irqsim: run interrupt arbitration simulations and write the event log.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::info;

use irqsim::scenario::parse_seed;
use irqsim::{
    load_scenario, render_event, write_report, ExitKind, Scenario, SimFormat, SimStats, Simulator,
};

/// Simulate I/O interrupt handling with priority arbitration and context
/// switching.
#[derive(Parser)]
#[command(name = "irqsim", version)]
struct Cli {
    /// JSON scenario file. Flags below override its values.
    #[arg(long, value_name = "PATH")]
    scenario: Option<PathBuf>,

    /// Number of ticks to simulate.
    #[arg(short, long)]
    ticks: Option<u64>,

    /// Stop after this many interrupts have been serviced.
    #[arg(long)]
    max_interrupts: Option<u64>,

    /// PRNG seed (u64 integer or "entropy" for OS randomness).
    ///
    /// Falls back to the IRQSIM_SEED env var, then the scenario, then 42.
    #[arg(long, env = "IRQSIM_SEED")]
    seed: Option<String>,

    /// Per-tick interrupt probability applied to every device.
    #[arg(short, long)]
    probability: Option<f64>,

    /// Where to write the text report.
    #[arg(long, value_name = "PATH", default_value = "irqsim.log")]
    log_file: PathBuf,

    /// Do not write the text report.
    #[arg(long, conflicts_with = "log_file")]
    no_log_file: bool,

    /// Write the structured trace as JSON.
    #[arg(long, value_name = "PATH")]
    json: Option<PathBuf>,

    /// Do not echo events to stdout.
    #[arg(short, long)]
    quiet: bool,
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .event_format(SimFormat)
        .try_init();
}

fn build_scenario(cli: &Cli) -> Result<Scenario> {
    let mut scenario = match &cli.scenario {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            load_scenario(&json).with_context(|| format!("failed to parse {}", path.display()))?
        }
        None => Scenario::default(),
    };

    if let Some(ticks) = cli.ticks {
        scenario.max_ticks = ticks;
    }
    if let Some(n) = cli.max_interrupts {
        scenario.max_interrupts = Some(n);
    }
    if let Some(seed) = &cli.seed {
        scenario.seed = parse_seed(Some(seed))?;
    }
    if let Some(p) = cli.probability {
        for profile in scenario.devices.values_mut() {
            profile.probability = p;
        }
    }
    scenario.validate()?;
    Ok(scenario)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let sim = Simulator::new(build_scenario(&cli)?);
    let trace = sim.run_scenario()?;

    if !cli.quiet {
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        for event in trace.events() {
            writeln!(out, "{}", render_event(event))?;
        }
        writeln!(out)?;
        writeln!(out, "{}", SimStats::from_trace(&trace))?;
    }

    if !cli.no_log_file {
        let file = File::create(&cli.log_file)
            .with_context(|| format!("failed to create {}", cli.log_file.display()))?;
        let mut w = BufWriter::new(file);
        write_report(&mut w, sim.scenario(), &trace)?;
        w.flush()?;
        info!(path = %cli.log_file.display(), "report written");
    }

    if let Some(path) = &cli.json {
        let file =
            File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
        let mut w = BufWriter::new(file);
        trace.write_json(&mut w)?;
        w.flush()?;
    }

    if let ExitKind::InvariantViolation(msg) = trace.exit_kind() {
        bail!("simulation aborted: {msg}");
    }
    Ok(())
}
