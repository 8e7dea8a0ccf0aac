//! PLUME CLI entry point.
//!
//! Loads a JSON configuration, reports defaulted fields, builds the
//! simulation, fans realizations out (optionally in parallel), and
//! writes the realization and summary streams.

mod output;

use std::io::BufRead;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::Local;
use clap::Parser;
use log::{info, warn};
use plume_core::RawSimulationSpec;
use plume_engine::{RealizationOutput, Simulation};
use rayon::prelude::*;

use output::OutputWriter;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser, Debug)]
#[command(name = "plume")]
#[command(version = VERSION)]
#[command(about = "PLUME: hybrid micro/meso reaction-diffusion simulator", long_about = None)]
struct Args {
    /// Input configuration file (JSON)
    #[arg(short, long)]
    config: PathBuf,

    /// Directory for the output streams
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// Override the configured random number seed
    #[arg(long)]
    seed: Option<u64>,

    /// Override the configured number of repeats
    #[arg(long)]
    repeats: Option<u32>,

    /// Continue without confirmation when the configuration has warnings
    #[arg(long)]
    warning_override: bool,

    /// Run realizations in parallel (independent seeds, ordered output)
    #[arg(long)]
    parallel: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let exit = match run() {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("ERROR: {e:#}");
            1
        }
    };
    std::process::exit(exit);
}

fn run() -> Result<()> {
    let args = Args::parse();
    let filter = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();

    let text = std::fs::read_to_string(&args.config)
        .with_context(|| format!("reading {}", args.config.display()))?;
    let raw = RawSimulationSpec::from_json(&text).context("parsing configuration")?;
    let (mut spec, warnings) = raw.resolve().context("resolving configuration")?;
    for w in &warnings {
        warn!("{w}");
    }
    if !warnings.is_empty() && !args.warning_override {
        eprintln!(
            "{} configuration warning(s); continue? [y/N] ",
            warnings.len()
        );
        let mut line = String::new();
        std::io::stdin()
            .lock()
            .read_line(&mut line)
            .context("reading confirmation")?;
        if !line.trim().eq_ignore_ascii_case("y") {
            bail!("aborted by operator after configuration warnings");
        }
    }

    if let Some(seed) = args.seed {
        spec.control.seed = seed;
    }
    if let Some(repeats) = args.repeats {
        spec.control.num_repeat = repeats;
    }
    let config_name = args
        .config
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| args.config.display().to_string());
    let stem = spec.output_filename.clone();
    let seed = spec.control.seed;
    let num_repeat = spec.control.num_repeat;

    std::fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("creating {}", args.output_dir.display()))?;

    let started = Local::now();
    info!(
        "building simulation from {} ({} repeats, seed {})",
        config_name, num_repeat, seed
    );
    let sim = Simulation::build(spec).context("build phase")?;

    let outputs: Vec<RealizationOutput> = if args.parallel {
        // Realizations are independent; collect preserves seed order.
        (0..num_repeat as u64)
            .into_par_iter()
            .map(|r| sim.run_realization(r))
            .collect::<plume_core::Result<Vec<_>>>()
            .context("realization failed")?
    } else {
        let mut outputs = Vec::with_capacity(num_repeat as usize);
        for r in 0..num_repeat as u64 {
            info!("realization {} of {}", r + 1, num_repeat);
            outputs.push(sim.run_realization(r).context("realization failed")?);
        }
        outputs
    };

    let mut writer = OutputWriter::new(&args.output_dir, &stem)?;
    for out in &outputs {
        writer.write_realization(out)?;
    }
    let ended = Local::now();
    writer.finish(&config_name, seed, num_repeat, started, ended)?;
    info!(
        "wrote {} realization(s) to {}",
        outputs.len(),
        args.output_dir.join(format!("{stem}.txt")).display()
    );
    Ok(())
}
