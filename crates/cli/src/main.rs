mod telemetry;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sched_core::{validate_bundle, validate_config, CancelFlag, Progress, Solver, ValidationError};
use serde::Serialize;
use solver_ga::GaSolver;
use tracing::info;
use types::{OptimizationConfig, OptimizationRequest};

#[derive(Parser)]
#[command(name = "timetable")]
#[command(about = "Evolutionary course timetable optimizer")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Optimize a request file and print the ranked timetables.
    Solve {
        /// JSON file holding `{ "config": .., "resources": .. }`
        request: PathBuf,
        /// Write results here instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
        #[command(flatten)]
        overrides: Overrides,
    },

    /// Check a request file for configuration and data problems.
    Validate { request: PathBuf },

    /// Print the JSON schema of a request file.
    Schema,
}

#[derive(clap::Args, Default)]
struct Overrides {
    /// Random seed
    #[arg(long, env = "TIMETABLE_SEED")]
    seed: Option<u64>,
    /// Population size
    #[arg(long)]
    population: Option<usize>,
    /// Maximum generations
    #[arg(long)]
    generations: Option<u32>,
    /// Wall-clock budget in milliseconds
    #[arg(long)]
    max_runtime_ms: Option<u64>,
}

impl Overrides {
    fn apply(&self, cfg: &mut OptimizationConfig) {
        if let Some(seed) = self.seed {
            cfg.seed = Some(seed);
        }
        if let Some(n) = self.population {
            cfg.population_size = n;
        }
        if let Some(n) = self.generations {
            cfg.generations = n;
        }
        if let Some(ms) = self.max_runtime_ms {
            cfg.max_runtime_ms = ms;
        }
    }
}

#[derive(Serialize)]
struct ValidationReport {
    ok: bool,
    errors: Vec<String>,
}

fn validation_report(request: &OptimizationRequest) -> ValidationReport {
    let mut errors = Vec::new();
    if let Err(e) = validate_config(&request.config) {
        errors.push(e.to_string());
    }
    if let Err(ValidationError::Msg(msg)) = validate_bundle(&request.resources) {
        errors.extend(
            msg.split(';')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
        );
    }
    ValidationReport {
        ok: errors.is_empty(),
        errors,
    }
}

fn read_request(path: &Path) -> Result<OptimizationRequest> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    telemetry::init(cli.json_logs);

    match cli.command {
        Commands::Solve {
            request,
            out,
            overrides,
        } => {
            let mut req = read_request(&request)?;
            overrides.apply(&mut req.config);

            let mut sink = |p: Progress| {
                info!(
                    generation = p.generation,
                    percent = p.progress_percent,
                    best = p.best_fitness,
                    "progress"
                )
            };
            let results = GaSolver::new().solve(&req, &mut sink, &CancelFlag::new())?;
            let json = serde_json::to_string_pretty(&results)?;
            match out {
                Some(path) => std::fs::write(&path, json)
                    .with_context(|| format!("writing {}", path.display()))?,
                None => println!("{json}"),
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Validate { request } => {
            let report = validation_report(&read_request(&request)?);
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(if report.ok {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Commands::Schema => {
            let schema = schemars::schema_for!(OptimizationRequest);
            println!("{}", serde_json::to_string_pretty(&schema)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}
