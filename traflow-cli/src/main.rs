mod tracing;

use crate::tracing::setup_tracing;
use ::tracing::info;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::path::{Path, PathBuf};
use std::time::Instant;
use traflow_core::node_model::{NodeModel, NodeModelSettingsBuilder};
use traflow_core::test_utils::make_random_inputs;
use traflow_schema::outputs::NodeOutput;
use traflow_schema::TraflowModel;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve the node snapshots of a model.
    Solve {
        /// Path to traflow model JSON.
        model: PathBuf,
        /// Write the node outputs to this JSON file instead of printing a summary.
        #[arg(short, long)]
        output_path: Option<PathBuf>,
        /// Solve nodes in parallel (overrides the model settings).
        #[arg(short, long, default_value_t = false)]
        parallel: bool,
        /// The number of threads to use when solving in parallel.
        #[arg(short, long)]
        threads: Option<usize>,
        #[arg(long, default_value_t = false)]
        debug: bool,
    },
    /// Evaluate a fundamental diagram of a model at the given densities.
    Diagram {
        /// Path to traflow model JSON.
        model: PathBuf,
        /// Name of the diagram.
        #[arg(short, long)]
        name: String,
        /// Densities (pcu/km/lane) to evaluate.
        #[arg(short, long, value_delimiter = ',', required = true)]
        densities: Vec<f64>,
    },
    /// Solve a batch of random nodes and report the timing.
    RunRandom {
        num_nodes: usize,
        /// Maximum number of incoming and outgoing links per node.
        max_legs: usize,
        #[arg(short, long, default_value_t = false)]
        parallel: bool,
        #[arg(short, long, default_value_t = 0)]
        threads: usize,
        #[arg(long, default_value_t = 0)]
        seed: u64,
    },
    /// Write the JSON schema of the model document.
    ExportSchema {
        /// Path to write the schema to.
        out: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Some(command) => match command {
            Commands::Solve {
                model,
                output_path,
                parallel,
                threads,
                debug,
            } => solve(model, output_path.as_deref(), *parallel, *threads, *debug)?,
            Commands::Diagram { model, name, densities } => diagram(model, name, densities)?,
            Commands::RunRandom {
                num_nodes,
                max_legs,
                parallel,
                threads,
                seed,
            } => run_random(*num_nodes, *max_legs, *parallel, *threads, *seed)?,
            Commands::ExportSchema { out } => export_schema(out)?,
        },
        None => {}
    }

    Ok(())
}

fn solve(path: &Path, output_path: Option<&Path>, parallel: bool, threads: Option<usize>, debug: bool) -> Result<()> {
    setup_tracing(debug).context("Could not set up logging")?;

    let mut model =
        TraflowModel::from_path(path).with_context(|| format!("Could not load model: `{}`", path.display()))?;
    if parallel {
        model.settings.parallel = true;
    }
    if threads.is_some() {
        model.settings.threads = threads;
    }

    let start = Instant::now();
    let outputs = model.solve_nodes().context("Could not solve nodes")?;
    info!("Solved {} nodes in {:?}.", outputs.len(), start.elapsed());

    match output_path {
        Some(output_path) => {
            let data = serde_json::to_string_pretty(&outputs)?;
            std::fs::write(output_path, data)
                .with_context(|| format!("Could not write outputs: `{}`", output_path.display()))?;
        }
        None => print_outputs(&outputs),
    }

    Ok(())
}

fn print_outputs(outputs: &[NodeOutput]) {
    for output in outputs {
        let factors: Vec<String> = output
            .flow_acceptance_factors
            .iter()
            .map(|f| format!("{f:.4}"))
            .collect();
        let status = if output.converged { "converged" } else { "partial" };
        println!(
            "{:<20} {:<10} iterations: {:>3}  acceptance: [{}]",
            output.name,
            status,
            output.iterations,
            factors.join(", ")
        );
    }
}

fn diagram(path: &Path, name: &str, densities: &[f64]) -> Result<()> {
    let model = TraflowModel::from_path(path).with_context(|| format!("Could not load model: `{}`", path.display()))?;
    let evaluations = model
        .evaluate_diagram(name, densities)
        .with_context(|| format!("Could not evaluate diagram `{name}`"))?;

    println!(
        "{:>10} {:>10} {:>10} {:>10} {:>10} {:>10}",
        "density", "regime", "flow", "speed", "sending", "receiving"
    );
    for e in evaluations {
        let regime = serde_json::to_value(e.regime)?;
        println!(
            "{:>10.2} {:>10} {:>10.1} {:>10.2} {:>10.1} {:>10.1}",
            e.density,
            regime.as_str().unwrap_or_default(),
            e.flow,
            e.speed,
            e.sending_flow,
            e.receiving_flow
        );
    }

    Ok(())
}

fn run_random(num_nodes: usize, max_legs: usize, parallel: bool, threads: usize, seed: u64) -> Result<()> {
    setup_tracing(false).context("Could not set up logging")?;

    // ChaCha8 should be consistent across builds and platforms
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let inputs = make_random_inputs(num_nodes, max_legs, max_legs, &mut rng)?;

    let mut builder = NodeModelSettingsBuilder::default().threads(threads);
    if parallel {
        builder = builder.parallel();
    }
    let model = NodeModel::new(builder.build());

    let start = Instant::now();
    let results = model.run_batch(&inputs)?;
    let elapsed = start.elapsed();

    let failed = results.iter().filter(|r| r.is_err()).count();
    info!(
        "Solved {} random nodes in {elapsed:?} ({failed} did not converge).",
        results.len()
    );

    Ok(())
}

fn export_schema(out: &Path) -> Result<()> {
    let schema = schemars::schema_for!(TraflowModel);
    std::fs::write(out, serde_json::to_string_pretty(&schema)?)
        .with_context(|| format!("Could not write schema: `{}`", out.display()))?;

    Ok(())
}
