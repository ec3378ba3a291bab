//! fraglab CLI
//!
//! Entry point for the `fraglab` command-line tool.

use clap::{Parser, Subcommand};
use fraglab::signal::SignalHandler;
use fraglab::{assemble, targets, ExperimentConfig, ProjectLayout, TargetList, WatchSession};
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Exit code for configuration problems (bad experiment name, broken
/// include manifest).
const EXIT_CODE_CONFIG: i32 = 2;

/// Exit code for a failed build or watch session.
const EXIT_CODE_BUILD: i32 = 1;

#[derive(Parser)]
#[command(name = "fraglab")]
#[command(about = "Assemble GLSL shader experiments from fragments", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Assemble an experiment once
    Build {
        /// Experiment name (subdirectory of experiments/)
        experiment: String,

        /// Project root containing experiments/ and includes/ (default: current directory)
        #[arg(long, default_value = ".")]
        root: PathBuf,
    },

    /// Assemble, then rebuild whenever a fragment changes
    Watch {
        /// Experiment name (subdirectory of experiments/)
        experiment: String,

        /// Project root containing experiments/ and includes/ (default: current directory)
        #[arg(long, default_value = ".")]
        root: PathBuf,
    },

    /// Print the resolved fragment list without building
    Targets {
        /// Experiment name (subdirectory of experiments/)
        experiment: String,

        /// Project root containing experiments/ and includes/ (default: current directory)
        #[arg(long, default_value = ".")]
        root: PathBuf,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { experiment, root } => run_build(&root, &experiment),
        Commands::Watch { experiment, root } => run_watch(&root, &experiment),
        Commands::Targets {
            experiment,
            root,
            json,
        } => run_targets(&root, &experiment, json),
    }
}

/// Dev diagnostics via `RUST_LOG`, stderr, default `warn`.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}

/// Load the experiment and resolve its target list, exiting with a
/// diagnostic on configuration errors.
fn load_experiment(root: &Path, name: &str) -> (ExperimentConfig, TargetList) {
    let layout = ProjectLayout::from_root(root);
    let config = match ExperimentConfig::load(&layout, name) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading experiment '{}': {}", name, e);
            process::exit(EXIT_CODE_CONFIG);
        }
    };
    let targets = targets::resolve(&layout, &config);
    (config, targets)
}

fn run_build(root: &Path, experiment: &str) {
    let (config, targets) = load_experiment(root, experiment);

    if let Err(e) = assemble::build(&targets, &config.output_path()) {
        eprintln!("Error building experiment '{}': {}", experiment, e);
        process::exit(EXIT_CODE_BUILD);
    }
    println!("Built {}", config.output_path().display());
}

fn run_watch(root: &Path, experiment: &str) {
    let (config, targets) = load_experiment(root, experiment);
    let session = WatchSession::new(experiment, targets, config.output_path());

    let handler = SignalHandler::new();
    if let Err(e) = handler.install(session.cancel_handle()) {
        eprintln!("Error installing signal handler: {}", e);
        process::exit(EXIT_CODE_BUILD);
    }

    if let Err(e) = session.run() {
        eprintln!("Error watching experiment '{}': {}", experiment, e);
        process::exit(EXIT_CODE_BUILD);
    }
}

fn run_targets(root: &Path, experiment: &str, json_output: bool) {
    let (config, targets) = load_experiment(root, experiment);
    let output_path = config.output_path();

    if json_output {
        let payload = serde_json::json!({
            "experiment": config.name,
            "output": output_path,
            "targets": targets.paths(),
        });
        match serde_json::to_string_pretty(&payload) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error serializing output: {}", e);
                process::exit(EXIT_CODE_BUILD);
            }
        }
    } else {
        println!(
            "Experiment '{}' ({} fragments):\n",
            config.name,
            targets.len()
        );
        for path in &targets {
            println!("  {}", path.display());
        }
        println!("\nOutput: {}", output_path.display());
    }
}
