use clap::{Parser, Subcommand};
use pipegraph::core::config::{EngineConfig, CONFIG_FILE};
use pipegraph::engine::script::execute_script;
use pipegraph::{Datum, DatasetSchema, PipelineStore};
use std::fs;
use std::path::PathBuf;
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pipegraph")]
#[command(version = "0.1")]
#[command(about = "Pipeline and dataset dependency graph", long_about = None)]
struct Cli {
    /// Config file (defaults to ./pipegraph.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a JSON command script and print the published events
    Run {
        /// Path to the script file (.json)
        file: PathBuf,
        /// Print the final registries instead of the event journal
        #[arg(long)]
        state: bool,
    },
    /// Print the schema inferred from a JSON array of rows
    Infer {
        /// Path to the rows file (.json)
        file: PathBuf,
    },
}

fn init_tracing(config: &EngineConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let (config, load_error) = match &cli.config {
        Some(path) => (EngineConfig::from_path(path)?, None),
        None => match EngineConfig::load() {
            Ok(config) => (config, None),
            Err(e) => (EngineConfig::default(), Some(e)),
        },
    };
    init_tracing(&config);
    if let Some(e) = load_error {
        warn!("Failed to load {}: {}. Using defaults.", CONFIG_FILE, e);
    }

    match cli.command {
        Commands::Run { file, state } => {
            let content = fs::read_to_string(&file)?;
            let mut store = PipelineStore::from_config(&config);
            if let Err(e) = execute_script(&mut store, &content) {
                eprintln!("Error executing script: {}", e);
                std::process::exit(1);
            }

            let issues = store.verify();
            for issue in &issues {
                eprintln!("[!] {}", issue);
            }

            if state {
                println!("{}", serde_json::to_string_pretty(store.state())?);
            } else {
                println!("{}", serde_json::to_string_pretty(store.journal().entries())?);
            }
        }
        Commands::Infer { file } => {
            let content = fs::read_to_string(&file)?;
            let rows: Vec<Datum> = serde_json::from_str(&content)?;
            let schema = DatasetSchema::infer(&rows);
            println!("{}", serde_json::to_string_pretty(&schema)?);
        }
    }

    Ok(())
}
