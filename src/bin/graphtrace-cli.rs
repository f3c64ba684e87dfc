//! graphtrace CLI - run scripts, check graphs and inspect recordings
//!
//! Provides subcommands for one-off traced runs, graph decoding, browsing
//! archived recording areas and writing a starter configuration.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use graphtrace::graph::codec;
use graphtrace::recording::{list_areas, read_metadata, read_trace};
use graphtrace::service::ResultAssembler;
use graphtrace::supervisor::{Supervisor, SupervisorConfig};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "graphtrace")]
#[command(about = "Traced, time-bounded execution of graph algorithm scripts", long_about = None)]
struct Cli {
    /// Supervisor configuration file
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a script against a graph and print the result envelope
    Run {
        /// Script file
        code: PathBuf,

        /// Graph file (node/edge JSON)
        graph: PathBuf,

        /// Wall-clock budget in milliseconds (default: from configuration)
        #[arg(long)]
        timeout_ms: Option<u64>,
    },

    /// Decode a graph file and print its normalized form
    Decode {
        /// Graph file (node/edge JSON)
        graph: PathBuf,
    },

    /// List archived recording areas, or show one of them
    Inspect {
        /// Area directory name; lists all areas when omitted
        area: Option<String>,

        /// Recording root (default: from configuration)
        #[arg(long)]
        root: Option<PathBuf>,
    },

    /// Write a configuration file with default settings
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            code,
            graph,
            timeout_ms,
        } => {
            let config = load_config(&cli.config)?;
            let timeout = timeout_ms
                .map(Duration::from_millis)
                .unwrap_or_else(|| config.timeout());
            let code = fs::read_to_string(&code)
                .with_context(|| format!("Failed to read script: {:?}", code))?;
            let graph = codec::decode_str(&read_graph(&graph)?)?;

            let supervisor = Supervisor::new(config)?;
            let envelope = match supervisor.submit(&code, &graph, timeout) {
                Ok(submission) => ResultAssembler.from_submission(submission),
                Err(err) => ResultAssembler.from_supervisor_error(&err),
            };
            println!("{}", serde_json::to_string_pretty(&envelope)?);
        }

        Commands::Decode { graph } => {
            let graph = codec::decode_str(&read_graph(&graph)?)?;
            println!(
                "{} nodes, {} edges",
                graph.nodes().len(),
                graph.edges().len()
            );
            println!("{}", serde_json::to_string_pretty(&codec::encode(&graph))?);
        }

        Commands::Inspect { area, root } => {
            let root = match root {
                Some(root) => root,
                None => load_config(&cli.config)?.recording.root,
            };
            match area {
                None => {
                    let areas = list_areas(&root)?;
                    if areas.is_empty() {
                        println!("No recording areas under {:?}", root);
                    }
                    for area in areas {
                        match read_metadata(&area) {
                            Ok(meta) => println!(
                                "{}  {:?}  {} records{}",
                                area.file_name()
                                    .map(|name| name.to_string_lossy().into_owned())
                                    .unwrap_or_default(),
                                meta.state,
                                meta.records,
                                if meta.truncated { " (truncated)" } else { "" }
                            ),
                            Err(err) => println!("{:?}  unreadable: {}", area, err),
                        }
                    }
                }
                Some(name) => {
                    let area = root.join(name);
                    let meta = read_metadata(&area)?;
                    println!("{}", serde_json::to_string_pretty(&meta)?);
                    for record in read_trace(&area)? {
                        println!("{}", serde_json::to_string(&record)?);
                    }
                }
            }
        }

        Commands::InitConfig { force } => {
            if cli.config.exists() && !force {
                anyhow::bail!("{:?} already exists (use --force to overwrite)", cli.config);
            }
            SupervisorConfig::default().write(&cli.config)?;
            println!("Wrote default configuration to {:?}", cli.config);
        }
    }

    Ok(())
}

fn load_config(path: &Path) -> Result<SupervisorConfig> {
    let mut config = SupervisorConfig::load_or_default(path)?;
    config.apply_env_overrides()?;
    Ok(config)
}

fn read_graph(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read graph: {:?}", path))
}
