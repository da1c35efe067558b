//! podwatchd — the podwatch daemon.
//!
//! # Usage
//!
//! ```text
//! podwatchd run --config /etc/podwatch/podwatch.toml --environment dev
//! podwatchd config --config /etc/podwatch/podwatch.toml
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use podwatch_core::PodwatchConfig;

#[derive(Parser)]
#[command(name = "podwatchd", about = "podwatch daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the status collector, cleanup loops, and HTTP surface.
    Run {
        #[command(flatten)]
        overrides: Overrides,
    },
    /// Print the effective configuration as TOML.
    Config {
        #[command(flatten)]
        overrides: Overrides,
    },
}

#[derive(clap::Args)]
struct Overrides {
    /// Path to podwatch.toml; defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Environment tag for status records.
    #[arg(long)]
    environment: Option<String>,

    /// Delivery pipeline name.
    #[arg(long)]
    pipeline: Option<String>,

    /// Data directory for the state store.
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Port for the HTTP surface.
    #[arg(long)]
    port: Option<u16>,
}

impl Overrides {
    fn load(self) -> anyhow::Result<PodwatchConfig> {
        let mut config = match &self.config {
            Some(path) => PodwatchConfig::from_file(path)?,
            None => PodwatchConfig::default(),
        };
        if let Some(environment) = self.environment {
            config.environment = environment;
        }
        if let Some(pipeline) = self.pipeline {
            config.pipeline = pipeline;
        }
        if let Some(data_dir) = self.data_dir {
            config.data_dir = data_dir;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,podwatchd=debug,podwatch=debug")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Run { overrides } => podwatchd::daemon::run(overrides.load()?).await,
        Command::Config { overrides } => {
            print!("{}", overrides.load()?.to_toml_string()?);
            Ok(())
        }
    }
}
