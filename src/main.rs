use anyhow::{Context, Result, anyhow};
use clap::Parser;
use hostgauge::agent::{Agent, CollectorKind};
use hostgauge::config::{AgentConfig, LogLevel, load_config};
use log::{error, info};
use std::path::PathBuf;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "hostgauge", version, about = "Host metrics collector agent")]
struct Args {
    /// Path to the configuration file (TOML, JSON or YAML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run every collector once and exit
    #[arg(long)]
    once: bool,

    /// Override the configured log level
    #[arg(long, value_enum)]
    log_level: Option<LogLevel>,

    /// Print the options of a collector kind and exit
    #[arg(long, value_name = "KIND")]
    describe: Option<String>,
}

fn describe(kind: &str) -> Result<()> {
    let kind: CollectorKind = kind.parse()?;
    let defaults = kind.default_config();
    let help = kind.default_config_help();

    println!("[collectors.{}]", kind);
    for (option, value) in defaults.iter() {
        let text = help.get(option).map(String::as_str).unwrap_or("");
        println!("# {}", text);
        println!("{} = {}", option, value.to_toml());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if let Some(kind) = &args.describe {
        return describe(kind);
    }

    let config = match &args.config {
        Some(path) => match load_config(path) {
            Ok(config) => config,
            Err(e) => {
                hostgauge::init_logging(LogLevel::Error);
                error!("Failed to load configuration: {}", e);
                return Err(anyhow!("Failed to load configuration: {}", e));
            }
        },
        None => AgentConfig::default(),
    };

    hostgauge::init_logging(args.log_level.unwrap_or(config.log_level));
    if let Some(path) = &args.config {
        info!("Configuration loaded from {}", path.display());
    }

    let agent = Agent::from_config(&config).context("Failed to configure collectors")?;

    if args.once {
        let report = agent.run_once().await;
        info!(
            "Collection pass finished: {}/{} collectors completed",
            report.completed(),
            report.outcomes.len()
        );
        return Ok(());
    }

    info!("Starting hostgauge {}", hostgauge::VERSION);
    agent.run_until_shutdown().await?;
    info!("Collection stopped");

    Ok(())
}
