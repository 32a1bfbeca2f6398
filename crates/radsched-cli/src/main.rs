//! Radsched CLI - bootstrap placement data, register functions and place them.

mod client;
mod commands;
mod probe;

use anyhow::Context;
use clap::{Parser, Subcommand};
use radsched_placement::config::DEFAULT_CONFIG_FILE;
use radsched_placement::SchedulerConfig;
use std::path::PathBuf;

use commands::prepare::PrepareArgs;
use commands::run::RunArgs;

#[derive(Parser)]
#[command(name = "radsched")]
#[command(about = "Place serverless functions on edge nodes or their home datacenter")]
#[command(version)]
struct Cli {
    /// Configuration file
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Refresh functions, latency tables and consistency data
    Bootstrap,

    /// Register a function locally and with the registration service
    Prepare {
        /// Function name
        name: String,

        /// Base execution time, e.g. 125ms
        execution_time: String,

        /// Home datacenter
        datacenter: String,
    },

    /// Choose where a registered function should run
    Run {
        /// Function name
        name: String,

        /// Use epsilon-greedy placement weighted by edge consistency
        #[arg(short, long)]
        with_weight: bool,

        /// Seed for exploration (overrides the configured seed)
        #[arg(long)]
        seed: Option<u64>,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    if let Err(e) = execute(cli).await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn execute(cli: Cli) -> anyhow::Result<()> {
    let config = SchedulerConfig::load_from(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    match cli.command {
        Commands::Bootstrap => commands::bootstrap::run(&config).await?,
        Commands::Prepare {
            name,
            execution_time,
            datacenter,
        } => {
            let args = PrepareArgs {
                name,
                execution_time,
                datacenter,
            };
            commands::prepare::run(&config, args).await?;
        }
        Commands::Run {
            name,
            with_weight,
            seed,
        } => {
            let args = RunArgs {
                name,
                with_weight,
                seed,
            };
            commands::run::run(config, args).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_flags() {
        let cli = Cli::try_parse_from(["radsched", "run", "Resize", "--with-weight", "--seed", "9"])
            .unwrap();

        assert_eq!(cli.config, PathBuf::from(DEFAULT_CONFIG_FILE));
        match cli.command {
            Commands::Run {
                name,
                with_weight,
                seed,
            } => {
                assert_eq!(name, "Resize");
                assert!(with_weight);
                assert_eq!(seed, Some(9));
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn prepare_takes_three_positionals() {
        let cli = Cli::try_parse_from([
            "radsched",
            "--config",
            "other.toml",
            "prepare",
            "resize",
            "125ms",
            "us-east-1",
        ])
        .unwrap();

        assert_eq!(cli.config, PathBuf::from("other.toml"));
        assert!(matches!(
            cli.command,
            Commands::Prepare { ref execution_time, .. } if execution_time == "125ms"
        ));
        assert!(Cli::try_parse_from(["radsched", "prepare", "resize"]).is_err());
    }
}
