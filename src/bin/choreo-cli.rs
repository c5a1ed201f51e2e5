//! Choreo CLI - compile and fly Scratch drone shows
//!
//! Provides subcommands for writing a default configuration, compiling a
//! project into a schedule, and running the show.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use choreo::config::{self, CONFIG_FILE};
use choreo::runtime::{Fleet, ShowRunner, SimulatedTransport, connect_fleet};
use choreo::schedule::format::render_timeline;
use choreo::{ParseStatus, ShowLog, parse_to_schedule};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "choreo")]
#[command(about = "Compile Scratch projects into synchronized drone shows", long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(short, long, default_value = CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the default configuration
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Compile a project and print its schedule
    Compile {
        /// `.sb3` archive or bare `project.json`
        project: PathBuf,

        /// Print the schedule as JSON
        #[arg(long)]
        json: bool,
    },

    /// Compile a project and fly it
    Run {
        /// `.sb3` archive or bare `project.json`
        project: PathBuf,

        /// Replay against in-memory drones instead of UDP
        #[arg(long)]
        simulate: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init { force } => {
            if cli.config.exists() && !force {
                bail!("{:?} already exists (use --force to overwrite)", cli.config);
            }
            config::write_config(&cli.config, &Default::default())?;
            println!("Wrote default configuration to {:?}", cli.config);
        }

        Commands::Compile { project, json } => {
            let settings = config::load_or_default(&cli.config)?;
            let data = std::fs::read(&project)
                .with_context(|| format!("Failed to read {:?}", project))?;

            let outcome = parse_to_schedule(&data, &settings.compiler, &ShowLog::detached());
            if let ParseStatus::Failed(reason) = &outcome.status {
                bail!("Could not parse {:?}: {}", project, reason);
            }

            if json {
                println!("{}", outcome.schedule.to_json()?);
            } else {
                print!("{}", render_timeline(&outcome.schedule));
                println!("fingerprint: {}", outcome.schedule.fingerprint());
            }
        }

        Commands::Run { project, simulate } => {
            let settings = config::load_or_default(&cli.config)?;
            let data = std::fs::read(&project)
                .with_context(|| format!("Failed to read {:?}", project))?;
            let log = ShowLog::detached();

            let outcome = parse_to_schedule(&data, &settings.compiler, &log);
            match &outcome.status {
                ParseStatus::Failed(reason) => bail!("Could not parse {:?}: {}", project, reason),
                ParseStatus::NoValidAction => bail!("{:?} has no green-flag script", project),
                ParseStatus::Scheduled => {}
            }

            let fleet = if simulate {
                let mut fleet = Fleet::new();
                for name in outcome.schedule.participants() {
                    fleet.insert(Arc::new(SimulatedTransport::new(name)));
                }
                fleet
            } else {
                connect_fleet(&settings.fleet, &log).await?
            };

            let runner = ShowRunner::new(fleet, outcome.schedule, settings.runner, log);
            runner.connect().await?;

            let cancel = runner.cancellation();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("interrupted; landing all drones");
                    cancel.cancel();
                }
            });

            let report = runner.run().await?;
            println!(
                "Show {}: {} commands dispatched",
                if report.cancelled { "stopped" } else { "complete" },
                report.dispatched
            );
            if !report.landing_failures.is_empty() {
                println!("Landing not confirmed for: {}", report.landing_failures.join(", "));
            }
        }
    }

    Ok(())
}
