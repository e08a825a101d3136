//! dirform command-line tool
//!
//! Usage:
//!   dirform render user.ui --object jdoe.json --config dirform.toml
//!   dirform extensions jdoe.json

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dirform_cli::{extensions_report, load_object, render_report, CliConfig};
use std::path::PathBuf;
use tracing::debug;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "dirform")]
#[command(about = "Render and inspect directory object form templates")]
struct Args {
    /// Enable verbose debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build a UI descriptor and print its widget tree
    Render {
        /// Path to the descriptor XML
        template: PathBuf,

        /// Object state JSON to bind against
        #[arg(short, long)]
        object: Option<PathBuf>,

        /// TOML config file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Print the extension dependency order of an object
    Extensions {
        /// Object state JSON
        object: PathBuf,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();
    let log_level = if args.verbose { LevelFilter::DEBUG } else { LevelFilter::WARN };
    let filter = EnvFilter::builder()
        .with_default_directive(log_level.into())
        .from_env_lossy();
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    match args.command {
        Command::Render {
            template,
            object,
            config,
        } => {
            let config = CliConfig::load(config.as_deref())?;
            let xml = std::fs::read_to_string(&template)
                .with_context(|| format!("Failed to read template {:?}", template))?;
            let object = object.as_deref().map(load_object).transpose()?;
            debug!("rendering {:?}", template);
            print!("{}", render_report(&xml, object.as_ref(), &config)?);
        }
        Command::Extensions { object } => {
            let object = load_object(&object)?;
            print!("{}", extensions_report(&object));
        }
    }
    Ok(())
}
