use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use filament_manager::{usage, Config, Profile, UsageReport};
use tracing_subscriber::{filter::LevelFilter, prelude::*, EnvFilter};

mod cmd_replay;
mod cmd_thresholds;

/// Track filament used by G-code against a spool inventory.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(name = "filament-manager")]
struct Cli {
    /// Log at debug level unless `RUST_LOG` says otherwise.
    #[arg(long, short, global = true)]
    debug: bool,

    /// Write logs as JSON lines.
    #[arg(long, short, global = true)]
    json: bool,

    /// Config file to use
    #[arg(
        long,
        short,
        global = true,
        env = "FILAMENT_MANAGER_CONFIG",
        default_value = "filament-manager.toml"
    )]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a G-code file through the tracker as if it were being printed,
    /// and print the filament taken from each spool.
    Replay {
        /// G-code file to replay.
        file: PathBuf,

        /// How to print the usage report.
        #[arg(long, short, value_enum, default_value_t = Format::Table)]
        format: Format,
    },

    /// Print how far each tool can extrude before pausing.
    Thresholds {
        /// How to print the thresholds.
        #[arg(long, short, value_enum, default_value_t = Format::Table)]
        format: Format,
    },

    /// Convert a length of filament into volume and mass.
    Convert {
        /// Filament diameter, in millimeters.
        #[arg(long, default_value_t = 1.75)]
        diameter: f64,

        /// Material density, in g/cm³.
        #[arg(long, default_value_t = 1.24)]
        density: f64,

        /// Filament length, in millimeters.
        #[arg(long)]
        length: f64,
    },

    /// Print the JSON schema of the usage report.
    Schema,
}

/// Output format of a command.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
    /// Aligned, human readable columns.
    Table,

    /// Pretty printed JSON.
    Json,
}

fn init_tracing(cli: &Cli) {
    let level = if cli.debug { LevelFilter::DEBUG } else { LevelFilter::INFO };
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let (json, plain) = if cli.json {
        (
            Some(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr)),
            None,
        )
    } else {
        (None, Some(tracing_subscriber::fmt::layer().with_writer(std::io::stderr)))
    };

    tracing_subscriber::registry().with(filter).with(json).with(plain).init();
}

fn load_config(cli: &Cli) -> Result<Config> {
    let config = Config::from_file(&cli.config)?;
    tracing::debug!(config = %cli.config.display(), tool_count = config.tool_count, "loaded config");
    Ok(config)
}

fn convert(diameter: f64, density: f64, length: f64) -> Result<()> {
    let profile = Profile {
        id: 0,
        vendor: String::new(),
        material: String::new(),
        density,
        diameter,
    };

    let volume = usage::length_to_volume(diameter, length);
    let mass = usage::length_to_mass(&profile, length);
    println!("length  {length:>12.3} mm");
    println!("volume  {volume:>12.3} mm³");
    println!("mass    {mass:>12.3} g");

    // Converting back only works for real filament.
    match usage::remaining_length(&profile, mass) {
        Ok(back) => tracing::debug!(length_mm = back, "converted mass back to length"),
        Err(err) => tracing::warn!(error = %err, "cannot convert mass back to length"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);

    match cli.command {
        Commands::Replay { ref file, format } => {
            let cfg = load_config(&cli)?;
            cmd_replay::main(&cli, &cfg, file, format).await
        }
        Commands::Thresholds { format } => {
            let cfg = load_config(&cli)?;
            cmd_thresholds::main(&cli, &cfg, format)
        }
        Commands::Convert {
            diameter,
            density,
            length,
        } => convert(diameter, density, length),
        Commands::Schema => {
            let schema = schemars::schema_for!(UsageReport);
            println!("{}", serde_json::to_string_pretty(&schema)?);
            Ok(())
        }
    }
}
