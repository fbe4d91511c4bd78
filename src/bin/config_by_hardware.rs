use std::{path::PathBuf, process::ExitCode};

use anyhow::{bail, Context, Result};
use clap::{ArgAction, ArgGroup, Parser};
use tracing::Level;

use jetson_io::{config, dtc, Board};

/// Configure Jetson for a hardware module
#[derive(Debug, Parser)]
#[command(name = "config-by-hardware", version)]
#[command(group(ArgGroup::new("action").required(true).args(["name", "list"])))]
struct Args {
    /// Name of hardware module
    #[arg(short, long)]
    name: Option<String>,

    /// List of hardware modules
    #[arg(short, long)]
    list: bool,

    /// Configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Increase logging verbosity
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn show_hardware(hwlist: &[&str]) {
    println!("Configurations for the following hardware modules are available:");
    for (index, hw) in hwlist.iter().enumerate() {
        println!("{}. {}", index + 1, hw);
    }
}

fn configure_jetson(jetson: &mut Board, hw: &str) -> Result<()> {
    if !jetson.hw_addon_get().contains(&hw) {
        bail!("No configuration found for {}!", hw);
    }
    jetson.hw_addon_load(hw)?;
    let dtb = jetson.create_dtb_for_hw_addon(hw)?;
    println!("Configuration saved to {}.", dtb.display());
    Ok(())
}

fn run(args: Args) -> Result<()> {
    dtc::check_tools()?;
    let config = config::load_or_default(args.config.as_deref()).context("Failed to load configuration")?;
    let mut jetson = Board::new(config).context("Failed to open board")?;

    if jetson.hw_addon_get().is_empty() {
        println!("No hardware configurations found!");
        return Ok(());
    }

    match args.name {
        Some(name) => configure_jetson(&mut jetson, &name)?,
        None => show_hardware(&jetson.hw_addon_get()),
    }

    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();

    let level = match args.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
