use std::{path::PathBuf, process::ExitCode};

use anyhow::{bail, Context, Result};
use clap::{ArgAction, ArgGroup, Parser, ValueEnum};
use tracing::Level;

use jetson_io::{config, dtc, Board};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ListMode {
    All,
    Enabled,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutFormat {
    Dtb,
    Dtbo,
}

/// Configure Jetson 40-pin expansion header
#[derive(Debug, Parser)]
#[command(name = "config-by-function", version)]
#[command(group(ArgGroup::new("action").required(true).args(["list", "out"])))]
struct Args {
    /// List supported functions
    #[arg(short, long, value_enum)]
    list: Option<ListMode>,

    /// Output DTB or DTBO file
    #[arg(short, long, value_enum)]
    out: Option<OutFormat>,

    /// Functions to enable
    functions: Vec<String>,

    /// Configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Increase logging verbosity
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn show_functions(functions: &[&str]) {
    for (index, function) in functions.iter().enumerate() {
        println!("{:2}. {}", index + 1, function);
    }
}

fn show_functions_enabled(jetson: &Board, functions: &[&str]) -> Result<()> {
    let mut enabled = Vec::new();
    for function in functions {
        if jetson.header.pingroup_is_enabled(function)? {
            enabled.push(*function);
        }
    }

    if enabled.is_empty() {
        println!("No functions are enabled on the 40-pin header.");
    } else {
        println!("The following functions are enabled on the 40-pin header:");
        show_functions(&enabled);
    }
    Ok(())
}

fn configure_jetson(jetson: &mut Board, out: OutFormat, functions: &[String], available: &[String]) -> Result<()> {
    for function in functions {
        if !available.contains(function) {
            bail!("Function {} is not supported!", function);
        }
        jetson.header.pingroup_enable(function)?;
    }

    let file = match out {
        OutFormat::Dtb => jetson.create_dtb_for_header()?,
        OutFormat::Dtbo => jetson.create_dtbo_for_header()?,
    };
    println!("Configuration saved to {}.", file.display());
    Ok(())
}

fn run(args: Args) -> Result<()> {
    dtc::check_tools()?;
    let config = config::load_or_default(args.config.as_deref()).context("Failed to load configuration")?;
    let mut jetson = Board::new(config).context("Failed to open board")?;

    let available: Vec<String> = jetson
        .header
        .pingroups_available()
        .into_iter()
        .map(String::from)
        .collect();

    if available.is_empty() {
        println!("No functions supported!");
        return Ok(());
    }
    let names: Vec<&str> = available.iter().map(String::as_str).collect();

    match (args.list, args.out) {
        (Some(ListMode::All), _) => {
            println!("The following functions are supported by the 40-pin header:");
            show_functions(&names);
        }
        (Some(ListMode::Enabled), _) => show_functions_enabled(&jetson, &names)?,
        (None, Some(out)) => configure_jetson(&mut jetson, out, &args.functions, &available)?,
        (None, None) => bail!("Either --list or --out is required!"),
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
