//! beebdfs - Acorn DFS disc image inspector.

use std::process::ExitCode;

use beebdfs::cli::Cli;
use beebdfs::commands::find_command;
use beebdfs::containers::connect_image_file;
use beebdfs::names::{DfsContext, VolumeSelector};
use beebdfs::storage::{DriveAllocation, StorageConfiguration};
use clap::Parser;

fn run(cli: &Cli) -> Result<(), String> {
    let (current_volume, used) =
        VolumeSelector::parse(&cli.drive).map_err(|e| format!("bad --drive argument: {e}"))?;
    if used != cli.drive.len() {
        return Err(format!("bad --drive argument: {}", cli.drive));
    }
    let ctx = DfsContext {
        current_volume,
        current_directory: cli.dir,
    };

    let mut storage = StorageConfiguration::new();
    for file in &cli.files {
        connect_image_file(file, &mut storage, DriveAllocation::Physical)
            .map_err(|e| format!("cannot use image file {file}: {e}"))?;
    }
    if cli.show_config {
        let mut stderr = std::io::stderr();
        storage
            .show_configuration(&mut stderr)
            .map_err(|e| format!("stderr: {e}"))?;
    }

    let command_name = match cli.command.first() {
        Some(name) => name,
        None => return Err("Please specify a command (try \"help\")".to_string()),
    };
    let command = find_command(command_name)
        .ok_or_else(|| format!("unknown command {command_name}"))?;
    command
        .invoke(&mut storage, &ctx, &cli.command)
        .map_err(|e| format!("{e}"))
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let log_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}
