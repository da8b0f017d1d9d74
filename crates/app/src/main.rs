mod cli;
mod read;
mod still;
mod telemetry;
mod watch;

use anyhow::Result;
use clap::Parser;
use symbology::DecodeOptions;

use crate::cli::{Cli, Command, TelemetryOptions, WatchConfig};

fn main() {
    if let Err(err) = run() {
        eprintln!("{err:?}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Watch(args) => watch::run(WatchConfig::try_from(args)?),
        Command::Read(args) => {
            let _telemetry_guard = telemetry::enter_runtime(&TelemetryOptions::default());
            read::run(&args.images, DecodeOptions::try_from(&args.decode)?)
        }
    }
}
