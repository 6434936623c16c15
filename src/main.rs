mod cli;
mod config;
mod error;
mod host;
mod launcher;
mod model;
mod orchestrator;

use anyhow::Result;
use clap::Parser;

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();
    init_logging(args.verbose);

    match cli::run(args).await {
        // Exit explicitly: stdin readers may still be parked on a blocking read.
        Ok(code) => std::process::exit(code),
        Err(e) => Err(e),
    }
}
