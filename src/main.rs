use anyhow::Result;
use clap::Parser;

use panotiler::generate::{self, GenerateArgs};

/// Generate a multires tile set from a full or partial equirectangular or
/// cylindrical panorama.
#[derive(Parser, Debug)]
#[command(name = "panotiler", version, about)]
struct Cli {
    #[command(flatten)]
    args: GenerateArgs,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let default_level = if cli.args.debug { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .init();

    generate::run(cli.args)
}
