use anyhow::Result;
use clap::Parser;
use shard_executor::Cli;

fn main() -> Result<()> {
    let cli = Cli::parse();
    cli.run()
}
