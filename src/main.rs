use anyhow::Result;
use clap::Parser;

use chatbridge::{
    cli::{handle_command, Cli},
    utils::init_logger,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    init_logger(cli.verbose);

    let command = cli.command();
    handle_command(command, cli.config.as_deref()).await
}
