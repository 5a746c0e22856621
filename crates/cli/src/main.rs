use clap::Parser;
use tracing::error;

mod cli;
mod commands;
mod config;
mod logging;
mod stream;

use cli::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);

    if let Err(err) = commands::dispatch(cli).await {
        error!(target = "scenelink", error = %err, "command failed");
        std::process::exit(1);
    }
}
