//! Binary entry point: parses CLI arguments and drives the pull runner.

use clap::Parser;
use docker_image_puller::cli::{Cli, Runner};
use docker_image_puller::logging::Logger;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let runner = match Runner::new(cli) {
        Ok(runner) => runner,
        Err(e) => {
            Logger::new(0).error(&e.to_string());
            std::process::exit(1);
        }
    };

    if let Err(e) = runner.run().await {
        Logger::new(0).error(&e.to_string());
        std::process::exit(1);
    }
}
