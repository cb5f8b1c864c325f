mod cli;
mod conf;
mod configuration_version;
mod error;
mod gha;
mod input;
mod outputs;
mod run;
mod runner;
mod stager;
mod tfe;

use human_panic::setup_panic;
use polyfmt::error;

#[tokio::main]
async fn main() {
    setup_panic!();

    let cli = cli::Cli::new();

    if let Err(e) = cli.run().await {
        error!("{:?}", e);
        std::process::exit(1)
    }
}
