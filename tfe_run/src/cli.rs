use crate::conf::{Config, LogFormat};
use crate::gha;
use crate::input::RunRequest;
use crate::run::ConsoleObserver;
use crate::runner;
use crate::tfe::http::HttpClient;
use anyhow::{anyhow, Context, Result};
use clap::Parser;
use polyfmt::success;
use std::path::PathBuf;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "tfe-run")]
#[command(about = "Queues a run on Terraform Cloud or Terraform Enterprise and reports back how it went.")]
#[command(
    long_about = "Queues a run on Terraform Cloud or Terraform Enterprise and reports back how it went.\n\n\
    Inside GitHub Actions the step parameters are read from the action inputs and the results are written \
    as step outputs. Anywhere else the parameters are read from a local json file and the results are \
    printed as name=value lines."
)]
#[command(version)]
pub struct Cli {
    /// Set configuration path; if empty default paths are used
    #[arg(long, value_name = "PATH")]
    config_path: Option<PathBuf>,

    /// Json file holding the step parameters; only read outside of GitHub Actions
    #[arg(long, value_name = "PATH", default_value = "input.json")]
    input: PathBuf,
}

impl Cli {
    pub fn new() -> Self {
        Cli::parse()
    }

    pub async fn run(&self) -> Result<()> {
        let config = Config::load(self.config_path.as_deref())
            .context("Could not load configuration")?;
        init_logging(&config)?;

        let input = gha::read_input(&self.input)?;
        let request = RunRequest::new(&input, gha::commit_sha().as_deref());

        let client = HttpClient::new(&config.api.host, &input.token, &config.api.user_agent)
            .context("Could not create Terraform Cloud client")?;

        let outcome = runner::execute(&client, &request, &config, &mut ConsoleObserver)
            .await
            .context("Run did not complete successfully")?;

        gha::write_outcome(&outcome)?;

        success!("Run finished");
        Ok(())
    }
}

/// Diagnostics go to stderr so they never mix with the outputs written to stdout. `RUST_LOG` takes priority
/// over the configured level.
fn init_logging(config: &Config) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.general.log_level)
            .with_context(|| format!("Invalid log level '{}'", config.general.log_level))?,
    };

    let registry = tracing_subscriber::registry().with(filter);

    let result = match config.general.log_format {
        LogFormat::Pretty => registry
            .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
            .try_init(),
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_ansi(false)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
    };

    result.map_err(|e| anyhow!("Could not initialize logging; {e}"))
}
