use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use rust_embed::RustEmbed;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(RustEmbed)]
#[folder = "src/conf/"]
#[include = "*.toml"]
struct EmbeddedConfigFS;

const DEFAULT_CONFIG_FILE: &str = "default_config.toml";

/// Environment variables with this prefix override any file based setting. Nested keys are separated with a
/// double underscore: `TFE_RUN_RUN__POLL_INTERVAL=10`.
const ENV_PREFIX: &str = "TFE_RUN_";

/// Lowest poll interval we allow; anything faster just hammers the API.
const MIN_POLL_INTERVAL: u64 = 1;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ConfError {
    #[error("could not load embedded default configuration")]
    MissingDefault,

    #[error("could not parse config; {0}")]
    Parsing(String),

    #[error("invalid {argument}: '{value}'; {description}")]
    InvalidArgument {
        argument: String,
        value: String,
        description: String,
    },
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub general: General,
    pub api: Api,
    pub run: Run,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct General {
    pub log_level: String,
    pub log_format: LogFormat,
}

#[derive(Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Api {
    pub host: String,
    pub user_agent: String,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Run {
    /// In seconds.
    pub poll_interval: u64,

    /// In seconds; 0 means no deadline.
    pub poll_timeout: u64,
}

impl Config {
    /// Returns a validated config. Later sources win: the embedded defaults, then the config file
    /// (`path_override`, or every default path that exists), then `TFE_RUN_` environment variables.
    pub fn load(path_override: Option<&Path>) -> Result<Self, ConfError> {
        let config: Config = Self::figment(path_override)?
            .extract()
            .map_err(|e| ConfError::Parsing(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    fn figment(path_override: Option<&Path>) -> Result<Figment, ConfError> {
        let default_config =
            EmbeddedConfigFS::get(DEFAULT_CONFIG_FILE).ok_or(ConfError::MissingDefault)?;
        let default_config = std::str::from_utf8(&default_config.data)
            .map_err(|e| ConfError::Parsing(e.to_string()))?
            .to_string();

        let mut figment = Figment::new().merge(Toml::string(&default_config));

        match path_override {
            Some(path) => figment = figment.merge(Toml::file(path)),
            None => {
                for path in default_config_paths() {
                    figment = figment.merge(Toml::file(path));
                }
            }
        }

        Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    fn validate(&self) -> Result<(), ConfError> {
        if self.run.poll_interval < MIN_POLL_INTERVAL {
            return Err(ConfError::InvalidArgument {
                argument: "run.poll_interval".to_string(),
                value: self.run.poll_interval.to_string(),
                description: format!("must be at least {MIN_POLL_INTERVAL} second(s)"),
            });
        }

        if self.api.host.is_empty() {
            return Err(ConfError::InvalidArgument {
                argument: "api.host".to_string(),
                value: self.api.host.clone(),
                description: "cannot be empty".to_string(),
            });
        }

        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.run.poll_interval)
    }

    pub fn poll_timeout(&self) -> Option<Duration> {
        match self.run.poll_timeout {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

/// The default configuration paths that are searched in case the user does not specify one.
fn default_config_paths() -> Vec<PathBuf> {
    let mut paths = vec![];

    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".tfe_run.toml"));
    }

    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("tfe_run.toml"));
    }

    paths
}
