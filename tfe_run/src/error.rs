use crate::run::status::RunStatus;
use crate::tfe::TfeError;
use std::path::PathBuf;
use std::time::Duration;

/// Represents every way a run attempt can fail after the step parameters were accepted.
#[derive(thiserror::Error, Debug)]
pub enum RunError {
    /// A call to the control plane failed. `operation` and `target` describe what was attempted.
    #[error("could not {operation} '{target}'; {source}")]
    Remote {
        operation: &'static str,
        target: String,
        #[source]
        source: TfeError,
    },

    /// Creating a configuration version came back as not found. Organization tokens are not allowed to
    /// create configuration versions, so this almost always means the wrong kind of token was supplied.
    #[error(
        "could not create configuration version for workspace '{workspace_id}' (404 not found); this \
         usually means the token is not a user or team API token"
    )]
    ConfigurationVersionNotFound { workspace_id: String },

    #[error("could not write variables file '{path}'; {source}")]
    Overlay {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The API calls all succeeded but the run itself did not.
    #[error("run {run_id} finished with status '{status}'")]
    RunFailed { run_id: String, status: RunStatus },

    #[error("run {run_id} did not finish within {timeout:?}; last status was '{status}'")]
    PollDeadlineExceeded {
        run_id: String,
        status: RunStatus,
        timeout: Duration,
    },

    #[error("could not parse state version for workspace '{workspace_id}'; {source}")]
    StateParse {
        workspace_id: String,
        #[source]
        source: serde_json::Error,
    },
}

impl RunError {
    pub fn remote(operation: &'static str, target: impl Into<String>, source: TfeError) -> Self {
        RunError::Remote {
            operation,
            target: target.into(),
            source,
        }
    }
}
