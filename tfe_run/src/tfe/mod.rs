//! The subset of the Terraform Cloud/Enterprise API that tfe-run drives.
//!
//! Everything above this module talks to the control plane through the [`Client`] trait, the HTTP
//! implementation lives in [`http`] and tests swap in the scripted fake from [`testing`].

pub mod http;
pub mod slug;
#[cfg(test)]
pub mod testing;

use crate::run::status::RunStatus;
use async_trait::async_trait;
use std::fmt::Debug;
use std::path::Path;

/// Represents the different ways a call to the control plane can fail. Callers only ever need to tell
/// "not found" apart from everything else; the other variants exist so the message is useful.
#[derive(thiserror::Error, Debug)]
pub enum TfeError {
    /// The requested resource does not exist or the token is not allowed to see it.
    #[error("resource not found; {0}")]
    NotFound(String),

    /// The API answered with a non-success status code.
    #[error("unexpected response status {status}; {body}")]
    Status { status: u16, body: String },

    /// The request never got a response.
    #[error("could not reach api; {0}")]
    Connection(String),

    /// The API answered but the response body did not look like we expected.
    #[error("could not decode api response; {0}")]
    Decode(String),

    /// Building the upload archive failed before anything was sent.
    #[error("could not package directory; {0}")]
    Packaging(String),
}

impl TfeError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, TfeError::NotFound(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    pub id: String,
    pub name: String,

    /// Runs in this workspace apply without manual confirmation.
    pub auto_apply: bool,

    /// Subdirectory of the uploaded configuration that Terraform runs in. Empty means the root.
    pub working_directory: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigurationVersion {
    pub id: String,
    pub upload_url: String,
    pub auto_queue_runs: bool,
    pub speculative: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Run {
    pub id: String,
    pub status: RunStatus,
    pub has_changes: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateVersion {
    pub id: String,
    pub download_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateRunRequest {
    pub workspace_id: String,
    pub configuration_version_id: String,
    pub message: String,
    pub is_destroy: bool,
}

/// The Client trait defines the calls tfe-run makes against the control plane. Implementations are expected
/// to handle transport concerns (TLS, auth headers, connection retries) themselves.
#[async_trait]
pub trait Client: Debug + Send + Sync {
    /// Look up a workspace by organization and name.
    async fn read_workspace(&self, organization: &str, workspace: &str)
        -> Result<Workspace, TfeError>;

    /// Create a new configuration version. Runs are never queued automatically for it.
    async fn create_configuration_version(
        &self,
        workspace_id: &str,
        speculative: bool,
    ) -> Result<ConfigurationVersion, TfeError>;

    /// Package the directory and upload it as the payload of the given configuration version.
    async fn upload_configuration_version(
        &self,
        upload_url: &str,
        directory: &Path,
    ) -> Result<(), TfeError>;

    async fn create_run(&self, request: CreateRunRequest) -> Result<Run, TfeError>;

    async fn read_run(&self, run_id: &str) -> Result<Run, TfeError>;

    async fn read_current_state_version(&self, workspace_id: &str)
        -> Result<StateVersion, TfeError>;

    /// Returns the raw state file behind a state version's download url.
    async fn download_state_version(&self, download_url: &str) -> Result<Vec<u8>, TfeError>;
}
