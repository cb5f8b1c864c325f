//! Creation and upload of the configuration version a run is started from.

use crate::error::RunError;
use crate::stager::VariablesOverlay;
use crate::tfe::{Client, ConfigurationVersion, Workspace};
use polyfmt::println;
use std::path::Path;
use tracing::{debug, warn};

/// Creates a configuration version that never queues runs on its own; the run is created explicitly
/// afterwards so its message and kind can be set.
pub async fn create(
    client: &dyn Client,
    workspace_id: &str,
    speculative: bool,
) -> Result<ConfigurationVersion, RunError> {
    let version = client
        .create_configuration_version(workspace_id, speculative)
        .await
        .map_err(|e| {
            if e.is_not_found() {
                RunError::ConfigurationVersionNotFound {
                    workspace_id: workspace_id.to_string(),
                }
            } else {
                RunError::remote("create configuration version for workspace", workspace_id, e)
            }
        })?;

    debug!(
        configuration_version_id = %version.id,
        speculative = version.speculative,
        "created configuration version"
    );

    if version.auto_queue_runs {
        warn!(
            configuration_version_id = %version.id,
            "configuration version was created with auto-queue-runs enabled; a second run may be queued"
        );
    }

    Ok(version)
}

/// Uploads `directory` as the payload of `configuration_version`.
pub async fn upload(
    client: &dyn Client,
    configuration_version: &ConfigurationVersion,
    directory: &Path,
) -> Result<(), RunError> {
    println!("Uploading directory...");

    client
        .upload_configuration_version(&configuration_version.upload_url, directory)
        .await
        .map_err(|e| RunError::remote("upload directory", directory.display().to_string(), e))?;

    println!("Done uploading.");
    Ok(())
}

/// Stages the variables overlay (if any), uploads the directory and removes the overlay again, whichever way
/// the upload went.
pub async fn stage_and_upload(
    client: &dyn Client,
    configuration_version: &ConfigurationVersion,
    workspace: &Workspace,
    directory: &Path,
    tf_vars: Option<&str>,
) -> Result<(), RunError> {
    let overlay = VariablesOverlay::stage(directory, &workspace.working_directory, tf_vars)?;
    if let Some(overlay) = &overlay {
        debug!(path = %overlay.path().display(), "staged variables file");
    }

    let result = upload(client, configuration_version, directory).await;
    drop(overlay);

    result
}
