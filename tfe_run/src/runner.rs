//! Performs one complete run attempt: upload the directory, queue the run, optionally wait for it and collect
//! its outputs.

use crate::conf::Config;
use crate::configuration_version;
use crate::error::RunError;
use crate::input::RunRequest;
use crate::outputs;
use crate::run::status::{classify, StatusClass};
use crate::run::{should_wait, RunController, RunObserver, WaitDecision};
use crate::tfe::Client;
use polyfmt::println;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// What the pipeline gets told about the run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOutcome {
    pub run_url: String,

    /// Only known when the run was waited on.
    pub has_changes: Option<bool>,

    /// Only collected for non-speculative runs that finished successfully.
    pub tf_outputs: Option<BTreeMap<String, String>>,
}

/// The web UI location of a run. An explicit scheme on `host` is kept, a bare hostname gets https.
pub fn run_url(host: &str, organization: &str, workspace: &str, run_id: &str) -> String {
    let host = host.trim_end_matches('/');
    let base = if host.contains("://") {
        host.to_string()
    } else {
        format!("https://{host}")
    };

    format!("{base}/app/{organization}/workspaces/{workspace}/runs/{run_id}")
}

pub async fn execute(
    client: &dyn Client,
    request: &RunRequest,
    config: &Config,
    observer: &mut dyn RunObserver,
) -> Result<RunOutcome, RunError> {
    let target = format!("{}/{}", request.organization, request.workspace);

    let workspace = client
        .read_workspace(&request.organization, &request.workspace)
        .await
        .map_err(|e| RunError::remote("read workspace", target.as_str(), e))?;

    debug!(
        workspace_id = %workspace.id,
        workspace = %workspace.name,
        auto_apply = workspace.auto_apply,
        "read workspace"
    );

    let configuration_version =
        configuration_version::create(client, &workspace.id, request.is_speculative()).await?;

    configuration_version::stage_and_upload(
        client,
        &configuration_version,
        &workspace,
        &request.directory,
        request.tf_vars.as_deref(),
    )
    .await?;

    let controller = RunController::new(client, config.poll_interval())
        .poll_timeout(config.poll_timeout());

    let run = controller
        .create(
            &workspace.id,
            &configuration_version.id,
            &request.message,
            request.is_destroy(),
        )
        .await?;

    let mut outcome = RunOutcome {
        run_url: run_url(
            &config.api.host,
            &request.organization,
            &request.workspace,
            &run.id,
        ),
        ..Default::default()
    };

    info!(run_id = %run.id, kind = %request.run_kind, "queued run");
    println!("Run {} has been queued", run.id);
    println!("View the run online:");
    println!("{}", outcome.run_url);

    match should_wait(request, &workspace) {
        WaitDecision::Poll => {}
        WaitDecision::NotRequested => {
            println!("Not waiting for the run to complete");
            return Ok(outcome);
        }
        WaitDecision::AutoApplyDisabled => {
            println!(
                "Auto apply is disabled on workspace {}, the run will not be waited on",
                request.workspace
            );
            return Ok(outcome);
        }
    }

    let run = controller.await_terminal(run, observer).await?;
    outcome.has_changes = Some(run.has_changes);

    if classify(run.status) == StatusClass::Success && !request.is_speculative() {
        outcome.tf_outputs = Some(outputs::extract_outputs(client, &workspace.id).await?);
    }

    Ok(outcome)
}
