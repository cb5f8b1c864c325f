//! The run lifecycle: creating the run, deciding whether to wait for it and polling it to a terminal status.
//!
//! The control plane offers no push mechanism, so the controller re-reads the run on a fixed interval.
//! Every decision the poll loop makes comes from [`status::classify`]; the loop itself only acts on the
//! resulting [`StatusClass`].

pub mod status;

use crate::error::RunError;
use crate::input::RunRequest;
use crate::tfe::{Client, CreateRunRequest, Run, Workspace};
use colored::{ColoredString, Colorize};
use polyfmt::println;
use status::{classify, RunStatus, StatusClass};
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{info, warn};

/// Receives progress notifications from [`RunController::await_terminal`].
pub trait RunObserver {
    /// Called once for every status that differs from the previously read one.
    fn status_changed(&mut self, run: &Run);

    /// Called once when polling stops because the run reached a status tfe-run does not handle.
    fn unsupported_status(&mut self, run: &Run);
}

/// Reports progress on the console.
#[derive(Debug, Default)]
pub struct ConsoleObserver;

impl RunObserver for ConsoleObserver {
    fn status_changed(&mut self, run: &Run) {
        info!(run_id = %run.id, status = %run.status, "run status changed");
        println!("Run status: {}", colorize_status(run.status));
    }

    fn unsupported_status(&mut self, run: &Run) {
        warn!(run_id = %run.id, status = %run.status, "run is in an unsupported status");
        println!(
            "Run is in unexpected / unsupported status {}, finishing process",
            colorize_status(run.status)
        );
    }
}

fn colorize_status(status: RunStatus) -> ColoredString {
    let text = status.pretty();

    match classify(status) {
        StatusClass::Continue => text.cyan(),
        StatusClass::Success => text.green(),
        StatusClass::Unsupported => text.yellow(),
        StatusClass::Failure => text.red(),
    }
}

/// Whether the controller should poll a freshly created run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitDecision {
    Poll,

    /// The caller asked not to wait.
    NotRequested,

    /// The run would wait on a manual confirmation (or on an earlier run that does) and could hang forever.
    AutoApplyDisabled,
}

/// Decides, before polling starts, whether the run should be waited on.
pub fn should_wait(request: &RunRequest, workspace: &Workspace) -> WaitDecision {
    if !request.wait_for_completion {
        return WaitDecision::NotRequested;
    }

    // Speculative runs never wait on a confirmation.
    if !request.is_speculative() && !workspace.auto_apply {
        return WaitDecision::AutoApplyDisabled;
    }

    WaitDecision::Poll
}

/// Drives a single run from creation to a terminal status.
#[derive(Debug)]
pub struct RunController<'a> {
    client: &'a dyn Client,
    poll_interval: Duration,

    /// When set, polling gives up after this long.
    poll_timeout: Option<Duration>,
}

impl<'a> RunController<'a> {
    pub fn new(client: &'a dyn Client, poll_interval: Duration) -> Self {
        Self {
            client,
            poll_interval,
            poll_timeout: None,
        }
    }

    pub fn poll_timeout(mut self, poll_timeout: Option<Duration>) -> Self {
        self.poll_timeout = poll_timeout;
        self
    }

    pub async fn create(
        &self,
        workspace_id: &str,
        configuration_version_id: &str,
        message: &str,
        is_destroy: bool,
    ) -> Result<Run, RunError> {
        self.client
            .create_run(CreateRunRequest {
                workspace_id: workspace_id.to_string(),
                configuration_version_id: configuration_version_id.to_string(),
                message: message.to_string(),
                is_destroy,
            })
            .await
            .map_err(|e| RunError::remote("create run for workspace", workspace_id, e))
    }

    /// Polls `run` until it reaches a status that is not [`StatusClass::Continue`] and returns the last read.
    ///
    /// Success and unsupported statuses return the run; failure statuses return [`RunError::RunFailed`].
    pub async fn await_terminal(
        &self,
        run: Run,
        observer: &mut dyn RunObserver,
    ) -> Result<Run, RunError> {
        let started = Instant::now();
        let mut previous: Option<RunStatus> = None;
        let run_id = run.id;

        loop {
            let run = self
                .client
                .read_run(&run_id)
                .await
                .map_err(|e| RunError::remote("read run", run_id.as_str(), e))?;

            if previous != Some(run.status) {
                observer.status_changed(&run);
                previous = Some(run.status);
            }

            match classify(run.status) {
                StatusClass::Continue => {}
                StatusClass::Success => return Ok(run),
                StatusClass::Unsupported => {
                    observer.unsupported_status(&run);
                    return Ok(run);
                }
                StatusClass::Failure => {
                    return Err(RunError::RunFailed {
                        run_id: run.id,
                        status: run.status,
                    })
                }
            }

            if let Some(timeout) = self.poll_timeout {
                if started.elapsed() >= timeout {
                    return Err(RunError::PollDeadlineExceeded {
                        run_id: run.id,
                        status: run.status,
                        timeout,
                    });
                }
            }

            sleep(self.poll_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{Input, RunKind};
    use crate::tfe::testing::{Failure, FakeClient, RUN_ID};
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    const INTERVAL: Duration = Duration::from_millis(1);

    #[derive(Debug, Default)]
    struct RecordingObserver {
        changes: Vec<RunStatus>,
        unsupported: Vec<RunStatus>,
    }

    impl RunObserver for RecordingObserver {
        fn status_changed(&mut self, run: &Run) {
            self.changes.push(run.status);
        }

        fn unsupported_status(&mut self, run: &Run) {
            self.unsupported.push(run.status);
        }
    }

    fn created_run() -> Run {
        Run {
            id: RUN_ID.to_string(),
            status: RunStatus::Pending,
            has_changes: false,
        }
    }

    fn request(run_kind: RunKind, speculative: bool, wait_for_completion: bool) -> RunRequest {
        RunRequest::new(
            &Input {
                run_kind,
                speculative,
                wait_for_completion,
                ..Default::default()
            },
            None,
        )
    }

    #[rstest]
    #[case(&[RunStatus::Pending, RunStatus::Planning, RunStatus::PlannedAndFinished])]
    #[case(&[RunStatus::PlanQueued, RunStatus::Planning, RunStatus::Planned, RunStatus::Confirmed,
             RunStatus::ApplyQueued, RunStatus::Applying, RunStatus::Applied])]
    #[case(&[RunStatus::Applied])]
    #[tokio::test]
    async fn await_success(#[case] statuses: &[RunStatus]) {
        let client = FakeClient::new(true).statuses(statuses);
        let controller = RunController::new(&client, INTERVAL);
        let mut observer = RecordingObserver::default();

        let run = controller
            .await_terminal(created_run(), &mut observer)
            .await
            .unwrap();

        assert_eq!(Some(&run.status), statuses.last());
        assert!(run.has_changes);
        assert_eq!(client.count("read_run"), statuses.len());
        assert!(observer.unsupported.is_empty());
    }

    #[tokio::test]
    async fn await_reports_has_changes_from_last_read() {
        let client = FakeClient::new(true).reads(vec![
            Run {
                id: RUN_ID.into(),
                status: RunStatus::Planning,
                has_changes: true,
            },
            Run {
                id: RUN_ID.into(),
                status: RunStatus::PlannedAndFinished,
                has_changes: false,
            },
        ]);
        let controller = RunController::new(&client, INTERVAL);

        let run = controller
            .await_terminal(created_run(), &mut RecordingObserver::default())
            .await
            .unwrap();

        assert!(!run.has_changes);
    }

    #[rstest]
    #[case(RunStatus::Canceled)]
    #[case(RunStatus::Discarded)]
    #[case(RunStatus::Errored)]
    #[tokio::test]
    async fn await_failure(#[case] terminal: RunStatus) {
        let client = FakeClient::new(true).statuses(&[RunStatus::Planning, terminal]);
        let controller = RunController::new(&client, INTERVAL);

        let err = controller
            .await_terminal(created_run(), &mut RecordingObserver::default())
            .await
            .unwrap_err();

        let message = err.to_string();
        assert!(matches!(err, RunError::RunFailed { ref run_id, status } if run_id == RUN_ID && status == terminal));
        assert!(message.contains(RUN_ID));
        assert!(message.contains(&terminal.to_string()));
    }

    #[rstest]
    #[case(RunStatus::CostEstimating)]
    #[case(RunStatus::CostEstimated)]
    #[case(RunStatus::PolicyChecking)]
    #[case(RunStatus::PolicyChecked)]
    #[case(RunStatus::PolicyOverride)]
    #[case(RunStatus::PolicySoftFailed)]
    #[case(RunStatus::Unknown)]
    #[tokio::test]
    async fn await_unsupported_stops_once(#[case] unsupported: RunStatus) {
        let client = FakeClient::new(true).statuses(&[
            RunStatus::Planning,
            unsupported,
            RunStatus::Applied,
        ]);
        let controller = RunController::new(&client, INTERVAL);
        let mut observer = RecordingObserver::default();

        let run = controller
            .await_terminal(created_run(), &mut observer)
            .await
            .unwrap();

        assert_eq!(run.status, unsupported);
        assert_eq!(observer.unsupported, vec![unsupported]);
        assert_eq!(client.count("read_run"), 2);
    }

    #[tokio::test]
    async fn status_changes_are_deduplicated() {
        let client = FakeClient::new(true).statuses(&[
            RunStatus::Pending,
            RunStatus::Pending,
            RunStatus::Planning,
            RunStatus::Planned,
            RunStatus::Applied,
        ]);
        let controller = RunController::new(&client, INTERVAL);
        let mut observer = RecordingObserver::default();

        controller
            .await_terminal(created_run(), &mut observer)
            .await
            .unwrap();

        assert_eq!(
            observer.changes,
            vec![
                RunStatus::Pending,
                RunStatus::Planning,
                RunStatus::Planned,
                RunStatus::Applied
            ]
        );
    }

    #[tokio::test]
    async fn read_failure_aborts_immediately() {
        let client = FakeClient::new(true)
            .statuses(&[RunStatus::Planning])
            .failing("read_run", Failure::Other);
        let controller = RunController::new(&client, INTERVAL);

        let err = controller
            .await_terminal(created_run(), &mut RecordingObserver::default())
            .await
            .unwrap_err();

        assert!(matches!(err, RunError::Remote { operation: "read run", .. }));
        assert_eq!(client.count("read_run"), 1);
    }

    #[tokio::test]
    async fn poll_deadline_is_enforced() {
        let client = FakeClient::new(true).statuses(&[RunStatus::Planning]);
        let controller =
            RunController::new(&client, INTERVAL).poll_timeout(Some(Duration::from_millis(20)));

        let err = controller
            .await_terminal(created_run(), &mut RecordingObserver::default())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            RunError::PollDeadlineExceeded {
                status: RunStatus::Planning,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn create_passes_destroy_flag() {
        let client = FakeClient::new(true);
        let controller = RunController::new(&client, INTERVAL);

        let run = controller
            .create("ws-test", "cv-test", "hello", true)
            .await
            .unwrap();

        assert_eq!(run.id, RUN_ID);
        let created = client.created_runs.lock().unwrap();
        assert_eq!(created.len(), 1);
        assert!(created[0].is_destroy);
        assert_eq!(created[0].message, "hello");
    }

    #[rstest]
    #[case(RunKind::Apply, false, true, false, WaitDecision::AutoApplyDisabled)]
    #[case(RunKind::Apply, false, true, true, WaitDecision::Poll)]
    #[case(RunKind::Destroy, false, true, false, WaitDecision::AutoApplyDisabled)]
    #[case(RunKind::Plan, false, true, false, WaitDecision::Poll)]
    #[case(RunKind::Apply, true, true, false, WaitDecision::Poll)]
    #[case(RunKind::Apply, false, false, true, WaitDecision::NotRequested)]
    #[case(RunKind::Plan, false, false, true, WaitDecision::NotRequested)]
    fn wait_gate(
        #[case] run_kind: RunKind,
        #[case] speculative: bool,
        #[case] wait_for_completion: bool,
        #[case] auto_apply: bool,
        #[case] expected: WaitDecision,
    ) {
        let workspace = FakeClient::new(auto_apply).workspace();

        assert_eq!(
            should_wait(&request(run_kind, speculative, wait_for_completion), &workspace),
            expected
        );
    }
}
