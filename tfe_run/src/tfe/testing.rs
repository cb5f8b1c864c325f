//! A scripted, in-memory [`Client`] for tests.

use super::{Client, ConfigurationVersion, CreateRunRequest, Run, StateVersion, TfeError, Workspace};
use crate::run::status::RunStatus;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub const RUN_ID: &str = "run-test";
pub const CONFIGURATION_VERSION_ID: &str = "cv-test";
const STATE_DOWNLOAD_URL: &str = "https://archivist.example/state";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    NotFound,
    Other,
}

impl Failure {
    fn error(&self, operation: &str) -> TfeError {
        match self {
            Failure::NotFound => TfeError::NotFound(operation.to_string()),
            Failure::Other => TfeError::Status {
                status: 500,
                body: format!("{operation} failed"),
            },
        }
    }
}

#[derive(Debug)]
pub struct FakeClient {
    workspace: Workspace,

    /// Returned by successive `read_run` calls; the last entry repeats forever.
    reads: Mutex<VecDeque<Run>>,
    state: Vec<u8>,
    failures: HashMap<&'static str, Failure>,

    /// Name of every trait method called, in order.
    pub calls: Mutex<Vec<String>>,

    /// Relative paths of every file present in the directory at the time of upload.
    pub uploaded_files: Mutex<Vec<PathBuf>>,

    pub created_versions: Mutex<Vec<bool>>,
    pub created_runs: Mutex<Vec<CreateRunRequest>>,
}

impl FakeClient {
    pub fn new(auto_apply: bool) -> Self {
        Self {
            workspace: Workspace {
                id: "ws-test".to_string(),
                name: "networking".to_string(),
                auto_apply,
                working_directory: String::new(),
            },
            reads: Mutex::new(VecDeque::new()),
            state: br#"{"version": 4, "outputs": {}}"#.to_vec(),
            failures: HashMap::new(),
            calls: Mutex::new(vec![]),
            uploaded_files: Mutex::new(vec![]),
            created_versions: Mutex::new(vec![]),
            created_runs: Mutex::new(vec![]),
        }
    }

    pub fn working_directory(mut self, working_directory: &str) -> Self {
        self.workspace.working_directory = working_directory.to_string();
        self
    }

    pub fn statuses(self, statuses: &[RunStatus]) -> Self {
        let runs = statuses
            .iter()
            .map(|status| Run {
                id: RUN_ID.to_string(),
                status: *status,
                has_changes: true,
            })
            .collect();

        self.reads(runs)
    }

    pub fn reads(self, runs: Vec<Run>) -> Self {
        *self.reads.lock().unwrap() = runs.into();
        self
    }

    pub fn state(mut self, state: &[u8]) -> Self {
        self.state = state.to_vec();
        self
    }

    pub fn failing(mut self, operation: &'static str, failure: Failure) -> Self {
        self.failures.insert(operation, failure);
        self
    }

    pub fn workspace(&self) -> Workspace {
        self.workspace.clone()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, operation: &str) -> usize {
        self.calls().iter().filter(|call| *call == operation).count()
    }

    fn record(&self, operation: &'static str) -> Result<(), TfeError> {
        self.calls.lock().unwrap().push(operation.to_string());

        match self.failures.get(operation) {
            Some(failure) => Err(failure.error(operation)),
            None => Ok(()),
        }
    }
}

fn list_files(root: &Path, relative: &Path, files: &mut Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(root.join(relative)) else {
        return;
    };

    for entry in entries.flatten() {
        let path = relative.join(entry.file_name());
        if entry.path().is_dir() {
            list_files(root, &path, files);
        } else {
            files.push(path);
        }
    }
}

#[async_trait]
impl Client for FakeClient {
    async fn read_workspace(
        &self,
        _organization: &str,
        _workspace: &str,
    ) -> Result<Workspace, TfeError> {
        self.record("read_workspace")?;
        Ok(self.workspace.clone())
    }

    async fn create_configuration_version(
        &self,
        _workspace_id: &str,
        speculative: bool,
    ) -> Result<ConfigurationVersion, TfeError> {
        self.record("create_configuration_version")?;
        self.created_versions.lock().unwrap().push(speculative);

        Ok(ConfigurationVersion {
            id: CONFIGURATION_VERSION_ID.to_string(),
            upload_url: "https://archivist.example/upload".to_string(),
            auto_queue_runs: false,
            speculative,
        })
    }

    async fn upload_configuration_version(
        &self,
        _upload_url: &str,
        directory: &Path,
    ) -> Result<(), TfeError> {
        let mut files = vec![];
        list_files(directory, Path::new(""), &mut files);
        files.sort();
        *self.uploaded_files.lock().unwrap() = files;

        self.record("upload_configuration_version")
    }

    async fn create_run(&self, request: CreateRunRequest) -> Result<Run, TfeError> {
        self.record("create_run")?;
        self.created_runs.lock().unwrap().push(request);

        Ok(Run {
            id: RUN_ID.to_string(),
            status: RunStatus::Pending,
            has_changes: false,
        })
    }

    async fn read_run(&self, _run_id: &str) -> Result<Run, TfeError> {
        self.record("read_run")?;

        let mut reads = self.reads.lock().unwrap();
        let run = if reads.len() > 1 {
            reads.pop_front()
        } else {
            reads.front().cloned()
        };

        run.ok_or_else(|| TfeError::NotFound("no scripted run reads left".to_string()))
    }

    async fn read_current_state_version(
        &self,
        _workspace_id: &str,
    ) -> Result<StateVersion, TfeError> {
        self.record("read_current_state_version")?;

        Ok(StateVersion {
            id: "sv-test".to_string(),
            download_url: STATE_DOWNLOAD_URL.to_string(),
        })
    }

    async fn download_state_version(&self, _download_url: &str) -> Result<Vec<u8>, TfeError> {
        self.record("download_state_version")?;
        Ok(self.state.clone())
    }
}
