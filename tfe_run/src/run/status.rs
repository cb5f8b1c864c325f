use strum::{Display, EnumIter, EnumString};

/// Every run status the control plane reports that tfe-run knows about.
/// The string forms match the API's `status` attribute.
#[derive(Debug, Clone, Copy, Display, Default, PartialEq, EnumString, EnumIter, Eq, Hash)]
#[strum(serialize_all = "snake_case")]
#[strum(ascii_case_insensitive)]
pub enum RunStatus {
    /// A status string we have never seen before. Newer control planes add statuses over time.
    #[default]
    Unknown,

    /// The initial status of a run once it has been created.
    Pending,

    /// Queued and waiting for a worker to start the plan.
    PlanQueued,

    Planning,

    /// The plan finished and the run is waiting on the next phase.
    Planned,

    CostEstimating,
    CostEstimated,
    PolicyChecking,

    /// A soft-mandatory policy failed and is waiting on someone with override permissions.
    PolicyOverride,

    /// An advisory policy failed; the run may continue.
    PolicySoftFailed,

    PolicyChecked,

    /// Someone (or auto-apply) confirmed the plan; the apply is about to be queued.
    Confirmed,

    /// The plan completed and there is nothing left to do: no changes, or the run was plan only.
    PlannedAndFinished,

    ApplyQueued,
    Applying,
    Applied,

    /// The plan was rejected by a user.
    Discarded,

    Errored,
    Canceled,
}

impl RunStatus {
    /// Parse the status as reported by the API. Anything unrecognized becomes [`RunStatus::Unknown`].
    pub fn parse(value: &str) -> Self {
        value.parse().unwrap_or_default()
    }

    /// Human readable form: `plan_queued` -> `plan queued`.
    pub fn pretty(&self) -> String {
        self.to_string().replace('_', " ")
    }
}

/// How the controller treats a status. This is tfe-run's own grouping and not the control plane's.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    /// The run is still making progress; keep polling.
    Continue,

    /// The run finished without problems.
    Success,

    /// The run reached a phase tfe-run does not understand (cost estimation, policy checks). Polling stops but
    /// the run is neither reported as succeeded nor as failed.
    Unsupported,

    /// The run finished and did not do what was asked.
    Failure,
}

pub fn classify(status: RunStatus) -> StatusClass {
    match status {
        RunStatus::Pending
        | RunStatus::PlanQueued
        | RunStatus::Planning
        | RunStatus::Planned
        | RunStatus::Confirmed
        | RunStatus::ApplyQueued
        | RunStatus::Applying => StatusClass::Continue,

        RunStatus::CostEstimating
        | RunStatus::CostEstimated
        | RunStatus::PolicyChecking
        | RunStatus::PolicyChecked
        | RunStatus::PolicyOverride
        | RunStatus::PolicySoftFailed
        | RunStatus::Unknown => StatusClass::Unsupported,

        RunStatus::PlannedAndFinished | RunStatus::Applied => StatusClass::Success,

        RunStatus::Canceled | RunStatus::Discarded | RunStatus::Errored => StatusClass::Failure,
    }
}
