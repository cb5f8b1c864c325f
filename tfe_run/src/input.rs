//! Step parameters and the run request built from them.
//!
//! Parameters are resolved through the [`PARAMETERS`] table regardless of where they come from (GitHub
//! Actions inputs or a local json file), so there is exactly one place that knows which parameters exist,
//! which ones are required and what they default to.

use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use strum::{Display, EnumString};
use tracing::warn;

/// Represents the different ways step parameters can be wrong. No run is attempted if any of these occur.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum InputError {
    #[error("input parameter '{0}' is required but was not supplied")]
    Missing(String),

    #[error("could not parse input parameter '{name}' as bool; value: '{value}'")]
    InvalidBool { name: String, value: String },

    #[error("unsupported run kind '{0}'; must be one of 'plan', 'apply' or 'destroy'")]
    UnsupportedRunKind(String),

    #[error("could not parse local input file; {0}")]
    Parsing(String),
}

#[derive(Debug, Clone, Copy, Display, Default, PartialEq, EnumString, Eq)]
#[strum(serialize_all = "snake_case")]
#[strum(ascii_case_insensitive)]
pub enum RunKind {
    /// A speculative, plan-only run. It can never be applied.
    Plan,

    #[default]
    Apply,

    /// A run that destroys every resource managed by the workspace.
    Destroy,
}

/// The API token. Wrapped so it can't end up in logs by way of `Debug`.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Token(String);

impl Token {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Token([redacted])")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Token,
    Organization,
    Workspace,
    Message,
    Directory,
    RunKind,
    Speculative,
    WaitForCompletion,
    TfVars,
}

/// A single step parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Parameter {
    /// Name as the pipeline knows it.
    pub name: &'static str,
    pub required: bool,

    /// Value used when the parameter is absent or empty.
    pub default: Option<&'static str>,

    /// Secrets are handed to the masking callback as soon as they are read.
    pub secret: bool,
    pub field: Field,
}

pub const PARAMETERS: &[Parameter] = &[
    Parameter {
        name: "token",
        required: true,
        default: None,
        secret: true,
        field: Field::Token,
    },
    Parameter {
        name: "organization",
        required: true,
        default: None,
        secret: false,
        field: Field::Organization,
    },
    Parameter {
        name: "workspace",
        required: true,
        default: None,
        secret: false,
        field: Field::Workspace,
    },
    Parameter {
        name: "message",
        required: false,
        default: None,
        secret: false,
        field: Field::Message,
    },
    Parameter {
        name: "directory",
        required: false,
        default: Some("./"),
        secret: false,
        field: Field::Directory,
    },
    Parameter {
        name: "run-kind",
        required: false,
        default: Some("apply"),
        secret: false,
        field: Field::RunKind,
    },
    Parameter {
        name: "speculative",
        required: false,
        default: Some("false"),
        secret: false,
        field: Field::Speculative,
    },
    Parameter {
        name: "wait-for-completion",
        required: false,
        default: Some("true"),
        secret: false,
        field: Field::WaitForCompletion,
    },
    Parameter {
        name: "tf-vars",
        required: false,
        default: None,
        secret: false,
        field: Field::TfVars,
    },
];

/// The step parameters exactly as supplied, before any interpretation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Input {
    pub token: Token,
    pub organization: String,
    pub workspace: String,
    pub message: Option<String>,
    pub directory: PathBuf,
    pub run_kind: RunKind,

    /// Deprecated; use `run-kind: plan` instead.
    pub speculative: bool,
    pub wait_for_completion: bool,
    pub tf_vars: Option<String>,
}

impl Input {
    /// Resolves every parameter in [`PARAMETERS`] through `lookup`. Empty values count as absent.
    /// `mask` is called with the value of every secret parameter right after it is read.
    pub fn resolve<L, M>(mut lookup: L, mut mask: M) -> Result<Self, InputError>
    where
        L: FnMut(&str) -> Option<String>,
        M: FnMut(&str),
    {
        let mut input = Input::default();

        for parameter in PARAMETERS {
            let value = lookup(parameter.name).filter(|value| !value.is_empty());

            if parameter.secret {
                if let Some(value) = &value {
                    mask(value);
                }
            }

            let value = match value {
                Some(value) => value,
                None if parameter.required => {
                    return Err(InputError::Missing(parameter.name.to_string()))
                }
                None => match parameter.default {
                    Some(default) => default.to_string(),
                    None => continue,
                },
            };

            input.set(parameter, value)?;
        }

        Ok(input)
    }

    /// Resolves parameters from a json object whose keys are the parameter names. Booleans and numbers are
    /// accepted as their string form.
    pub fn from_json<M>(raw: &[u8], mask: M) -> Result<Self, InputError>
    where
        M: FnMut(&str),
    {
        let object: HashMap<String, Value> =
            serde_json::from_slice(raw).map_err(|e| InputError::Parsing(e.to_string()))?;

        Self::resolve(
            |name| match object.get(name)? {
                Value::Null => None,
                Value::String(value) => Some(value.clone()),
                other => Some(other.to_string()),
            },
            mask,
        )
    }

    fn set(&mut self, parameter: &Parameter, value: String) -> Result<(), InputError> {
        match parameter.field {
            Field::Token => self.token = Token::new(value),
            Field::Organization => self.organization = value,
            Field::Workspace => self.workspace = value,
            Field::Message => self.message = Some(value),
            Field::Directory => self.directory = PathBuf::from(value),
            Field::RunKind => {
                self.run_kind = value
                    .parse()
                    .map_err(|_| InputError::UnsupportedRunKind(value.clone()))?
            }
            Field::Speculative => self.speculative = parse_bool(parameter.name, &value)?,
            Field::WaitForCompletion => {
                self.wait_for_completion = parse_bool(parameter.name, &value)?
            }
            Field::TfVars => self.tf_vars = Some(value),
        }

        Ok(())
    }
}

/// Accepts the same spellings as most CI systems do for booleans.
fn parse_bool(name: &str, value: &str) -> Result<bool, InputError> {
    match value {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Ok(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Ok(false),
        _ => Err(InputError::InvalidBool {
            name: name.to_string(),
            value: value.to_string(),
        }),
    }
}

/// Everything needed to perform one run attempt. Built once from [`Input`] and never changed afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    pub organization: String,
    pub workspace: String,
    pub message: String,
    pub directory: PathBuf,

    /// The effective run kind, after the deprecated `speculative` flag was taken into account.
    pub run_kind: RunKind,
    pub wait_for_completion: bool,
    pub tf_vars: Option<String>,
}

impl RunRequest {
    /// Builds the request; `commit_sha` is only used to fill in a default message.
    pub fn new(input: &Input, commit_sha: Option<&str>) -> Self {
        let mut run_kind = input.run_kind;

        if input.speculative {
            warn!("input parameter 'speculative' is deprecated; use 'run-kind: plan' instead");

            // Plan and destroy are left alone; only apply is downgraded.
            if run_kind == RunKind::Apply {
                run_kind = RunKind::Plan;
            }
        }

        let message = match &input.message {
            Some(message) => message.clone(),
            None => match commit_sha {
                Some(sha) => format!("Queued by tfe-run (commit: {sha})"),
                None => "Queued by tfe-run".to_string(),
            },
        };

        Self {
            organization: input.organization.clone(),
            workspace: input.workspace.clone(),
            message,
            directory: input.directory.clone(),
            run_kind,
            wait_for_completion: input.wait_for_completion,
            tf_vars: input.tf_vars.clone(),
        }
    }

    /// Plan runs are speculative: they are never applied and never produce new state.
    pub fn is_speculative(&self) -> bool {
        self.run_kind == RunKind::Plan
    }

    pub fn is_destroy(&self) -> bool {
        self.run_kind == RunKind::Destroy
    }
}
