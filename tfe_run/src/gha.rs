//! Interaction with the GitHub Actions runner: reading inputs, masking secrets and writing outputs.
//!
//! Outside of GitHub Actions inputs come from a local json file and outputs are printed, which keeps the
//! binary usable from a terminal.

use crate::input::Input;
use crate::runner::RunOutcome;
use anyhow::{Context, Result};
use std::env;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

/// Indicates whether tfe-run is running inside the GitHub Actions environment.
pub fn in_github_actions() -> bool {
    get_env("GITHUB_ACTIONS").as_deref() == Some("true")
}

/// The commit that triggered the workflow, if any.
pub fn commit_sha() -> Option<String> {
    get_env("GITHUB_SHA")
}

fn get_env(key: &str) -> Option<String> {
    if let Ok(value) = env::var(key) {
        if !value.is_empty() {
            return Some(value);
        }
    }

    None
}

/// The environment variable GitHub uses to pass the input with the given name.
fn input_env_key(name: &str) -> String {
    format!("INPUT_{}", name.replace(' ', "_").to_uppercase())
}

/// Reads an action input; whitespace around the value is dropped.
pub fn get_input(name: &str) -> Option<String> {
    get_env(&input_env_key(name)).map(|value| value.trim().to_string())
}

/// Tells the runner to scrub the value from the rest of the job log.
pub fn add_mask(value: &str) {
    std::println!("::add-mask::{value}");
}

/// Reads the step parameters from the action inputs, or from `local_input` when not running in GitHub
/// Actions.
pub fn read_input(local_input: &Path) -> Result<Input> {
    if in_github_actions() {
        return Input::resolve(get_input, add_mask).context("Could not read action inputs");
    }

    let raw = std::fs::read(local_input)
        .with_context(|| format!("Could not read '{}'", local_input.display()))?;

    // Nothing to mask in a local terminal.
    Input::from_json(&raw, |_| {})
        .with_context(|| format!("Could not parse '{}'", local_input.display()))
}

/// Renders the outcome as the list of (name, value) outputs.
pub fn outputs(outcome: &RunOutcome) -> Vec<(String, String)> {
    let mut outputs = vec![("run-url".to_string(), outcome.run_url.clone())];

    if let Some(has_changes) = outcome.has_changes {
        outputs.push(("has-changes".to_string(), has_changes.to_string()));
    }

    if let Some(tf_outputs) = &outcome.tf_outputs {
        for (name, value) in tf_outputs {
            outputs.push((format!("tf-{name}"), value.clone()));
        }
    }

    outputs
}

/// Formats a single output in the `GITHUB_OUTPUT` file syntax. Multi-line values use a heredoc delimiter
/// that does not occur in the value.
fn format_output_line(name: &str, value: &str) -> String {
    if !value.contains('\n') {
        return format!("{name}={value}\n");
    }

    let mut delimiter = String::from("ghadelimiter");
    while value.contains(&delimiter) {
        delimiter.push('_');
    }

    format!("{name}<<{delimiter}\n{value}\n{delimiter}\n")
}

/// Appends outputs to the runner's output file; earlier content is left alone.
fn append_outputs(path: &Path, outputs: &[(String, String)]) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Could not open output file '{}'", path.display()))?;

    for (name, value) in outputs {
        file.write_all(format_output_line(name, value).as_bytes())
            .with_context(|| format!("Could not write output '{name}'"))?;
    }

    Ok(())
}

/// Writes every output of the outcome back to the pipeline.
pub fn write_outcome(outcome: &RunOutcome) -> Result<()> {
    let outputs = outputs(outcome);

    if let Some(path) = get_env("GITHUB_OUTPUT") {
        return append_outputs(Path::new(&path), &outputs);
    }

    for (name, value) in outputs {
        if in_github_actions() {
            std::println!("::set-output name={name}::{value}");
        } else {
            std::println!("{name}={value}");
        }
    }

    Ok(())
}
