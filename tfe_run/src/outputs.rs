//! Reads the root module outputs out of a workspace's current state.

use crate::error::RunError;
use crate::tfe::Client;
use polyfmt::println;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// The subset of the state file format we need. Everything besides `outputs` is ignored.
#[derive(Deserialize, Debug, Default)]
struct State {
    #[serde(default)]
    outputs: Option<HashMap<String, StateOutput>>,
}

#[derive(Deserialize, Debug)]
struct StateOutput {
    #[serde(default)]
    value: serde_json::Value,
}

/// Flattens the outputs section of a raw state file into name/value pairs. String values are taken as is,
/// anything else is rendered as compact json.
pub fn parse_state_outputs(raw: &[u8]) -> Result<BTreeMap<String, String>, serde_json::Error> {
    let state: State = serde_json::from_slice(raw)?;

    let outputs = state
        .outputs
        .unwrap_or_default()
        .into_iter()
        .map(|(name, output)| {
            let value = match output.value {
                serde_json::Value::String(value) => value,
                other => other.to_string(),
            };

            (name, value)
        })
        .collect();

    Ok(outputs)
}

/// Downloads the current state of the workspace and returns its outputs.
pub async fn extract_outputs(
    client: &dyn Client,
    workspace_id: &str,
) -> Result<BTreeMap<String, String>, RunError> {
    let state_version = client
        .read_current_state_version(workspace_id)
        .await
        .map_err(|e| RunError::remote("read current state version of workspace", workspace_id, e))?;

    debug!(state_version = %state_version.id, "downloading state version");

    let raw = client
        .download_state_version(&state_version.download_url)
        .await
        .map_err(|e| RunError::remote("download state version", state_version.id.as_str(), e))?;

    let outputs = parse_state_outputs(&raw).map_err(|source| RunError::StateParse {
        workspace_id: workspace_id.to_string(),
        source,
    })?;

    if !outputs.is_empty() {
        println!(
            "Outputs: {}",
            outputs.keys().cloned().collect::<Vec<_>>().join(", ")
        );
    }

    Ok(outputs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tfe::testing::{Failure, FakeClient};
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[test]
    fn parse_string_output() {
        let outputs =
            parse_state_outputs(br#"{"outputs":{"x":{"type":"string","value":"v"}}}"#).unwrap();

        assert_eq!(outputs, BTreeMap::from([("x".to_string(), "v".to_string())]));
    }

    #[test]
    fn parse_complex_outputs_as_json() {
        let raw = br#"{
            "version": 4,
            "terraform_version": "1.5.7",
            "resources": [{"type": "null_resource"}],
            "outputs": {
                "count": {"type": "number", "value": 3},
                "enabled": {"type": "bool", "value": true, "sensitive": false},
                "zones": {"type": ["list", "string"], "value": ["a", "b"]},
                "tags": {"type": ["map", "string"], "value": {"env": "prod"}}
            }
        }"#;

        let outputs = parse_state_outputs(raw).unwrap();

        assert_eq!(
            outputs,
            BTreeMap::from([
                ("count".to_string(), "3".to_string()),
                ("enabled".to_string(), "true".to_string()),
                ("tags".to_string(), r#"{"env":"prod"}"#.to_string()),
                ("zones".to_string(), r#"["a","b"]"#.to_string()),
            ])
        );
    }

    #[rstest]
    #[case(br#"{}"#.as_slice())]
    #[case(br#"{"outputs":null}"#.as_slice())]
    #[case(br#"{"outputs":{}}"#.as_slice())]
    fn parse_without_outputs(#[case] raw: &[u8]) {
        assert!(parse_state_outputs(raw).unwrap().is_empty());
    }

    #[test]
    fn parse_invalid_state_fails() {
        assert!(parse_state_outputs(b"not json").is_err());
    }

    #[tokio::test]
    async fn extract_reads_current_state() {
        let client = FakeClient::new(true)
            .state(br#"{"version":4,"outputs":{"endpoint":{"value":"10.0.0.1"}}}"#);

        let outputs = extract_outputs(&client, "ws-test").await.unwrap();

        assert_eq!(
            outputs,
            BTreeMap::from([("endpoint".to_string(), "10.0.0.1".to_string())])
        );
        assert_eq!(
            client.calls(),
            vec!["read_current_state_version", "download_state_version"]
        );
    }

    #[tokio::test]
    async fn extract_maps_parse_failure() {
        let client = FakeClient::new(true).state(b"{");

        let err = extract_outputs(&client, "ws-test").await.unwrap_err();

        assert!(matches!(err, RunError::StateParse { ref workspace_id, .. } if workspace_id == "ws-test"));
    }

    #[tokio::test]
    async fn extract_without_state_fails() {
        let client =
            FakeClient::new(true).failing("read_current_state_version", Failure::NotFound);

        let err = extract_outputs(&client, "ws-test").await.unwrap_err();

        assert!(matches!(err, RunError::Remote { source, .. } if source.is_not_found()));
    }
}
