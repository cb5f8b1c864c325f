use super::{
    slug, Client, ConfigurationVersion, CreateRunRequest, Run, StateVersion, TfeError, Workspace,
};
use crate::input::Token;
use crate::run::status::RunStatus;
use async_trait::async_trait;
use reqwest::{header, RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::json;
use std::path::Path;
use tracing::debug;

/// Media type of every JSON:API request and response.
const JSON_API: &str = "application/vnd.api+json";

/// Error bodies can be entire html pages; we only keep the beginning.
const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Deserialize)]
struct Document<T> {
    data: Resource<T>,
}

#[derive(Debug, Deserialize)]
struct Resource<T> {
    id: String,
    attributes: T,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct WorkspaceAttributes {
    name: String,
    #[serde(default)]
    auto_apply: bool,
    #[serde(default)]
    working_directory: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct ConfigurationVersionAttributes {
    #[serde(default)]
    upload_url: Option<String>,
    #[serde(default)]
    auto_queue_runs: bool,
    #[serde(default)]
    speculative: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct RunAttributes {
    status: String,
    #[serde(default)]
    has_changes: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct StateVersionAttributes {
    hosted_state_download_url: Option<String>,
}

/// Talks to the Terraform Cloud/Enterprise v2 API over HTTPS.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpClient {
    /// `host` is either a bare hostname (`app.terraform.io`) or a full url including the scheme.
    pub fn new(host: &str, token: &Token, user_agent: &str) -> Result<Self, TfeError> {
        let mut headers = header::HeaderMap::new();
        let mut authorization =
            header::HeaderValue::from_str(&format!("Bearer {}", token.expose()))
                .map_err(|_| TfeError::Connection("token contains invalid characters".into()))?;
        authorization.set_sensitive(true);
        headers.insert(header::AUTHORIZATION, authorization);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(user_agent)
            .build()
            .map_err(|e| TfeError::Connection(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url(host),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Sends the request and turns every non-success response into an error.
    async fn send(&self, request: RequestBuilder, target: &str) -> Result<Response, TfeError> {
        let response = request
            .send()
            .await
            .map_err(|e| TfeError::Connection(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = if status == StatusCode::NOT_FOUND {
            String::new()
        } else {
            response.text().await.unwrap_or_default()
        };

        Err(status_error(status, target, body))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<Resource<T>, TfeError> {
        let request = self
            .client
            .get(self.url(path))
            .header(header::ACCEPT, JSON_API);

        decode(self.send(request, path).await?).await
    }

    async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<Resource<T>, TfeError> {
        let request = self
            .client
            .post(self.url(path))
            .header(header::ACCEPT, JSON_API)
            .header(header::CONTENT_TYPE, JSON_API)
            .body(body.to_string());

        decode(self.send(request, path).await?).await
    }
}

/// Maps a non-success response onto the error callers can tell apart.
fn status_error(status: StatusCode, target: &str, mut body: String) -> TfeError {
    if status == StatusCode::NOT_FOUND {
        return TfeError::NotFound(target.to_string());
    }

    body.truncate(floor_char_boundary(&body, MAX_ERROR_BODY));

    TfeError::Status {
        status: status.as_u16(),
        body,
    }
}

/// Runs are always created explicitly, so the version must never queue one on its own.
fn configuration_version_document(speculative: bool) -> serde_json::Value {
    json!({
        "data": {
            "type": "configuration-versions",
            "attributes": {
                "auto-queue-runs": false,
                "speculative": speculative,
            }
        }
    })
}

fn run_document(request: &CreateRunRequest) -> serde_json::Value {
    json!({
        "data": {
            "type": "runs",
            "attributes": {
                "message": request.message,
                "is-destroy": request.is_destroy,
            },
            "relationships": {
                "workspace": {
                    "data": { "type": "workspaces", "id": request.workspace_id }
                },
                "configuration-version": {
                    "data": {
                        "type": "configuration-versions",
                        "id": request.configuration_version_id
                    }
                }
            }
        }
    })
}

fn base_url(host: &str) -> String {
    let host = host.trim_end_matches('/');

    if host.contains("://") {
        format!("{host}/api/v2")
    } else {
        format!("https://{host}/api/v2")
    }
}

/// Largest index <= `max` that falls on a char boundary of `value`.
fn floor_char_boundary(value: &str, max: usize) -> usize {
    if value.len() <= max {
        return value.len();
    }

    (0..=max)
        .rev()
        .find(|index| value.is_char_boundary(*index))
        .unwrap_or(0)
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<Resource<T>, TfeError> {
    let document: Document<T> = response
        .json()
        .await
        .map_err(|e| TfeError::Decode(e.to_string()))?;

    Ok(document.data)
}

#[async_trait]
impl Client for HttpClient {
    async fn read_workspace(
        &self,
        organization: &str,
        workspace: &str,
    ) -> Result<Workspace, TfeError> {
        debug!(organization, workspace, "reading workspace");

        let resource: Resource<WorkspaceAttributes> = self
            .get(&format!(
                "/organizations/{organization}/workspaces/{workspace}"
            ))
            .await?;

        Ok(Workspace {
            id: resource.id,
            name: resource.attributes.name,
            auto_apply: resource.attributes.auto_apply,
            working_directory: resource.attributes.working_directory.unwrap_or_default(),
        })
    }

    async fn create_configuration_version(
        &self,
        workspace_id: &str,
        speculative: bool,
    ) -> Result<ConfigurationVersion, TfeError> {
        debug!(workspace_id, speculative, "creating configuration version");

        let body = configuration_version_document(speculative);

        let resource: Resource<ConfigurationVersionAttributes> = self
            .post(
                &format!("/workspaces/{workspace_id}/configuration-versions"),
                body,
            )
            .await?;

        let upload_url = resource.attributes.upload_url.ok_or_else(|| {
            TfeError::Decode(format!(
                "configuration version '{}' has no upload url",
                resource.id
            ))
        })?;

        Ok(ConfigurationVersion {
            id: resource.id,
            upload_url,
            auto_queue_runs: resource.attributes.auto_queue_runs,
            speculative: resource.attributes.speculative,
        })
    }

    async fn upload_configuration_version(
        &self,
        upload_url: &str,
        directory: &Path,
    ) -> Result<(), TfeError> {
        let directory = directory.to_path_buf();
        let slug = tokio::task::spawn_blocking(move || slug::pack(&directory))
            .await
            .map_err(|e| TfeError::Packaging(e.to_string()))?
            .map_err(|e| TfeError::Packaging(e.to_string()))?;

        debug!(bytes = slug.len(), "uploading configuration slug");

        let request = self
            .client
            .put(upload_url)
            .header(header::CONTENT_TYPE, "application/octet-stream")
            .body(slug);

        self.send(request, "configuration version upload url")
            .await?;

        Ok(())
    }

    async fn create_run(&self, request: CreateRunRequest) -> Result<Run, TfeError> {
        debug!(
            workspace_id = %request.workspace_id,
            configuration_version_id = %request.configuration_version_id,
            is_destroy = request.is_destroy,
            "creating run"
        );

        let resource: Resource<RunAttributes> =
            self.post("/runs", run_document(&request)).await?;
        Ok(run_from(resource))
    }

    async fn read_run(&self, run_id: &str) -> Result<Run, TfeError> {
        let resource: Resource<RunAttributes> = self.get(&format!("/runs/{run_id}")).await?;
        Ok(run_from(resource))
    }

    async fn read_current_state_version(
        &self,
        workspace_id: &str,
    ) -> Result<StateVersion, TfeError> {
        debug!(workspace_id, "reading current state version");

        let resource: Resource<StateVersionAttributes> = self
            .get(&format!("/workspaces/{workspace_id}/current-state-version"))
            .await?;

        let download_url = resource.attributes.hosted_state_download_url.ok_or_else(|| {
            TfeError::Decode(format!(
                "state version '{}' has no download url",
                resource.id
            ))
        })?;

        Ok(StateVersion {
            id: resource.id,
            download_url,
        })
    }

    async fn download_state_version(&self, download_url: &str) -> Result<Vec<u8>, TfeError> {
        let response = self
            .send(self.client.get(download_url), "state version download url")
            .await?;

        let bytes = response
            .bytes()
            .await
            .map_err(|e| TfeError::Connection(e.to_string()))?;

        Ok(bytes.to_vec())
    }
}

fn run_from(resource: Resource<RunAttributes>) -> Run {
    let status = RunStatus::parse(&resource.attributes.status);
    if status == RunStatus::Unknown {
        debug!(
            run_id = %resource.id,
            status = %resource.attributes.status,
            "run reported a status tfe-run does not recognize"
        );
    }

    Run {
        id: resource.id,
        status,
        has_changes: resource.attributes.has_changes,
    }
}
