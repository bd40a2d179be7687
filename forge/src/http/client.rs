//! Orchestration-engine HTTP client

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use tracing::{debug, error};
use url::Url;

use crate::api::{OrchestratorApi, PhaseStub, TemplateStub, VariableOutcome};
use crate::errors::ForgeError;

const DUPLICATE_VARIABLE_MARKER: &str = "A variable already exists";
const FOLDER_NOT_FOUND_MARKER: &str = "Could not find folder";

/// REST client for the orchestration engine, basic auth per request.
///
/// TLS certificate verification is disabled on purpose: the target platform
/// runs behind internally-signed certificates and the original tool operates
/// the same way.
pub struct XlrClient {
    client: Client,
    base_url: String,
    username: String,
    password: SecretString,
}

impl XlrClient {
    pub fn new(
        base_url: &str,
        username: &str,
        password: SecretString,
    ) -> Result<Self, ForgeError> {
        Url::parse(base_url)
            .map_err(|e| ForgeError::ConfigError(format!("invalid base URL '{}': {}", base_url, e)))?;

        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .danger_accept_invalid_certs(true)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            username: username.to_string(),
            password,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn authed(&self, request: RequestBuilder) -> RequestBuilder {
        request.basic_auth(&self.username, Some(self.password.expose_secret()))
    }

    async fn check(&self, url: &str, response: Response) -> Result<Response, ForgeError> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("HTTP call failed: {} {} - {}", url, status, body);
            return Err(ForgeError::TaskError(format!("{}: {}: {}", url, status, body)));
        }
        Ok(response)
    }

    async fn get_json(&self, path: &str, query: &[(&str, &str)]) -> Result<Value, ForgeError> {
        let url = self.url(path);
        debug!("GET {}", url);
        let response = self
            .authed(self.client.get(&url).query(query))
            .send()
            .await?;
        let response = self.check(&url, response).await?;
        Ok(response.json().await?)
    }

    async fn post_json(&self, url: &str, body: &Value) -> Result<Value, ForgeError> {
        debug!("POST {}", url);
        let response = self.authed(self.client.post(url).json(body)).send().await?;
        let response = self.check(url, response).await?;
        Ok(response.json().await?)
    }

    async fn delete(&self, path: &str) -> Result<(), ForgeError> {
        let url = self.url(path);
        debug!("DELETE {}", url);
        let response = self.authed(self.client.delete(&url)).send().await?;
        self.check(&url, response).await?;
        Ok(())
    }

    fn extract_id(url: &str, body: &Value) -> Result<String, ForgeError> {
        body.get("id")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| ForgeError::TaskError(format!("{}: response carries no id", url)))
    }
}

#[async_trait]
impl OrchestratorApi for XlrClient {
    async fn find_folder(&self, path: &str) -> Result<String, ForgeError> {
        let url = self.url("folders/find");
        debug!("GET {} byPath={}", url, path);
        let response = self
            .authed(self.client.get(&url).query(&[("byPath", path)]))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if body.contains(FOLDER_NOT_FOUND_MARKER) {
            return Err(ForgeError::NotFound(format!("folder '{}' does not exist", path)));
        }
        if !status.is_success() {
            error!("HTTP call failed: {} {} - {}", url, status, body);
            return Err(ForgeError::TaskError(format!("{}: {}: {}", url, status, body)));
        }
        let parsed: Value = serde_json::from_str(&body)?;
        Self::extract_id(&url, &parsed)
    }

    async fn search_templates(&self, title: &str) -> Result<Vec<TemplateStub>, ForgeError> {
        let body = self.get_json("templates", &[("title", title)]).await?;
        let stubs: Vec<TemplateStub> = serde_json::from_value(body)?;
        Ok(stubs.into_iter().filter(|t| t.title == title).collect())
    }

    async fn delete_template(&self, template_id: &str) -> Result<(), ForgeError> {
        self.delete(&format!("templates/{}", template_id)).await
    }

    async fn create_template(&self, folder_id: &str, body: &Value) -> Result<String, ForgeError> {
        let url = format!("{}?folderId={}", self.url("templates/"), folder_id);
        let response = self.post_json(&url, body).await?;
        Self::extract_id(&url, &response)
    }

    async fn create_phase(&self, template_id: &str, body: &Value) -> Result<String, ForgeError> {
        let url = self.url(&format!("phases/{}/phase", template_id));
        let response = self.post_json(&url, body).await?;
        Self::extract_id(&url, &response)
    }

    async fn find_phases_by_title(
        &self,
        template_id: &str,
        title: &str,
    ) -> Result<Vec<PhaseStub>, ForgeError> {
        let body = self
            .get_json(
                "phases/byTitle",
                &[("phaseTitle", title), ("releaseId", template_id)],
            )
            .await?;
        Ok(serde_json::from_value(body)?)
    }

    async fn delete_phase(&self, phase_id: &str) -> Result<(), ForgeError> {
        self.delete(&format!("phases/{}", phase_id)).await
    }

    async fn create_task(&self, parent_id: &str, body: &Value) -> Result<String, ForgeError> {
        let url = self.url(&format!("tasks/{}/tasks", parent_id));
        let response = self.post_json(&url, body).await?;
        Self::extract_id(&url, &response)
    }

    async fn create_condition(&self, task_id: &str, title: &str) -> Result<(), ForgeError> {
        let url = self.url(&format!("tasks/{}/conditions", task_id));
        self.post_json(&url, &json!({ "title": title, "checked": false }))
            .await?;
        Ok(())
    }

    async fn create_variable(
        &self,
        template_id: &str,
        body: &Value,
    ) -> Result<VariableOutcome, ForgeError> {
        let url = self.url(&format!("releases/{}/variables", template_id));
        debug!("POST {}", url);
        let response = self.authed(self.client.post(&url).json(body)).send().await?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if text.contains(DUPLICATE_VARIABLE_MARKER) {
            return Ok(VariableOutcome::AlreadyExists);
        }
        if !status.is_success() {
            error!("HTTP call failed: {} {} - {}", url, status, text);
            return Err(ForgeError::VariableError(format!(
                "{}: {}: {}",
                url, status, text
            )));
        }
        let parsed: Value = serde_json::from_str(&text)?;
        Ok(VariableOutcome::Created(Self::extract_id(&url, &parsed)?))
    }
}
