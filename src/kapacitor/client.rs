/// Kapacitor API client
use anyhow::{Context, Result};
use base64::Engine;
use reqwest::{header, Client, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::models::*;
use crate::config::{AuthMethod, ProviderConfig};

const API_PREFIX: &str = "/kapacitor/v1";

/// Operations the resource lifecycle needs from the task API
#[allow(async_fn_in_trait)]
pub trait TaskApi {
    /// Create a task and return it as stored remotely
    async fn create_task(&self, request: &CreateTaskRequest) -> Result<Task>;

    /// Fetch a task, `None` when it no longer exists
    async fn read_task(&self, id: &str) -> Result<Option<Task>>;

    /// Update a task in place
    async fn update_task(&self, id: &str, request: &UpdateTaskRequest) -> Result<()>;

    /// Delete a task
    async fn delete_task(&self, id: &str) -> Result<()>;
}

/// Main Kapacitor API client
#[derive(Clone)]
pub struct KapacitorClient {
    client: Client,
    base_url: Url,
}

impl KapacitorClient {
    /// Create a new Kapacitor API client
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let mut base_url = Url::parse(&config.url).context("Invalid Kapacitor URL")?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );

        if let Some(credentials) = config.credentials()? {
            let value = match credentials.method {
                AuthMethod::UserAuthentication => {
                    let encoded = base64::engine::general_purpose::STANDARD.encode(format!(
                        "{}:{}",
                        credentials.username, credentials.password
                    ));
                    format!("Basic {}", encoded)
                }
                AuthMethod::BearerAuthentication => format!("Bearer {}", credentials.token),
            };
            let mut value = header::HeaderValue::from_str(&value)
                .context("Invalid credentials format")?;
            value.set_sensitive(true);
            headers.insert(header::AUTHORIZATION, value);
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .danger_accept_invalid_certs(config.insecure_skip_verify)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client, base_url })
    }

    /// Link to a task by id
    pub fn task_link(&self, id: &str) -> String {
        format!("{}/tasks/{}", API_PREFIX, id)
    }

    fn url(&self, link: &str) -> Result<Url> {
        self.base_url
            .join(link.trim_start_matches('/'))
            .with_context(|| format!("Invalid API path: {}", link))
    }

    /// Check the server is reachable, returning its version
    pub async fn ping(&self) -> Result<String> {
        let url = self.url(&format!("{}/ping", API_PREFIX))?;
        debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to send GET request")?;

        let status = response.status();
        if !status.is_success() {
            return Err(Self::error_from(response).await);
        }

        Ok(response
            .headers()
            .get("X-Kapacitor-Version")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
            .to_string())
    }

    /// Create a new task
    pub async fn create_task(&self, request: &CreateTaskRequest) -> Result<Task> {
        let url = self.url(&format!("{}/tasks", API_PREFIX))?;
        debug!("POST {}", url);

        let response = self
            .client
            .post(url)
            .json(request)
            .send()
            .await
            .context("Failed to send POST request")?;

        self.handle_response(response).await
    }

    /// Get a task by link
    pub async fn task(&self, link: &str) -> Result<Option<Task>> {
        let url = self.url(link)?;
        debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to send GET request")?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let task: Task = self.handle_response(response).await?;
        if task.id.is_empty() {
            return Ok(None);
        }
        Ok(Some(task))
    }

    /// Update a task by link
    ///
    /// A `204 No Content` answer carries no task body and counts as success.
    pub async fn update_task(&self, link: &str, request: &UpdateTaskRequest) -> Result<Option<Task>> {
        let url = self.url(link)?;
        debug!("PATCH {}", url);

        let response = self
            .client
            .patch(url)
            .json(request)
            .send()
            .await
            .context("Failed to send PATCH request")?;

        if response.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }

        self.handle_response(response).await.map(Some)
    }

    /// Delete a task by link
    pub async fn delete_task(&self, link: &str) -> Result<()> {
        let url = self.url(link)?;
        debug!("DELETE {}", url);

        let response = self
            .client
            .delete(url)
            .send()
            .await
            .context("Failed to send DELETE request")?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(Self::error_from(response).await)
        }
    }

    /// Handle API response, checking for errors
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        if response.status().is_success() {
            response
                .json::<T>()
                .await
                .context("Failed to parse API response")
        } else {
            Err(Self::error_from(response).await)
        }
    }

    async fn error_from(response: reqwest::Response) -> anyhow::Error {
        let status = response.status();
        let error_text = response.text().await.unwrap_or_default();

        // Try to parse as error response
        if let Ok(error_response) = serde_json::from_str::<ErrorResponse>(&error_text) {
            return anyhow::anyhow!("API error ({}): {}", status, error_response.error);
        }

        anyhow::anyhow!("API request failed with status {}: {}", status, error_text)
    }
}

impl TaskApi for KapacitorClient {
    async fn create_task(&self, request: &CreateTaskRequest) -> Result<Task> {
        KapacitorClient::create_task(self, request).await
    }

    async fn read_task(&self, id: &str) -> Result<Option<Task>> {
        self.task(&self.task_link(id)).await
    }

    async fn update_task(&self, id: &str, request: &UpdateTaskRequest) -> Result<()> {
        KapacitorClient::update_task(self, &self.task_link(id), request)
            .await
            .map(|_| ())
    }

    async fn delete_task(&self, id: &str) -> Result<()> {
        KapacitorClient::delete_task(self, &self.task_link(id)).await
    }
}
