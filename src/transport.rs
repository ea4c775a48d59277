//! HTTP client for the PDF service.
//!
//! [`ApiClient`] wraps one `reqwest::Client` and normalises every exchange
//! into `Result<_, WorkbenchError>`:
//!
//! * non-2xx → [`WorkbenchError::Http`] carrying the body's `error` string,
//!   or `HTTP <status>` when the body has none or is not JSON;
//! * no response at all → [`WorkbenchError::Network`] /
//!   [`WorkbenchError::RequestTimeout`];
//! * 2xx with an undecodable body → [`WorkbenchError::MalformedResponse`].
//!
//! Nothing is retried. URL builders are free functions so they stay pure
//! and usable without a client.

use crate::action::ActionRequest;
use crate::config::ClientConfig;
use crate::error::WorkbenchError;
use crate::service::{PdfService, UploadFile};
use crate::types::{
    ErrorBody, HealthReport, ServerSettings, SettingsPatch, SettingsUpdateResponse,
    SubmitResponse, TaskStatus, UploadInfo,
};
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};

// ── URL builders ─────────────────────────────────────────────────────────────

/// `<base>/download/<file_id>?folder=<folder>&delete_after=true`.
///
/// The service deletes the artifact after it has been fetched once.
pub fn download_url(base_url: &str, file_id: &str, folder: &str) -> String {
    format!(
        "{base_url}/download/{}?folder={}&delete_after=true",
        urlencoding::encode(file_id),
        urlencoding::encode(folder)
    )
}

/// Rendered image of one page (1-indexed).
pub fn preview_url(base_url: &str, file_id: &str, page: u32) -> String {
    format!(
        "{base_url}/preview/{}?page={page}",
        urlencoding::encode(file_id)
    )
}

/// Thumbnail of an extracted image.
pub fn image_url(base_url: &str, thumbnail: &str) -> String {
    format!("{base_url}/images/{}", urlencoding::encode(thumbnail))
}

/// Full-size extracted image, addressed by its server-side path.
pub fn image_download_url(base_url: &str, path: &str) -> String {
    format!("{base_url}/download-image?path={}", urlencoding::encode(path))
}

// ── Client ───────────────────────────────────────────────────────────────────

/// HTTP implementation of [`PdfService`] plus the non-task endpoints.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    request_timeout: Duration,
    transfer_timeout: Duration,
}

impl ApiClient {
    pub fn new(config: &ClientConfig) -> Result<Self, WorkbenchError> {
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| WorkbenchError::InvalidConfig(format!("HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            transfer_timeout: Duration::from_secs(config.transfer_timeout_secs),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send a JSON request and decode the JSON response.
    ///
    /// `path` is relative to the base URL and may carry a query string.
    pub async fn request<T, B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<T, WorkbenchError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let mut builder = self
            .http
            .request(method.clone(), self.url(path))
            .timeout(self.request_timeout);
        if let Some(body) = body {
            builder = builder.json(body);
        }
        debug!("{} {}", method, path);
        let response = self.send(builder, path, self.request_timeout).await?;
        let bytes = self.read_body(response, path, self.request_timeout).await?;
        serde_json::from_slice(&bytes).map_err(|e| WorkbenchError::MalformedResponse {
            path: path.to_string(),
            detail: e.to_string(),
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, WorkbenchError> {
        self.request::<T, ()>(Method::GET, path, None).await
    }

    /// GET a binary resource with the transfer timeout.
    async fn get_bytes(&self, path: &str) -> Result<Vec<u8>, WorkbenchError> {
        debug!("GET {} (binary)", path);
        let builder = self
            .http
            .get(self.url(path))
            .timeout(self.transfer_timeout);
        let response = self.send(builder, path, self.transfer_timeout).await?;
        self.read_body(response, path, self.transfer_timeout).await
    }

    /// Send the request and turn any non-2xx answer into [`WorkbenchError::Http`].
    async fn send(
        &self,
        builder: RequestBuilder,
        path: &str,
        timeout: Duration,
    ) -> Result<Response, WorkbenchError> {
        let response = builder
            .send()
            .await
            .map_err(|e| self.connection_error(e, path, timeout))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.bytes().await.unwrap_or_default();
        let message = serde_json::from_slice::<ErrorBody>(&body)
            .ok()
            .and_then(|b| b.error)
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
        Err(WorkbenchError::Http {
            path: path.to_string(),
            status: status.as_u16(),
            message,
        })
    }

    async fn read_body(
        &self,
        response: Response,
        path: &str,
        timeout: Duration,
    ) -> Result<Vec<u8>, WorkbenchError> {
        response
            .bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| self.connection_error(e, path, timeout))
    }

    fn connection_error(&self, e: reqwest::Error, path: &str, timeout: Duration) -> WorkbenchError {
        let url = self.url(path);
        if e.is_timeout() {
            WorkbenchError::RequestTimeout {
                url,
                secs: timeout.as_secs(),
            }
        } else {
            WorkbenchError::Network {
                url,
                reason: e.to_string(),
            }
        }
    }

    // ── Endpoints ────────────────────────────────────────────────────────────

    pub async fn health(&self) -> Result<HealthReport, WorkbenchError> {
        self.get_json("/health").await
    }

    /// Multipart upload under the field name `file`.
    pub async fn upload_file(&self, file: &UploadFile) -> Result<UploadInfo, WorkbenchError> {
        let part = reqwest::multipart::Part::bytes(file.bytes.clone())
            .file_name(file.filename.clone())
            .mime_str("application/pdf")
            .map_err(|e| WorkbenchError::Internal(format!("multipart part: {e}")))?;
        let form = reqwest::multipart::Form::new().part("file", part);

        info!("Uploading '{}' ({} bytes)", file.filename, file.size());
        let builder = self
            .http
            .post(self.url("/upload"))
            .multipart(form)
            .timeout(self.transfer_timeout);
        let response = self.send(builder, "/upload", self.transfer_timeout).await?;
        let bytes = self
            .read_body(response, "/upload", self.transfer_timeout)
            .await?;
        serde_json::from_slice(&bytes).map_err(|e| WorkbenchError::MalformedResponse {
            path: "/upload".into(),
            detail: e.to_string(),
        })
    }

    /// Submit an action; returns the task id.
    pub async fn submit(&self, request: &ActionRequest) -> Result<String, WorkbenchError> {
        let body = request.body();
        let resp: SubmitResponse = self
            .request(Method::POST, request.endpoint(), Some(&body))
            .await?;
        if resp.task_id.is_empty() {
            return Err(WorkbenchError::MalformedResponse {
                path: request.endpoint().into(),
                detail: "empty task_id".into(),
            });
        }
        info!("Submitted {} as task {}", request.kind(), resp.task_id);
        Ok(resp.task_id)
    }

    pub async fn task_status(&self, task_id: &str) -> Result<TaskStatus, WorkbenchError> {
        let path = format!("/task-status/{}", urlencoding::encode(task_id));
        self.get_json(&path).await
    }

    pub fn preview_url(&self, file_id: &str, page: u32) -> String {
        preview_url(&self.base_url, file_id, page)
    }

    pub async fn fetch_preview(&self, file_id: &str, page: u32) -> Result<Vec<u8>, WorkbenchError> {
        let path = format!("/preview/{}?page={page}", urlencoding::encode(file_id));
        self.get_bytes(&path).await
    }

    pub fn download_url(&self, file_id: &str, folder: &str) -> String {
        download_url(&self.base_url, file_id, folder)
    }

    /// Fetch a generated artifact. The service deletes it afterwards.
    pub async fn download(&self, file_id: &str, folder: &str) -> Result<Vec<u8>, WorkbenchError> {
        let path = download_url("", file_id, folder);
        self.get_bytes(&path).await
    }

    pub fn image_url(&self, thumbnail: &str) -> String {
        image_url(&self.base_url, thumbnail)
    }

    pub fn image_download_url(&self, path: &str) -> String {
        image_download_url(&self.base_url, path)
    }

    pub async fn download_image(&self, path: &str) -> Result<Vec<u8>, WorkbenchError> {
        self.get_bytes(&image_download_url("", path)).await
    }

    pub async fn settings(&self) -> Result<ServerSettings, WorkbenchError> {
        self.get_json("/settings").await
    }

    /// Apply a partial settings update and return the settings now in effect.
    pub async fn update_settings(
        &self,
        patch: &SettingsPatch,
    ) -> Result<ServerSettings, WorkbenchError> {
        let resp: SettingsUpdateResponse =
            self.request(Method::POST, "/settings", Some(patch)).await?;
        Ok(resp.settings)
    }
}

#[async_trait]
impl PdfService for ApiClient {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn upload(&self, file: &UploadFile) -> Result<UploadInfo, WorkbenchError> {
        self.upload_file(file).await
    }

    async fn submit(&self, request: &ActionRequest) -> Result<String, WorkbenchError> {
        ApiClient::submit(self, request).await
    }

    async fn task_status(&self, task_id: &str) -> Result<TaskStatus, WorkbenchError> {
        ApiClient::task_status(self, task_id).await
    }
}
