//! `reqwest` implementation of the cloud client.

use crate::archive::pack_project;
use crate::session::{Session, SessionStore};
use crate::{ClientError, ClientResult};
use async_trait::async_trait;
use bytes::Bytes;
use cloudbuild_config::{ConfigError, Settings};
use cloudbuild_core::build::{BuildParameters, BuildResult};
use cloudbuild_core::client::{CloudClient, Download};
use cloudbuild_core::credentials::Credentials;
use cloudbuild_core::project::UploadSummary;
use cloudbuild_core::{ProgressReporter, ProjectId, Result};
use futures::{StreamExt, TryStreamExt};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::RwLock;
use std::time::Duration;
use tracing::{debug, info, warn};

const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    token: String,
}

#[derive(Serialize)]
struct CreateProjectRequest<'a> {
    name: &'a str,
}

#[derive(Deserialize)]
struct CreateProjectResponse {
    project_id: ProjectId,
}

#[derive(Deserialize)]
struct UploadResponse {
    files: usize,
}

#[derive(Deserialize)]
struct QueuedBuild {
    queue_id: String,
}

/// Build state as reported by the polling endpoint.
#[derive(Debug, Deserialize)]
struct BuildStatus {
    status: String,
    #[serde(default)]
    progress: Option<String>,
    #[serde(default)]
    binary_url: Option<String>,
    #[serde(default)]
    error_message: Option<String>,
}

impl BuildStatus {
    fn is_settled(&self) -> bool {
        matches!(self.status.as_str(), "finished" | "failed")
    }

    fn note(&self) -> String {
        match &self.progress {
            Some(progress) => format!("{}: {}", self.status, progress),
            None => self.status.clone(),
        }
    }

    fn into_result(self) -> BuildResult {
        let error_message = match (self.status.as_str(), self.error_message) {
            ("failed", None) if self.binary_url.is_none() => Some("The build failed.".to_string()),
            (_, message) => message,
        };
        BuildResult {
            binary_url: self.binary_url,
            error_message,
        }
    }
}

#[derive(Serialize)]
struct SessionUrlRequest<'a> {
    url: &'a str,
}

#[derive(Deserialize)]
struct SessionUrlResponse {
    url: String,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: String,
}

/// Build cloud client over HTTP.
pub struct HttpCloudClient {
    http: reqwest::Client,
    base_url: String,
    poll_interval: Duration,
    store: SessionStore,
    token: RwLock<Option<String>>,
}

impl HttpCloudClient {
    pub fn new(base_url: impl Into<String>, store: SessionStore) -> ClientResult<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .user_agent(concat!("cloudbuild/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let base_url: String = base_url.into();
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            store,
            token: RwLock::new(None),
        })
    }

    /// Client configured from the user settings.
    pub fn from_settings(settings: &Settings) -> ClientResult<Self> {
        let session_file = settings
            .session_file()
            .map_err(|e: ConfigError| ClientError::Session(e.to_string()))?;
        Ok(Self::new(&settings.api_url, SessionStore::new(session_file))?
            .with_poll_interval(settings.poll_interval))
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Current token, loading it from the session file on first use.
    fn token(&self) -> ClientResult<Option<String>> {
        if let Ok(guard) = self.token.read() {
            if guard.is_some() {
                return Ok(guard.clone());
            }
        }
        let token = self.store.load()?.map(|s| s.token);
        self.set_token(token.clone());
        Ok(token)
    }

    fn set_token(&self, token: Option<String>) {
        if let Ok(mut guard) = self.token.write() {
            *guard = token;
        }
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> ClientResult<reqwest::RequestBuilder> {
        match self.token()? {
            Some(token) => Ok(request.bearer_auth(token)),
            None => Err(ClientError::Unauthorized("Not signed in.".to_string())),
        }
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> ClientResult<reqwest::Response> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiErrorBody>(&text)
            .map(|body| body.error)
            .unwrap_or_else(|_| {
                if text.trim().is_empty() {
                    format!("HTTP {}", status)
                } else {
                    format!("HTTP {}: {}", status, text.trim())
                }
            });

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ClientError::Unauthorized(message));
        }
        Err(ClientError::Api {
            status: status.as_u16(),
            message,
        })
    }

    async fn send_json<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> ClientResult<T> {
        let response = self.send(request.timeout(REQUEST_TIMEOUT)).await?;
        response.json().await.map_err(|e| ClientError::Parse(e.to_string()))
    }

    async fn upload(
        &self,
        project: &ProjectId,
        dir: &Path,
        progress: ProgressReporter,
    ) -> ClientResult<UploadSummary> {
        let dir = dir.to_path_buf();
        let packed = tokio::task::spawn_blocking(move || pack_project(&dir))
            .await
            .map_err(|e| ClientError::Archive(e.to_string()))??;
        info!(project_id = %project, files = packed.files, bytes = packed.data.len(), "Uploading project");

        let total = packed.data.len();
        let data = Bytes::from(packed.data);
        let chunks: Vec<Bytes> = (0..total)
            .step_by(UPLOAD_CHUNK_SIZE)
            .map(|start| data.slice(start..(start + UPLOAD_CHUNK_SIZE).min(total)))
            .collect();

        let mut sent = 0usize;
        let mut last_step = 0usize;
        let body = futures::stream::iter(chunks).map(move |chunk| {
            sent += chunk.len();
            let step = if total == 0 { 10 } else { sent * 10 / total };
            if step > last_step {
                last_step = step;
                progress.report(format!("Uploading... {}%", step * 10));
            }
            Ok::<_, std::io::Error>(chunk)
        });

        let request = self
            .authorized(self.http.post(self.url(&format!("/projects/{}/upload", project))))?
            .header(reqwest::header::CONTENT_TYPE, "application/gzip")
            .header(reqwest::header::CONTENT_LENGTH, total)
            .body(reqwest::Body::wrap_stream(body));

        let response: UploadResponse = self.send(request).await?.json().await?;
        Ok(UploadSummary {
            files: response.files,
        })
    }

    async fn build(
        &self,
        project: &ProjectId,
        params: &BuildParameters,
        progress: ProgressReporter,
    ) -> ClientResult<BuildResult> {
        let queued: QueuedBuild = self
            .send_json(
                self.authorized(self.http.post(self.url(&format!("/projects/{}/builds", project))))?
                    .json(params),
            )
            .await?;
        info!(project_id = %project, queue_id = %queued.queue_id, "Build queued");

        let status_url = self.url(&format!("/projects/{}/builds/{}", project, queued.queue_id));
        let mut last_note = String::new();
        loop {
            let status: BuildStatus = self
                .send_json(self.authorized(self.http.get(&status_url))?)
                .await?;

            let note = status.note();
            if note != last_note {
                progress.report(note.clone());
                last_note = note;
            }

            if status.is_settled() {
                debug!(status = %status.status, "Build settled");
                return Ok(status.into_result());
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

#[async_trait]
impl CloudClient for HttpCloudClient {
    async fn resume_session(&self) -> Result<()> {
        let request = self.authorized(self.http.get(self.url("/user/session")))?;
        self.send(request.timeout(REQUEST_TIMEOUT)).await?;
        debug!("Session is valid");
        Ok(())
    }

    async fn login(&self, credentials: Credentials) -> Result<()> {
        let request = self.http.post(self.url("/user/login")).json(&LoginRequest {
            email: &credentials.identifier,
            password: &credentials.secret,
        });
        let response: LoginResponse = self.send_json(request).await?;

        self.store.save(&Session {
            token: response.token.clone(),
            email: Some(credentials.identifier),
        })?;
        self.set_token(Some(response.token));
        info!(path = %self.store.path().display(), "Stored session");
        Ok(())
    }

    async fn logout(&self) -> Result<()> {
        // The local session goes away even when the server call fails.
        let result = match self.authorized(self.http.post(self.url("/user/logout"))) {
            Ok(request) => self.send(request.timeout(REQUEST_TIMEOUT)).await.map(|_| ()),
            Err(e) => Err(e),
        };
        self.set_token(None);
        self.store.clear()?;
        if let Err(e) = &result {
            warn!(error = %e, "Remote sign out failed");
        }
        result.map_err(Into::into)
    }

    async fn create_project(&self, name: &str) -> Result<ProjectId> {
        let request = self
            .authorized(self.http.post(self.url("/projects")))?
            .json(&CreateProjectRequest { name });
        let response: CreateProjectResponse = self.send_json(request).await?;
        Ok(response.project_id)
    }

    async fn upload_project(
        &self,
        project: &ProjectId,
        dir: &Path,
        progress: ProgressReporter,
    ) -> Result<UploadSummary> {
        Ok(self.upload(project, dir, progress).await?)
    }

    async fn check_build_availability(
        &self,
        project: &ProjectId,
        platform: &str,
        purpose: &str,
    ) -> Result<()> {
        let request = self
            .authorized(
                self.http
                    .get(self.url(&format!("/projects/{}/build/availability", project))),
            )?
            .query(&[("platform", platform), ("purpose", purpose)])
            .timeout(REQUEST_TIMEOUT);
        self.send(request).await?;
        Ok(())
    }

    async fn build_project(
        &self,
        project: &ProjectId,
        params: &BuildParameters,
        progress: ProgressReporter,
    ) -> Result<BuildResult> {
        Ok(self.build(project, params, progress).await?)
    }

    async fn session_url(&self, url: &str) -> Result<String> {
        let request = self
            .authorized(self.http.post(self.url("/user/session-url")))?
            .json(&SessionUrlRequest { url });
        let response: SessionUrlResponse = self.send_json(request).await?;
        Ok(response.url)
    }

    async fn download(&self, url: &str) -> Result<Download> {
        let response = self.send(self.http.get(url)).await?;
        let content_disposition = response
            .headers()
            .get(reqwest::header::CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = response
            .bytes_stream()
            .map_err(|e| cloudbuild_core::Error::from(ClientError::from(e)))
            .boxed();

        Ok(Download {
            content_disposition,
            body,
        })
    }
}
