//! Cloud API client trait.
//!
//! Everything the CLI asks of the build cloud goes through [`CloudClient`].
//! Flows receive it as `Arc<dyn CloudClient>` so tests can swap in fakes.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use std::fmt;
use std::path::Path;

use crate::build::{BuildParameters, BuildResult};
use crate::credentials::Credentials;
use crate::project::{ProjectId, UploadSummary};
use crate::{ProgressReporter, Result};

/// A binary being downloaded from the cloud.
pub struct Download {
    /// Raw `content-disposition` response header, if any.
    pub content_disposition: Option<String>,
    /// Response body.
    pub body: BoxStream<'static, Result<Bytes>>,
}

impl fmt::Debug for Download {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Download")
            .field("content_disposition", &self.content_disposition)
            .finish_non_exhaustive()
    }
}

/// Trait for build cloud API clients.
#[async_trait]
pub trait CloudClient: Send + Sync {
    /// Check that a previously stored session is still valid.
    async fn resume_session(&self) -> Result<()>;

    /// Sign in and store the resulting session.
    async fn login(&self, credentials: Credentials) -> Result<()>;

    /// Tear down the stored session.
    async fn logout(&self) -> Result<()>;

    /// Create a new remote project.
    async fn create_project(&self, name: &str) -> Result<ProjectId>;

    /// Upload the contents of `dir` into the remote project.
    async fn upload_project(
        &self,
        project: &ProjectId,
        dir: &Path,
        progress: ProgressReporter,
    ) -> Result<UploadSummary>;

    /// Check whether a platform/purpose combination can be built.
    async fn check_build_availability(
        &self,
        project: &ProjectId,
        platform: &str,
        purpose: &str,
    ) -> Result<()>;

    /// Trigger a remote build and wait for it to settle.
    async fn build_project(
        &self,
        project: &ProjectId,
        params: &BuildParameters,
        progress: ProgressReporter,
    ) -> Result<BuildResult>;

    /// Mint a short-lived authenticated URL for `url`.
    async fn session_url(&self, url: &str) -> Result<String>;

    /// Start downloading `url`.
    async fn download(&self, url: &str) -> Result<Download>;
}
