//! The remote build pipeline: upload, build, poll and download.

use crate::download::store_download;
use crate::orchestrator::{Flow, Pipeline, PipelineEvent, Rejection, StageFailure, stage};
use crate::project::{ProjectInfo, assure_project, find_project_dir};
use cloudbuild_config::VariableContextBuilder;
use cloudbuild_core::build::{BuildParameters, BuildResult};
use cloudbuild_core::client::CloudClient;
use cloudbuild_core::prompt::Prompter;
use cloudbuild_core::{Error, ProgressReporter};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::info;

const OVERWRITE_QUESTION: &str =
    "Uploading replaces the project files stored in the cloud. Continue?";

/// How a remote build ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    /// The binary was downloaded to this path.
    Stored(PathBuf),
    /// A browser preview was requested; open this one-time URL.
    BrowserSession(String),
}

#[derive(Debug, Error)]
pub enum RemoteBuildError {
    /// Parameters were rejected before anything was sent.
    #[error("{0}")]
    Validation(#[source] Error),

    #[error(transparent)]
    Stage(#[from] StageFailure),
}

impl RemoteBuildError {
    /// The user stopped the build; nothing should be printed.
    pub fn is_silent(&self) -> bool {
        matches!(self, RemoteBuildError::Stage(failure) if failure.silent)
    }
}

/// Remote build flow with its injected collaborators.
pub struct RemoteBuild {
    client: Arc<dyn CloudClient>,
    prompter: Arc<dyn Prompter>,
    ide_url: String,
    assume_yes: bool,
    events: Option<mpsc::UnboundedSender<PipelineEvent>>,
}

impl RemoteBuild {
    pub fn new(
        client: Arc<dyn CloudClient>,
        prompter: Arc<dyn Prompter>,
        ide_url: impl Into<String>,
    ) -> Self {
        Self {
            client,
            prompter,
            ide_url: ide_url.into(),
            assume_yes: false,
            events: None,
        }
    }

    /// Skip the overwrite confirmation.
    pub fn assume_yes(mut self, yes: bool) -> Self {
        self.assume_yes = yes;
        self
    }

    /// Send execution events to `tx`.
    pub fn with_events(mut self, tx: mpsc::UnboundedSender<PipelineEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    /// Run the whole flow starting from `cwd`.
    pub async fn run(
        &self,
        cwd: &Path,
        params: BuildParameters,
    ) -> Result<BuildOutcome, RemoteBuildError> {
        params.validate().map_err(RemoteBuildError::Validation)?;
        let params = Arc::new(params);

        let prompter = self.prompter.clone();
        let assume_yes = self.assume_yes;
        let confirm = stage("confirm-overwrite", move |cwd: PathBuf, _progress| {
            let prompter = prompter.clone();
            async move {
                if assume_yes {
                    return Ok(Flow::Continue(cwd));
                }
                match prompter.confirm(OVERWRITE_QUESTION).await {
                    Ok(true) => Ok(Flow::Continue(cwd)),
                    Ok(false) => Err(Rejection::declined()),
                    Err(e) => Err(Rejection::new(format!("Unable to read confirmation: {}", e))),
                }
            }
        });

        let find = stage("find-project", |cwd: PathBuf, _progress| async move {
            Ok(Flow::Continue(find_project_dir(&cwd)?))
        });

        let client = self.client.clone();
        let assure = stage("assure-project", move |dir: PathBuf, _progress| {
            let client = client.clone();
            async move { Ok(Flow::Continue(assure_project(client.as_ref(), &dir).await?)) }
        })
        .failure_prefix("Unable to create project descriptor: ");

        let client = self.client.clone();
        let upload = stage(
            "upload",
            move |project: ProjectInfo, progress: ProgressReporter| {
                let client = client.clone();
                async move {
                    let summary = client
                        .upload_project(&project.project_id, &project.dir, progress.clone())
                        .await?;
                    progress.report(format!("Uploaded {} files.", summary.files));
                    Ok(Flow::Continue(project))
                }
            },
        )
        .announce("Uploading project...")
        .failure_prefix("Upload failed: ");

        let client = self.client.clone();
        let build_params = params.clone();
        let availability = stage("check-availability", move |project: ProjectInfo, _progress| {
            let client = client.clone();
            let params = build_params.clone();
            async move {
                if !params.browser {
                    client
                        .check_build_availability(
                            &project.project_id,
                            params.platform(),
                            params.purpose(),
                        )
                        .await?;
                }
                Ok(Flow::Continue(project))
            }
        })
        .failure_prefix("Unable to build this project: ");

        let client = self.client.clone();
        let ide_url = self.ide_url.clone();
        let build_params = params.clone();
        let build = stage("build", move |project: ProjectInfo, progress: ProgressReporter| {
            let client = client.clone();
            let ide_url = ide_url.clone();
            let params = build_params.clone();
            async move {
                if params.browser {
                    let page = if params.debugger { "debugger" } else { "build" };
                    let page_url = VariableContextBuilder::new()
                        .with_project(project.project_id.as_str(), project.name.as_str())
                        .with_custom("page", page)
                        .build()
                        .interpolate(&ide_url);
                    let session = client.session_url(&page_url).await?;
                    return Ok(Flow::Halt(session));
                }

                let result = client
                    .build_project(&project.project_id, &params, progress)
                    .await?;
                Ok(Flow::Continue((project, result)))
            }
        });
        let build = if params.browser {
            build
                .announce("Opening build page...")
                .failure_prefix("Unable to open build page: ")
        } else {
            build
                .announce("Building project...")
                .failure_prefix("Build failed: ")
        };

        let client = self.client.clone();
        let resolve = stage(
            "resolve-download",
            move |(project, result): (ProjectInfo, BuildResult), _progress| {
                let client = client.clone();
                async move {
                    let binary_url = match (result.binary_url, result.error_message) {
                        (Some(url), _) => url,
                        (None, Some(message)) => return Err(Rejection::new(message)),
                        (None, None) => {
                            return Err(Rejection::new("The build produced no binary."));
                        }
                    };
                    let url = client.session_url(&binary_url).await?;
                    Ok(Flow::Continue((project, url)))
                }
            },
        );

        let client = self.client.clone();
        let download = stage(
            "download",
            move |(project, url): (ProjectInfo, String), _progress| {
                let client = client.clone();
                let params = params.clone();
                async move {
                    let download = client.download(&url).await?;
                    let path =
                        store_download(download, &project.dir, params.output.as_deref()).await?;
                    Ok(Flow::Continue(path))
                }
            },
        )
        .announce("Downloading package...")
        .failure_prefix("Download failed: ");

        let pipeline = Pipeline::new(confirm)
            .then(find)
            .then(assure)
            .then(upload)
            .then(availability)
            .then(build)
            .then(resolve)
            .then(download);
        let pipeline = match &self.events {
            Some(tx) => pipeline.with_events(tx.clone()),
            None => pipeline,
        };

        match pipeline.run(cwd.to_path_buf()).await? {
            Flow::Continue(path) => {
                info!(path = %path.display(), "Remote build stored");
                Ok(BuildOutcome::Stored(path))
            }
            Flow::Halt(url) => Ok(BuildOutcome::BrowserSession(url)),
        }
    }
}
