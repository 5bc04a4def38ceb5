//! Project directory detection and remote project linking.

use cloudbuild_config::ProjectDescriptor;
use cloudbuild_core::client::CloudClient;
use cloudbuild_core::{Error, ProjectId, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Folder every project keeps its web assets in.
pub const ASSETS_DIR: &str = "www";

/// A local project linked to its remote counterpart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectInfo {
    pub dir: PathBuf,
    pub name: String,
    pub project_id: ProjectId,
}

/// Whether `dir` looks like a project root.
pub fn is_project_dir(dir: &Path) -> bool {
    dir.join(ASSETS_DIR).is_dir()
}

/// Find the project containing `start`, walking up towards the root.
pub fn find_project_dir(start: &Path) -> Result<PathBuf> {
    start
        .ancestors()
        .find(|dir| is_project_dir(dir))
        .map(Path::to_path_buf)
        .ok_or_else(|| {
            Error::validation(format!(
                "{} is not part of a project (no {}/ folder found).",
                start.display(),
                ASSETS_DIR
            ))
        })
}

/// Make sure the project in `dir` is linked to a remote project, creating
/// the remote side and the descriptor when needed.
pub async fn assure_project(client: &dyn CloudClient, dir: &Path) -> Result<ProjectInfo> {
    let descriptor = ProjectDescriptor::load(dir)
        .map_err(|e| Error::validation(format!("invalid project descriptor: {}", e)))?;

    let mut descriptor = descriptor.unwrap_or_else(|| ProjectDescriptor::new(default_name(dir)));

    if let Some(project_id) = descriptor.project_id.clone() {
        debug!(project_id = %project_id, "Project already linked");
        return Ok(ProjectInfo {
            dir: dir.to_path_buf(),
            name: descriptor.name,
            project_id,
        });
    }

    let project_id = client.create_project(&descriptor.name).await?;
    info!(project_id = %project_id, name = %descriptor.name, "Created remote project");

    descriptor.project_id = Some(project_id.clone());
    descriptor
        .save(dir)
        .map_err(|e| Error::Internal(format!("failed to write project descriptor: {}", e)))?;

    Ok(ProjectInfo {
        dir: dir.to_path_buf(),
        name: descriptor.name,
        project_id,
    })
}

fn default_name(dir: &Path) -> String {
    dir.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| "project".to_string())
}
