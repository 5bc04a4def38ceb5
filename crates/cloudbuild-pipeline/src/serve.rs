//! Local development server: project preparation and the supervised
//! tooling/bundler pair.

use cloudbuild_config::ServeSettings;
use cloudbuild_core::ProgressReporter;
use cloudbuild_supervisor::{
    LabelColor, ProcessSpec, Supervisor, SupervisorError, SupervisorExit,
};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::project::{ASSETS_DIR, is_project_dir};

const GULPFILE_TEMPLATE: &str = include_str!("../templates/serve/gulpfile.js");
const PACKAGE_TEMPLATE: &str = include_str!("../templates/serve/package.json");

/// Files copied into the project root when absent.
const TEMPLATES: [(&str, &str); 2] = [
    ("gulpfile.js", GULPFILE_TEMPLATE),
    ("package.json", PACKAGE_TEMPLATE),
];

pub const INSTALL_NOTICE: &str =
    "Installing packages. Please wait. This might take a couple of minutes.";

#[derive(Debug, Error)]
pub enum ServeError {
    #[error("Directory doesn't contain a {0}/ folder.")]
    NotAProject(&'static str),

    #[error("Unable to write {file}: {source}")]
    Template {
        file: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed installing packages.")]
    Install,

    #[error("Interrupted.")]
    Interrupted,

    #[error(transparent)]
    Supervisor(#[from] SupervisorError),
}

fn install_outcome(exit: &SupervisorExit) -> Result<(), ServeError> {
    if exit.was_interrupted() {
        info!("Package install interrupted");
        return Err(ServeError::Interrupted);
    }
    if !exit.is_success() {
        warn!(code = exit.code, "Package install failed");
        return Err(ServeError::Install);
    }
    Ok(())
}

/// Check the project shape and copy the missing templates.
///
/// Returns the names of the files that were written.
pub async fn assure_serve_project(dir: &Path) -> Result<Vec<&'static str>, ServeError> {
    if !is_project_dir(dir) {
        return Err(ServeError::NotAProject(ASSETS_DIR));
    }

    let mut written = Vec::new();
    for (file, contents) in TEMPLATES {
        let path = dir.join(file);
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            debug!(file, "Keeping existing file");
            continue;
        }
        tokio::fs::write(&path, contents)
            .await
            .map_err(|source| ServeError::Template {
                file: file.to_string(),
                source,
            })?;
        info!(file, "Copied template");
        written.push(file);
    }

    Ok(written)
}

/// Commands with a path component run relative to the project; bare names
/// are looked up on `PATH`.
fn resolve_program(dir: &Path, program: &str) -> String {
    let path = Path::new(program);
    if path.is_relative() && path.components().count() > 1 {
        dir.join(path).to_string_lossy().to_string()
    } else {
        program.to_string()
    }
}

/// The dependency install run before serving.
pub fn install_spec(settings: &ServeSettings, dir: &Path) -> ProcessSpec {
    ProcessSpec::new(
        settings.package_manager.clone(),
        LabelColor::Green,
        resolve_program(dir, &settings.package_manager),
    )
    .args(["install"])
    .working_dir(dir)
}

/// The processes kept running while serving.
pub fn serve_specs(settings: &ServeSettings, dir: &Path, args: &[String]) -> Vec<ProcessSpec> {
    vec![
        ProcessSpec::new(
            "Cordova",
            LabelColor::Yellow,
            resolve_program(dir, &settings.tooling),
        )
        .args(["serve"])
        .args(args.iter().cloned())
        .working_dir(dir),
        ProcessSpec::new("gulp", LabelColor::Cyan, resolve_program(dir, &settings.bundler))
            .args(["serve"])
            .working_dir(dir),
    ]
}

/// Serve the project in `dir` until the process group ends.
pub struct Serve<'a> {
    supervisor: &'a Supervisor,
    settings: &'a ServeSettings,
    dir: PathBuf,
}

impl<'a> Serve<'a> {
    pub fn new(supervisor: &'a Supervisor, settings: &'a ServeSettings, dir: impl Into<PathBuf>) -> Self {
        Self {
            supervisor,
            settings,
            dir: dir.into(),
        }
    }

    /// Copy templates and install dependencies.
    pub async fn prepare(&self, progress: &ProgressReporter) -> Result<(), ServeError> {
        assure_serve_project(&self.dir).await?;

        progress.report(INSTALL_NOTICE);
        let exit = self
            .supervisor
            .supervise_all(vec![install_spec(self.settings, &self.dir)])
            .await?;
        install_outcome(&exit)
    }

    /// Prepare the project, then run the tooling and the bundler side by side.
    pub async fn run(
        &self,
        args: &[String],
        progress: &ProgressReporter,
    ) -> Result<SupervisorExit, ServeError> {
        self.prepare(progress).await?;

        let exit = self
            .supervisor
            .supervise_all(serve_specs(self.settings, &self.dir, args))
            .await?;
        info!(code = exit.code, failed = ?exit.failed, "Serve finished");
        Ok(exit)
    }
}
