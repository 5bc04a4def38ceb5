//! `serve`: local development server.

use crate::output::{ConsoleSink, failure};
use anyhow::Result;
use cloudbuild_config::Settings;
use cloudbuild_core::ProgressReporter;
use cloudbuild_pipeline::{Serve, ServeError};
use cloudbuild_supervisor::{INTERRUPTED_EXIT_CODE, Supervisor};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::info;

use super::exit_code;

pub async fn serve(settings: &Settings, cwd: &Path, args: Vec<String>) -> Result<ExitCode> {
    let supervisor = Supervisor::new(Arc::new(ConsoleSink));
    let progress = ProgressReporter::new(|note| println!("{}", note));

    match Serve::new(&supervisor, &settings.serve, cwd)
        .run(&args, &progress)
        .await
    {
        Ok(exit) => {
            if let Some(label) = &exit.failed {
                info!(label = %label, code = exit.code, "Serve stopped by a failing process");
            }
            Ok(exit_code(exit.code))
        }
        Err(ServeError::Interrupted) => Ok(exit_code(INTERRUPTED_EXIT_CODE)),
        Err(e) => {
            failure(format!("Failed serving project: {}", e));
            Ok(ExitCode::FAILURE)
        }
    }
}
