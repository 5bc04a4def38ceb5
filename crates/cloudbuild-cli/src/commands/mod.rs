//! CLI command implementations.

pub mod auth;
pub mod remote;
pub mod serve;

use anyhow::{Context, Result};
use cloudbuild_client::HttpCloudClient;
use cloudbuild_config::Settings;
use cloudbuild_core::client::CloudClient;
use std::process::ExitCode;
use std::sync::Arc;

/// Client for the configured build cloud.
pub fn cloud_client(settings: &Settings) -> Result<Arc<dyn CloudClient>> {
    let client = HttpCloudClient::from_settings(settings)
        .with_context(|| format!("Failed to create client for {}", settings.api_url))?;
    Ok(Arc::new(client))
}

/// Process exit code for a child's exit code.
pub fn exit_code(code: i32) -> ExitCode {
    match u8::try_from(code) {
        Ok(code) => ExitCode::from(code),
        Err(_) => ExitCode::FAILURE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_mapping() {
        assert_eq!(exit_code(0), ExitCode::SUCCESS);
        assert_eq!(exit_code(2), ExitCode::from(2));
        assert_eq!(exit_code(130), ExitCode::from(130));
        assert_eq!(exit_code(-1), ExitCode::FAILURE);
        assert_eq!(exit_code(300), ExitCode::FAILURE);
    }
}
