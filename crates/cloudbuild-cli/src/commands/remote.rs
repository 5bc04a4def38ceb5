//! `build`: the remote build pipeline.

use super::cloud_client;
use crate::BuildArgs;
use crate::browser;
use crate::output::{failure, spawn_event_printer, success};
use crate::prompt::TerminalPrompter;
use anyhow::Result;
use cloudbuild_config::Settings;
use cloudbuild_core::build::BuildParameters;
use cloudbuild_pipeline::{BuildOutcome, RemoteBuild};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::warn;

/// Turn command line flags into build parameters.
pub fn build_parameters(args: BuildArgs) -> BuildParameters {
    let mut params = BuildParameters {
        platform: args.platform,
        purpose: Some(args.build_type),
        browser: args.browser,
        debugger: args.debugger,
        output: args.output,
        ..Default::default()
    };
    if let Some(webview) = args.android_webview {
        params = params.with_extra("android_webview", webview);
    }
    if let Some(arch) = args.android_arch {
        params = params.with_extra("android_arch", arch);
    }
    params
}

pub async fn build(settings: &Settings, cwd: &Path, args: BuildArgs) -> Result<ExitCode> {
    let assume_yes = args.yes;
    let params = build_parameters(args);

    if let Err(e) = params.validate() {
        failure(e);
        return Ok(ExitCode::FAILURE);
    }

    let client = cloud_client(settings)?;
    if let Err(e) = client.resume_session().await {
        failure(format!(
            "You must be signed in to use this command. Please sign in with 'cloudbuild login'. ({})",
            e
        ));
        return Ok(ExitCode::FAILURE);
    }

    let (tx, rx) = mpsc::unbounded_channel();
    let printer = spawn_event_printer(rx);

    let result = RemoteBuild::new(client, Arc::new(TerminalPrompter), settings.ide_url.clone())
        .assume_yes(assume_yes)
        .with_events(tx)
        .run(cwd, params)
        .await;
    // All senders are gone once the flow is dropped; let the printer drain.
    let _ = printer.await;

    match result {
        Ok(BuildOutcome::Stored(path)) => {
            success(format!("Your package is stored at {}", path.display()));
            Ok(ExitCode::SUCCESS)
        }
        Ok(BuildOutcome::BrowserSession(url)) => {
            println!("Opening {}", url);
            if let Err(e) = browser::open(&url).await {
                warn!(error = %e, "Could not open the browser");
                println!("Open this URL in your browser: {}", url);
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(e) if e.is_silent() => Ok(ExitCode::SUCCESS),
        Err(e) => {
            failure(e);
            Ok(ExitCode::FAILURE)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn args() -> BuildArgs {
        BuildArgs {
            platform: Some("android".to_string()),
            build_type: "release".to_string(),
            browser: false,
            debugger: false,
            output: Some(PathBuf::from("app.apk")),
            android_webview: Some("crosswalk".to_string()),
            android_arch: None,
            yes: true,
        }
    }

    #[test]
    fn test_flags_become_parameters() {
        let params = build_parameters(args());

        assert_eq!(params.platform(), "android");
        assert_eq!(params.purpose(), "release");
        assert_eq!(params.output, Some(PathBuf::from("app.apk")));
        assert_eq!(
            params.extra.get("android_webview").map(String::as_str),
            Some("crosswalk")
        );
        assert!(!params.extra.contains_key("android_arch"));
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_missing_platform_fails_validation() {
        let params = build_parameters(BuildArgs {
            platform: None,
            ..args()
        });
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_browser_needs_no_platform() {
        let params = build_parameters(BuildArgs {
            platform: None,
            browser: true,
            ..args()
        });
        assert!(params.validate().is_ok());
    }
}
