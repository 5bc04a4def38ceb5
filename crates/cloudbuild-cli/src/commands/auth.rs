//! `login` and `logout`.

use super::cloud_client;
use crate::output::{failure, success};
use crate::prompt::TerminalPrompter;
use anyhow::Result;
use cloudbuild_config::Settings;
use cloudbuild_pipeline::auth::{self, LoginError, LoginOutcome};
use std::process::ExitCode;

const SIGN_UP_URL: &str = "https://cloudbuild.dev/register";

pub async fn login(settings: &Settings) -> Result<ExitCode> {
    let client = cloud_client(settings)?;

    match auth::login(client.as_ref(), &TerminalPrompter).await {
        Ok(LoginOutcome::AlreadySignedIn) => {
            println!(
                "You are already signed in. Please sign out with 'cloudbuild logout' in order to sign in with another user."
            );
            Ok(ExitCode::SUCCESS)
        }
        Ok(LoginOutcome::SignedIn) => {
            success("Successfully signed in!");
            Ok(ExitCode::SUCCESS)
        }
        Err(e @ LoginError::Rejected(_)) => {
            failure(&e);
            println!(
                "If you don't have an account yet, please sign up at {} .",
                SIGN_UP_URL
            );
            Ok(ExitCode::FAILURE)
        }
        Err(e) => {
            failure(&e);
            Ok(ExitCode::FAILURE)
        }
    }
}

pub async fn logout(settings: &Settings) -> Result<ExitCode> {
    let client = cloud_client(settings)?;

    println!("Signing out from the build cloud...");
    match auth::logout(client.as_ref()).await {
        Ok(()) => {
            success("Successfully signed out.");
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            failure(format!("Failed: {}", e));
            Ok(ExitCode::FAILURE)
        }
    }
}
