//! Sign-in and sign-out flows.

use cloudbuild_core::client::CloudClient;
use cloudbuild_core::credentials::Credentials;
use cloudbuild_core::prompt::{PromptError, Prompter};
use thiserror::Error;
use tracing::{debug, info};

/// A valid session already exists; login has nothing to do.
///
/// This is a branch rather than a failure: callers report it and exit
/// successfully.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("already signed in")]
pub struct AlreadyAuthenticated;

#[derive(Debug, Error)]
pub enum CredentialsError {
    #[error("Unable to get email.")]
    Identifier(#[source] PromptError),

    #[error("Unable to get password.")]
    Secret(#[source] PromptError),
}

#[derive(Debug, Error)]
pub enum LoginError {
    #[error("Unable to get credentials: {0}")]
    Credentials(#[from] CredentialsError),

    #[error("Unable to sign in: {0}")]
    Rejected(#[source] cloudbuild_core::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginOutcome {
    AlreadySignedIn,
    SignedIn,
}

/// Succeeds only when there is no usable session yet.
pub async fn ensure_not_already_authenticated(
    client: &dyn CloudClient,
) -> Result<(), AlreadyAuthenticated> {
    match client.resume_session().await {
        Ok(()) => Err(AlreadyAuthenticated),
        Err(e) => {
            debug!(error = %e, "No valid session");
            Ok(())
        }
    }
}

/// Ask for the identifier, then the hidden secret.
///
/// The secret is never requested when the identifier cannot be read.
pub async fn collect_credentials(prompter: &dyn Prompter) -> Result<Credentials, CredentialsError> {
    let identifier = prompter
        .read_line("Email", false)
        .await
        .map_err(CredentialsError::Identifier)?;

    let secret = prompter
        .read_line("Password", true)
        .await
        .map_err(CredentialsError::Secret)?;

    Ok(Credentials::new(identifier, secret))
}

/// Sign in unless a valid session already exists.
pub async fn login(
    client: &dyn CloudClient,
    prompter: &dyn Prompter,
) -> Result<LoginOutcome, LoginError> {
    if let Err(AlreadyAuthenticated) = ensure_not_already_authenticated(client).await {
        info!("Session still valid, skipping login");
        return Ok(LoginOutcome::AlreadySignedIn);
    }

    let credentials = collect_credentials(prompter).await?;
    client
        .login(credentials)
        .await
        .map_err(LoginError::Rejected)?;

    info!("Signed in");
    Ok(LoginOutcome::SignedIn)
}

/// Tear down the session unconditionally.
pub async fn logout(client: &dyn CloudClient) -> cloudbuild_core::Result<()> {
    client.logout().await?;
    info!("Signed out");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeClient, ScriptedPrompter};

    #[tokio::test]
    async fn test_valid_session_short_circuits() {
        let client = FakeClient {
            session_valid: true,
            ..Default::default()
        };
        let prompter = ScriptedPrompter::with_answers(&["dev@example.com", "secret"]);

        let outcome = login(&client, &prompter).await.unwrap();

        assert_eq!(outcome, LoginOutcome::AlreadySignedIn);
        assert!(prompter.asked_labels().is_empty());
        assert!(client.logins.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_gate_reports_already_authenticated() {
        let client = FakeClient {
            session_valid: true,
            ..Default::default()
        };
        assert_eq!(
            ensure_not_already_authenticated(&client).await,
            Err(AlreadyAuthenticated)
        );
    }

    #[tokio::test]
    async fn test_invalid_session_prompts_once_per_field() {
        let client = FakeClient::default();
        let prompter = ScriptedPrompter::with_answers(&["dev@example.com", "secret"]);

        let outcome = login(&client, &prompter).await.unwrap();

        assert_eq!(outcome, LoginOutcome::SignedIn);
        assert_eq!(prompter.asked_labels(), vec!["Email", "Password"]);
        let asked = prompter.asked.lock().unwrap();
        assert!(!asked[0].1, "identifier is echoed");
        assert!(asked[1].1, "secret is hidden");
        assert_eq!(
            client.logins.lock().unwrap().as_slice(),
            &[Credentials::new("dev@example.com", "secret")]
        );
    }

    #[tokio::test]
    async fn test_closed_input_never_asks_for_secret() {
        let prompter = ScriptedPrompter::default();

        let err = collect_credentials(&prompter).await.unwrap_err();

        assert!(matches!(err, CredentialsError::Identifier(PromptError::Closed)));
        assert_eq!(err.to_string(), "Unable to get email.");
        assert_eq!(prompter.asked_labels(), vec!["Email"]);
    }

    #[tokio::test]
    async fn test_closed_input_on_secret() {
        let prompter = ScriptedPrompter::with_answers(&["dev@example.com"]);

        let err = collect_credentials(&prompter).await.unwrap_err();

        assert!(matches!(err, CredentialsError::Secret(_)));
        assert_eq!(err.to_string(), "Unable to get password.");
    }

    #[tokio::test]
    async fn test_login_rejection_is_reported() {
        let client = FakeClient {
            login_error: Some("invalid password".to_string()),
            ..Default::default()
        };
        let prompter = ScriptedPrompter::with_answers(&["dev@example.com", "wrong"]);

        let err = login(&client, &prompter).await.unwrap_err();
        assert_eq!(err.to_string(), "Unable to sign in: invalid password");
    }

    #[tokio::test]
    async fn test_logout_is_not_gated() {
        let client = FakeClient::default();
        logout(&client).await.unwrap();
        assert_eq!(client.call_count(), 1);
    }

    #[tokio::test]
    async fn test_logout_failure_is_reported() {
        let client = FakeClient {
            logout_error: Some("service unavailable".to_string()),
            ..Default::default()
        };

        let err = logout(&client).await.unwrap_err();
        assert_eq!(err.to_string(), "service unavailable");
        assert_eq!(client.call_count(), 1);
    }
}
