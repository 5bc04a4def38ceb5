//! Scripted collaborators shared by the flow tests.

use async_trait::async_trait;
use bytes::Bytes;
use cloudbuild_core::build::{BuildParameters, BuildResult};
use cloudbuild_core::client::{CloudClient, Download};
use cloudbuild_core::credentials::Credentials;
use cloudbuild_core::project::UploadSummary;
use cloudbuild_core::prompt::{PromptError, Prompter};
use cloudbuild_core::{Error, ProgressReporter, ProjectId, Result};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Prompter answering from a script; an exhausted script means EOF.
#[derive(Default)]
pub struct ScriptedPrompter {
    answers: Mutex<VecDeque<String>>,
    pub confirm_answer: Option<bool>,
    pub asked: Mutex<Vec<(String, bool)>>,
    pub confirms: AtomicUsize,
}

impl ScriptedPrompter {
    pub fn with_answers(answers: &[&str]) -> Self {
        Self {
            answers: Mutex::new(answers.iter().map(|a| a.to_string()).collect()),
            ..Default::default()
        }
    }

    pub fn confirming(answer: bool) -> Self {
        Self {
            confirm_answer: Some(answer),
            ..Default::default()
        }
    }

    pub fn asked_labels(&self) -> Vec<String> {
        self.asked.lock().unwrap().iter().map(|(l, _)| l.clone()).collect()
    }
}

#[async_trait]
impl Prompter for ScriptedPrompter {
    async fn read_line(&self, label: &str, hidden: bool) -> std::result::Result<String, PromptError> {
        self.asked.lock().unwrap().push((label.to_string(), hidden));
        self.answers
            .lock()
            .unwrap()
            .pop_front()
            .ok_or(PromptError::Closed)
    }

    async fn confirm(&self, _question: &str) -> std::result::Result<bool, PromptError> {
        self.confirms.fetch_add(1, Ordering::SeqCst);
        self.confirm_answer.ok_or(PromptError::Closed)
    }
}

/// Cloud client with canned answers and call counters.
pub struct FakeClient {
    pub session_valid: bool,
    pub login_error: Option<String>,
    pub logout_error: Option<String>,
    pub build_result: BuildResult,
    pub disposition: Option<String>,
    pub payload: Vec<u8>,
    pub calls: AtomicUsize,
    pub logins: Mutex<Vec<Credentials>>,
    pub created: Mutex<Vec<String>>,
    pub session_urls: Mutex<Vec<String>>,
    pub availability_error: Option<String>,
}

impl Default for FakeClient {
    fn default() -> Self {
        Self {
            session_valid: false,
            login_error: None,
            logout_error: None,
            build_result: BuildResult::binary("https://x/y"),
            disposition: Some(r#"attachment; filename="out.ipa""#.to_string()),
            payload: b"binary".to_vec(),
            calls: AtomicUsize::new(0),
            logins: Mutex::new(Vec::new()),
            created: Mutex::new(Vec::new()),
            session_urls: Mutex::new(Vec::new()),
            availability_error: None,
        }
    }
}

impl FakeClient {
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn tick(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl CloudClient for FakeClient {
    async fn resume_session(&self) -> Result<()> {
        self.tick();
        if self.session_valid {
            Ok(())
        } else {
            Err(Error::Unauthorized("session expired".to_string()))
        }
    }

    async fn login(&self, credentials: Credentials) -> Result<()> {
        self.tick();
        self.logins.lock().unwrap().push(credentials);
        match &self.login_error {
            Some(e) => Err(Error::remote(e.clone())),
            None => Ok(()),
        }
    }

    async fn logout(&self) -> Result<()> {
        self.tick();
        match &self.logout_error {
            Some(e) => Err(Error::remote(e.clone())),
            None => Ok(()),
        }
    }

    async fn create_project(&self, name: &str) -> Result<ProjectId> {
        self.tick();
        self.created.lock().unwrap().push(name.to_string());
        Ok(ProjectId::from("p-new"))
    }

    async fn upload_project(
        &self,
        _project: &ProjectId,
        _dir: &Path,
        progress: ProgressReporter,
    ) -> Result<UploadSummary> {
        self.tick();
        progress.report("Uploading... 100%");
        Ok(UploadSummary { files: 3 })
    }

    async fn check_build_availability(
        &self,
        _project: &ProjectId,
        _platform: &str,
        _purpose: &str,
    ) -> Result<()> {
        self.tick();
        match &self.availability_error {
            Some(e) => Err(Error::remote(e.clone())),
            None => Ok(()),
        }
    }

    async fn build_project(
        &self,
        _project: &ProjectId,
        _params: &BuildParameters,
        progress: ProgressReporter,
    ) -> Result<BuildResult> {
        self.tick();
        progress.report("Building...");
        Ok(self.build_result.clone())
    }

    async fn session_url(&self, url: &str) -> Result<String> {
        self.tick();
        self.session_urls.lock().unwrap().push(url.to_string());
        Ok(format!("{}?session=1", url))
    }

    async fn download(&self, _url: &str) -> Result<Download> {
        self.tick();
        let chunk = Bytes::from(self.payload.clone());
        Ok(Download {
            content_disposition: self.disposition.clone(),
            body: Box::pin(futures::stream::iter(vec![Ok(chunk)])),
        })
    }
}
