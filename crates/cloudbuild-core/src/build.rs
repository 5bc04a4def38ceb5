//! Build parameters and remote build results.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::{Error, Result};

/// Build purpose used when none is given.
pub const DEFAULT_PURPOSE: &str = "debug";

/// Parameters for one remote build request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildParameters {
    /// Target platform (e.g., "android", "ios").
    pub platform: Option<String>,
    /// Build purpose (e.g., "debug", "release").
    pub purpose: Option<String>,
    /// Open the browser build page instead of building here.
    #[serde(skip)]
    pub browser: bool,
    /// Open the debugger page when `browser` is set.
    #[serde(skip)]
    pub debugger: bool,
    /// Where to store the downloaded binary.
    #[serde(skip)]
    pub output: Option<PathBuf>,
    /// Platform-specific flags (e.g., `android_webview`, `android_arch`).
    #[serde(flatten)]
    pub extra: BTreeMap<String, String>,
}

impl BuildParameters {
    /// Parameters for `platform` with the default purpose.
    pub fn new(platform: impl Into<String>) -> Self {
        Self {
            platform: Some(platform.into()),
            purpose: Some(DEFAULT_PURPOSE.to_string()),
            ..Default::default()
        }
    }

    /// Parameters for a browser preview.
    pub fn browser() -> Self {
        Self {
            browser: true,
            ..Default::default()
        }
    }

    pub fn with_purpose(mut self, purpose: impl Into<String>) -> Self {
        self.purpose = Some(purpose.into());
        self
    }

    pub fn with_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = Some(output.into());
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Check that the request can be sent at all.
    ///
    /// A browser preview needs nothing else; a real build needs both a
    /// platform and a purpose.
    pub fn validate(&self) -> Result<()> {
        if self.browser {
            return Ok(());
        }

        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        if present(&self.platform) && present(&self.purpose) {
            Ok(())
        } else {
            Err(Error::validation(
                "Missing parameters. Please write --help to see the correct usage.",
            ))
        }
    }

    pub fn platform(&self) -> &str {
        self.platform.as_deref().unwrap_or_default()
    }

    pub fn purpose(&self) -> &str {
        self.purpose.as_deref().unwrap_or(DEFAULT_PURPOSE)
    }
}

/// Outcome reported by the cloud once a build settles.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildResult {
    /// Location of the built binary.
    pub binary_url: Option<String>,
    /// Message describing why no binary was produced.
    pub error_message: Option<String>,
}

impl BuildResult {
    pub fn binary(url: impl Into<String>) -> Self {
        Self {
            binary_url: Some(url.into()),
            error_message: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            binary_url: None,
            error_message: Some(message.into()),
        }
    }
}
