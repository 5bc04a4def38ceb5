//! User settings parsing.

use crate::kdl_util::{get_first_integer_arg, get_first_string_arg};
use crate::{ConfigError, ConfigResult};
use kdl::{KdlDocument, KdlNode};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;
use url::Url;

pub const DEFAULT_API_URL: &str = "https://api.cloudbuild.dev/v1";
pub const DEFAULT_IDE_URL: &str = "https://ide.cloudbuild.dev/project/${project.id}/${page}";
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

const APP_DIR: &str = "cloudbuild";

/// Settings for the CLI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Base URL of the build cloud API.
    pub api_url: String,
    /// Template of the browser build page (`${project.id}`, `${page}`).
    pub ide_url: String,
    /// Delay between build status polls.
    pub poll_interval: Duration,
    /// Where the session token is stored.
    pub session_file: Option<PathBuf>,
    /// Local development server commands.
    pub serve: ServeSettings,
}

/// Commands used by `serve`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServeSettings {
    /// Native-tooling wrapper, invoked as `<tooling> serve ARGS...`.
    pub tooling: String,
    /// Bundler, invoked as `<bundler> serve`.
    pub bundler: String,
    /// Package manager, invoked as `<package-manager> install`.
    pub package_manager: String,
}

impl Default for ServeSettings {
    fn default() -> Self {
        Self {
            tooling: "node_modules/.bin/cordova".to_string(),
            bundler: "node_modules/.bin/gulp".to_string(),
            package_manager: "npm".to_string(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            ide_url: DEFAULT_IDE_URL.to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            session_file: None,
            serve: ServeSettings::default(),
        }
    }
}

impl Settings {
    /// Default location of the settings file.
    pub fn default_path() -> ConfigResult<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR).join("config.kdl"))
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Load settings from `path`, or from the default location.
    ///
    /// A missing file yields the defaults.
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match Self::default_path() {
                Ok(p) => p,
                Err(_) => return Ok(Self::default()),
            },
        };

        if !path.exists() {
            debug!(path = %path.display(), "No settings file, using defaults");
            return Ok(Self::default());
        }

        debug!(path = %path.display(), "Loading settings");
        let content = std::fs::read_to_string(&path)?;
        parse_settings(&content)
    }

    /// Resolved session file location.
    pub fn session_file(&self) -> ConfigResult<PathBuf> {
        match &self.session_file {
            Some(p) => Ok(p.clone()),
            None => dirs::config_dir()
                .map(|dir| dir.join(APP_DIR).join("session.json"))
                .ok_or(ConfigError::NoConfigDir),
        }
    }

    /// Override the API URL, validating it.
    pub fn set_api_url(&mut self, api_url: &str) -> ConfigResult<()> {
        validate_url("api-url", api_url)?;
        self.api_url = api_url.trim_end_matches('/').to_string();
        Ok(())
    }
}

/// Parse settings from KDL text. Unset nodes keep their defaults.
pub fn parse_settings(kdl: &str) -> ConfigResult<Settings> {
    let doc: KdlDocument = kdl.parse()?;
    let mut settings = Settings::default();

    for node in doc.nodes() {
        match node.name().value() {
            "api-url" => {
                let value = required_string(node, "api-url")?;
                settings.set_api_url(&value)?;
            }
            "ide-url" => {
                settings.ide_url = required_string(node, "ide-url")?;
            }
            "poll-interval-ms" => {
                let ms = get_first_integer_arg(node).ok_or_else(|| ConfigError::InvalidValue {
                    field: "poll-interval-ms".to_string(),
                    message: "expected an integer".to_string(),
                })?;
                let ms = u64::try_from(ms)
                    .ok()
                    .filter(|ms| *ms > 0)
                    .ok_or_else(|| ConfigError::InvalidValue {
                        field: "poll-interval-ms".to_string(),
                        message: format!("must be a positive number of milliseconds, got {}", ms),
                    })?;
                settings.poll_interval = Duration::from_millis(ms);
            }
            "session-file" => {
                settings.session_file = Some(PathBuf::from(required_string(node, "session-file")?));
            }
            "serve" => {
                parse_serve(node, &mut settings.serve)?;
            }
            _ => {} // Ignore unknown nodes
        }
    }

    Ok(settings)
}

fn parse_serve(node: &KdlNode, serve: &mut ServeSettings) -> ConfigResult<()> {
    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "tooling" => serve.tooling = required_string(child, "serve.tooling")?,
                "bundler" => serve.bundler = required_string(child, "serve.bundler")?,
                "package-manager" => {
                    serve.package_manager = required_string(child, "serve.package-manager")?
                }
                _ => {}
            }
        }
    }
    Ok(())
}

fn required_string(node: &KdlNode, field: &str) -> ConfigResult<String> {
    get_first_string_arg(node)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ConfigError::MissingField(field.to_string()))
}

fn validate_url(field: &str, value: &str) -> ConfigResult<()> {
    Url::parse(value)
        .map(|_| ())
        .map_err(|e| ConfigError::InvalidValue {
            field: field.to_string(),
            message: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let settings = parse_settings("").unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_parse_full_settings() {
        let kdl = r#"
            api-url "https://build.example.com/api/"
            ide-url "https://ide.example.com/p/${project.id}/${page}"
            poll-interval-ms 500
            session-file "/tmp/session.json"

            serve {
                tooling "bin/cordova"
                bundler "bin/gulp"
                package-manager "pnpm"
            }
        "#;

        let settings = parse_settings(kdl).unwrap();
        assert_eq!(settings.api_url, "https://build.example.com/api");
        assert_eq!(
            settings.ide_url,
            "https://ide.example.com/p/${project.id}/${page}"
        );
        assert_eq!(settings.poll_interval, Duration::from_millis(500));
        assert_eq!(
            settings.session_file().unwrap(),
            PathBuf::from("/tmp/session.json")
        );
        assert_eq!(settings.serve.tooling, "bin/cordova");
        assert_eq!(settings.serve.bundler, "bin/gulp");
        assert_eq!(settings.serve.package_manager, "pnpm");
    }

    #[test]
    fn test_partial_serve_block_keeps_defaults() {
        let kdl = r#"
            serve {
                package-manager "yarn"
            }
        "#;

        let settings = parse_settings(kdl).unwrap();
        assert_eq!(settings.serve.package_manager, "yarn");
        assert_eq!(settings.serve.tooling, ServeSettings::default().tooling);
    }

    #[test]
    fn test_invalid_api_url() {
        let result = parse_settings(r#"api-url "not a url""#);
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::InvalidValue { .. }
        ));
    }

    #[test]
    fn test_zero_poll_interval_rejected() {
        let result = parse_settings("poll-interval-ms 0");
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::InvalidValue { .. }
        ));
    }

    #[test]
    fn test_missing_value() {
        let result = parse_settings("ide-url");
        assert!(matches!(result.unwrap_err(), ConfigError::MissingField(_)));
    }

    #[test]
    fn test_unknown_nodes_ignored() {
        let settings = parse_settings(r#"telemetry "off""#).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load(Some(&dir.path().join("absent.kdl"))).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.kdl");
        std::fs::write(&path, "poll-interval-ms 250\n").unwrap();

        let settings = Settings::load(Some(&path)).unwrap();
        assert_eq!(settings.poll_interval, Duration::from_millis(250));
    }
}
