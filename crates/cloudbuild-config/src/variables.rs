//! Variable interpolation for URL templates.
//!
//! Supports variables like:
//! - `${project.id}` - Remote project ID
//! - `${project.name}` - Project name
//! - `${page}` and other custom single-part names
//! - `${env.VAR_NAME}` - Environment variable

use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

/// Variables available for interpolation.
#[derive(Debug, Clone, Default)]
pub struct VariableContext {
    pub project_id: String,
    pub project_name: String,
    /// Environment variables
    pub env: HashMap<String, String>,
    /// Custom variables
    pub custom: HashMap<String, String>,
}

// Regex for matching ${...} variables
static VAR_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([a-zA-Z_][a-zA-Z0-9_]*(?:\.[a-zA-Z_][a-zA-Z0-9_]*)?)\}")
        .expect("variable pattern is valid")
});

impl VariableContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a variable name to its value.
    pub fn resolve(&self, var_name: &str) -> Option<String> {
        let parts: Vec<&str> = var_name.split('.').collect();

        match parts.as_slice() {
            ["project", "id"] => Some(self.project_id.clone()),
            ["project", "name"] => Some(self.project_name.clone()),
            ["env", name] => self
                .env
                .get(*name)
                .cloned()
                .or_else(|| std::env::var(name).ok()),
            [name] => self.custom.get(*name).cloned(),
            _ => None,
        }
    }

    /// Interpolate all variables in a string. Unknown variables are kept as-is.
    pub fn interpolate(&self, input: &str) -> String {
        VAR_REGEX
            .replace_all(input, |caps: &regex::Captures| {
                let var_name = &caps[1];
                self.resolve(var_name)
                    .unwrap_or_else(|| format!("${{{}}}", var_name))
            })
            .to_string()
    }
}

/// Builder for creating VariableContext.
#[derive(Default)]
pub struct VariableContextBuilder {
    ctx: VariableContext,
}

impl VariableContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_project(mut self, id: impl Into<String>, name: impl Into<String>) -> Self {
        self.ctx.project_id = id.into();
        self.ctx.project_name = name.into();
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.ctx.env.insert(key.into(), value.into());
        self
    }

    pub fn with_custom(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.ctx.custom.insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> VariableContext {
        self.ctx
    }
}
