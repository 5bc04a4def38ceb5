//! KDL configuration parsing for the cloudbuild CLI.
//!
//! This crate handles parsing of:
//! - User settings (config.kdl)
//! - Project descriptors (.cloudbuild/project.kdl)
//! - Variable interpolation in URL templates

pub mod error;
mod kdl_util;
pub mod project;
pub mod settings;
pub mod variables;

pub use error::{ConfigError, ConfigResult};
pub use project::{DESCRIPTOR_DIR, DESCRIPTOR_FILE, ProjectDescriptor};
pub use settings::{ServeSettings, Settings};
pub use variables::{VariableContext, VariableContextBuilder};
