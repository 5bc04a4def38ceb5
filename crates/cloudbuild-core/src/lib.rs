//! Core domain types and traits for the cloudbuild CLI.
//!
//! This crate contains:
//! - Error taxonomy shared by every crate
//! - Credentials and the interactive prompt trait
//! - Build parameters and build results
//! - Project identifiers
//! - The cloud API client trait
//! - Progress reporting
//! - Supervised process types

pub mod build;
pub mod client;
pub mod credentials;
pub mod error;
pub mod process;
pub mod progress;
pub mod project;
pub mod prompt;

pub use error::{Error, Result};
pub use progress::ProgressReporter;
pub use project::ProjectId;
