//! HTTP client for the build cloud API.
//!
//! [`HttpCloudClient`] implements [`cloudbuild_core::client::CloudClient`]
//! over `reqwest`, keeping the session token in a small JSON file.

pub mod archive;
pub mod error;
pub mod http;
pub mod session;

pub use error::{ClientError, ClientResult};
pub use http::HttpCloudClient;
pub use session::{Session, SessionStore};
