//! Storing downloaded build artifacts.

use cloudbuild_core::client::Download;
use cloudbuild_core::Result;
use futures::StreamExt;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

/// File name used when the response does not suggest one.
pub const DEFAULT_FILENAME: &str = "output.bin";
/// Folder inside the project that receives downloads.
pub const BUILD_DIR: &str = "build";

static FILENAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"filename="?([^"]+)"?"#).expect("filename pattern is valid"));

/// Extract the file name from a `content-disposition` header.
///
/// Only the final path component is kept so a hostile header cannot point
/// outside the build folder.
pub fn filename_from_disposition(header: Option<&str>) -> String {
    header
        .and_then(|h| FILENAME_REGEX.captures(h))
        .and_then(|caps| {
            Path::new(caps[1].trim())
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
        })
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| DEFAULT_FILENAME.to_string())
}

/// Where a download ends up: `output` verbatim when given, otherwise
/// `<project>/build/<filename>`.
pub fn resolve_download_path(
    project_dir: &Path,
    output: Option<&Path>,
    content_disposition: Option<&str>,
) -> PathBuf {
    match output {
        Some(path) => path.to_path_buf(),
        None => project_dir
            .join(BUILD_DIR)
            .join(filename_from_disposition(content_disposition)),
    }
}

/// Sibling path the body is streamed into before it replaces `path`.
fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    path.with_file_name(name)
}

/// Stream `download` to disk and return the stored path.
///
/// Nothing is left at the target when the transfer fails midway.
pub async fn store_download(
    download: Download,
    project_dir: &Path,
    output: Option<&Path>,
) -> Result<PathBuf> {
    let path = resolve_download_path(
        project_dir,
        output,
        download.content_disposition.as_deref(),
    );

    if output.is_none() {
        tokio::fs::create_dir_all(project_dir.join(BUILD_DIR)).await?;
    }

    let partial = partial_path(&path);
    let written = match write_body(download, &partial).await {
        Ok(written) => written,
        Err(e) => {
            if let Err(cleanup) = tokio::fs::remove_file(&partial).await {
                warn!(path = %partial.display(), error = %cleanup, "Failed to remove partial download");
            }
            return Err(e);
        }
    };
    tokio::fs::rename(&partial, &path).await?;

    info!(path = %path.display(), bytes = written, "Stored download");
    Ok(path)
}

async fn write_body(download: Download, path: &Path) -> Result<u64> {
    let mut file = tokio::fs::File::create(path).await?;
    let mut body = download.body;
    let mut written: u64 = 0;

    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        written = written.saturating_add(chunk.len() as u64);
    }
    file.flush().await?;

    Ok(written)
}
