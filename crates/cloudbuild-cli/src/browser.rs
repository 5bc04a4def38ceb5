//! Opening URLs in the user's browser.

use tokio::process::Command;
use tracing::debug;

fn opener(url: &str) -> Command {
    let mut cmd = if cfg!(target_os = "macos") {
        Command::new("open")
    } else if cfg!(target_os = "windows") {
        let mut cmd = Command::new("cmd");
        cmd.args(["/C", "start", ""]);
        cmd
    } else {
        Command::new("xdg-open")
    };
    cmd.arg(url);
    cmd
}

/// Hand `url` to the platform's opener and wait for it to return.
pub async fn open(url: &str) -> std::io::Result<()> {
    let status = opener(url).status().await?;
    debug!(status = ?status, "Browser opener finished");
    if status.success() {
        Ok(())
    } else {
        Err(std::io::Error::other(format!("opener exited with {}", status)))
    }
}
