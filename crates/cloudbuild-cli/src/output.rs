//! Console rendering of pipeline events and supervised process output.

use cloudbuild_pipeline::PipelineEvent;
use cloudbuild_supervisor::{LabelColor, LabeledLine, LineSink, OutputStream};
use dialoguer::console::{Style, style};
use std::io::Write;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

fn label_style(color: LabelColor) -> Style {
    let bold = Style::new().bold();
    match color {
        LabelColor::Yellow => bold.yellow(),
        LabelColor::Cyan => bold.cyan(),
        LabelColor::Green => bold.green(),
        LabelColor::Magenta => bold.magenta(),
        LabelColor::Blue => bold.blue(),
        LabelColor::Red => bold.red(),
    }
}

/// Render a supervised line as `<label>: <content>`.
pub fn render_line(line: &LabeledLine) -> String {
    format!(
        "{}{}",
        label_style(line.color).apply_to(format!("{}: ", line.label)),
        line.content
    )
}

/// Writes supervised output to the terminal, keeping stdout and stderr apart.
pub struct ConsoleSink;

impl LineSink for ConsoleSink {
    fn line(&self, line: LabeledLine) {
        let rendered = render_line(&line);
        // A closed terminal is not worth failing the group over.
        let _ = match line.stream {
            OutputStream::Stdout => writeln!(std::io::stdout().lock(), "{}", rendered),
            OutputStream::Stderr => writeln!(std::io::stderr().lock(), "{}", rendered),
        };
    }
}

/// Print stage announcements and progress notes until the pipeline ends.
pub fn spawn_event_printer(mut rx: mpsc::UnboundedReceiver<PipelineEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event {
                PipelineEvent::StageStarted {
                    announcement: Some(message),
                    ..
                } => println!("{}", style(message).bold()),
                PipelineEvent::StageProgress { note, .. } => println!("{}", note),
                other => debug!(event = ?other, "Pipeline event"),
            }
        }
    })
}

pub fn success(message: impl std::fmt::Display) {
    println!("{}", style(message).green());
}

pub fn failure(message: impl std::fmt::Display) {
    eprintln!("{}", style(message).red());
}
