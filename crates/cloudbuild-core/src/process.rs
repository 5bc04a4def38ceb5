//! Types for supervised external processes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Color used when rendering a process label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LabelColor {
    Yellow,
    Cyan,
    Green,
    Magenta,
    Blue,
    Red,
}

/// Specification for a process to supervise.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessSpec {
    /// Label prefixed to every output line.
    pub label: String,
    /// Label color.
    pub color: LabelColor,
    /// Program to execute.
    pub program: String,
    /// Arguments passed verbatim.
    pub args: Vec<String>,
    /// Working directory.
    pub working_dir: Option<PathBuf>,
}

impl ProcessSpec {
    pub fn new(label: impl Into<String>, color: LabelColor, program: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            color,
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// A line of output from a supervised process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabeledLine {
    pub timestamp: DateTime<Utc>,
    pub label: String,
    pub color: LabelColor,
    pub stream: OutputStream,
    pub content: String,
}

/// Destination for multiplexed process output.
pub trait LineSink: Send + Sync {
    fn line(&self, line: LabeledLine);
}
