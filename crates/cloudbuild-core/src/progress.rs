//! Progress notes emitted by long-running operations.

use std::fmt;
use std::sync::Arc;

/// Cheaply cloneable handle that forwards progress notes to whoever is
/// listening. A reporter built with [`ProgressReporter::silent`] drops them.
#[derive(Clone, Default)]
pub struct ProgressReporter {
    sink: Option<Arc<dyn Fn(String) + Send + Sync>>,
}

impl ProgressReporter {
    pub fn new(sink: impl Fn(String) + Send + Sync + 'static) -> Self {
        Self {
            sink: Some(Arc::new(sink)),
        }
    }

    pub fn silent() -> Self {
        Self::default()
    }

    /// Report one progress note.
    pub fn report(&self, note: impl Into<String>) {
        if let Some(sink) = &self.sink {
            sink(note.into());
        }
    }
}

impl fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("attached", &self.sink.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_report_forwards_notes() {
        let notes = Arc::new(Mutex::new(Vec::new()));
        let captured = notes.clone();
        let reporter = ProgressReporter::new(move |note| captured.lock().unwrap().push(note));

        reporter.report("10%");
        reporter.clone().report("20%");

        assert_eq!(*notes.lock().unwrap(), vec!["10%", "20%"]);
    }

    #[test]
    fn test_silent_reporter_drops_notes() {
        let reporter = ProgressReporter::silent();
        reporter.report("ignored");
        assert!(format!("{:?}", reporter).contains("false"));
    }
}
