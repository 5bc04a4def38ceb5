//! Pipeline orchestrator - runs chained stages strictly in order.

use async_trait::async_trait;
use cloudbuild_core::ProgressReporter;
use std::future::Future;
use std::marker::PhantomData;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

/// What a stage hands to the next one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Flow<T> {
    /// Pass the value to the next stage.
    Continue(T),
    /// End the pipeline successfully without running later stages.
    Halt(String),
}

/// Why a stage refused to continue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    reason: String,
    silent: bool,
}

impl Rejection {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            silent: false,
        }
    }

    /// The user chose to stop; nothing needs to be reported.
    pub fn declined() -> Self {
        Self {
            reason: String::new(),
            silent: true,
        }
    }
}

impl From<cloudbuild_core::Error> for Rejection {
    fn from(err: cloudbuild_core::Error) -> Self {
        Self::new(err.to_string())
    }
}

impl From<cloudbuild_config::ConfigError> for Rejection {
    fn from(err: cloudbuild_config::ConfigError) -> Self {
        Self::new(err.to_string())
    }
}

/// A rejected stage, rendered as `<prefix><reason>`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{prefix}{reason}")]
pub struct StageFailure {
    pub stage: String,
    pub prefix: String,
    pub reason: String,
    /// Set when the user declined; callers print nothing.
    pub silent: bool,
}

/// Event emitted during pipeline execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    StageStarted {
        stage: String,
        announcement: Option<String>,
    },
    StageProgress {
        stage: String,
        note: String,
    },
    StageCompleted {
        stage: String,
        success: bool,
    },
    PipelineCompleted {
        success: bool,
    },
}

/// Optional destination for [`PipelineEvent`]s.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<mpsc::UnboundedSender<PipelineEvent>>,
}

impl EventSink {
    pub fn new(tx: mpsc::UnboundedSender<PipelineEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    pub fn emit(&self, event: PipelineEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }

    /// Reporter that turns notes into `StageProgress` events for `stage`.
    pub fn progress_for(&self, stage: &str) -> ProgressReporter {
        match &self.tx {
            Some(tx) => {
                let tx = tx.clone();
                let stage = stage.to_string();
                ProgressReporter::new(move |note| {
                    let _ = tx.send(PipelineEvent::StageProgress {
                        stage: stage.clone(),
                        note,
                    });
                })
            }
            None => ProgressReporter::silent(),
        }
    }
}

/// One step of a pipeline.
#[async_trait]
pub trait Stage: Send + Sync {
    type Input: Send + 'static;
    type Output: Send + 'static;

    async fn run(
        &self,
        input: Self::Input,
        events: &EventSink,
    ) -> Result<Flow<Self::Output>, StageFailure>;
}

/// A stage backed by an async closure.
pub struct FnStage<I, O, F> {
    name: String,
    prefix: String,
    announcement: Option<String>,
    f: F,
    _types: PhantomData<fn(I) -> O>,
}

/// Create a stage named `name` from an async closure.
pub fn stage<I, O, F, Fut>(name: &str, f: F) -> FnStage<I, O, F>
where
    F: Fn(I, ProgressReporter) -> Fut,
    Fut: Future<Output = Result<Flow<O>, Rejection>>,
{
    FnStage {
        name: name.to_string(),
        prefix: String::new(),
        announcement: None,
        f,
        _types: PhantomData,
    }
}

impl<I, O, F> FnStage<I, O, F> {
    /// Text put in front of the rejection reason.
    pub fn failure_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Message shown when the stage starts.
    pub fn announce(mut self, message: impl Into<String>) -> Self {
        self.announcement = Some(message.into());
        self
    }
}

#[async_trait]
impl<I, O, F, Fut> Stage for FnStage<I, O, F>
where
    I: Send + 'static,
    O: Send + 'static,
    F: Fn(I, ProgressReporter) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Flow<O>, Rejection>> + Send + 'static,
{
    type Input = I;
    type Output = O;

    async fn run(&self, input: I, events: &EventSink) -> Result<Flow<O>, StageFailure> {
        events.emit(PipelineEvent::StageStarted {
            stage: self.name.clone(),
            announcement: self.announcement.clone(),
        });
        debug!(stage = %self.name, "Stage started");

        match (self.f)(input, events.progress_for(&self.name)).await {
            Ok(flow) => {
                info!(stage = %self.name, halted = matches!(flow, Flow::Halt(_)), "Stage completed");
                events.emit(PipelineEvent::StageCompleted {
                    stage: self.name.clone(),
                    success: true,
                });
                Ok(flow)
            }
            Err(rejection) => {
                if rejection.silent {
                    info!(stage = %self.name, "Stage declined");
                } else {
                    error!(stage = %self.name, reason = %rejection.reason, "Stage failed");
                }
                events.emit(PipelineEvent::StageCompleted {
                    stage: self.name.clone(),
                    success: false,
                });
                Err(StageFailure {
                    stage: self.name.clone(),
                    prefix: self.prefix.clone(),
                    reason: rejection.reason,
                    silent: rejection.silent,
                })
            }
        }
    }
}

/// Two stages run back to back.
pub struct Chain<A, B> {
    first: A,
    second: B,
}

#[async_trait]
impl<A, B> Stage for Chain<A, B>
where
    A: Stage,
    B: Stage<Input = A::Output>,
{
    type Input = A::Input;
    type Output = B::Output;

    async fn run(
        &self,
        input: A::Input,
        events: &EventSink,
    ) -> Result<Flow<B::Output>, StageFailure> {
        match self.first.run(input, events).await? {
            Flow::Continue(value) => self.second.run(value, events).await,
            Flow::Halt(detail) => Ok(Flow::Halt(detail)),
        }
    }
}

/// An ordered, typed chain of stages.
///
/// Stages never overlap: each one starts only after its predecessor
/// resolved, and the first rejection ends the run.
pub struct Pipeline<S> {
    stages: S,
    events: EventSink,
}

impl<S: Stage> Pipeline<S> {
    pub fn new(first: S) -> Self {
        Self {
            stages: first,
            events: EventSink::default(),
        }
    }

    /// Append a stage consuming the current output.
    pub fn then<T>(self, next: T) -> Pipeline<Chain<S, T>>
    where
        T: Stage<Input = S::Output>,
    {
        Pipeline {
            stages: Chain {
                first: self.stages,
                second: next,
            },
            events: self.events,
        }
    }

    /// Send execution events to `tx`.
    pub fn with_events(mut self, tx: mpsc::UnboundedSender<PipelineEvent>) -> Self {
        self.events = EventSink::new(tx);
        self
    }

    /// Execute the pipeline.
    pub async fn run(&self, input: S::Input) -> Result<Flow<S::Output>, StageFailure> {
        let result = self.stages.run(input, &self.events).await;
        self.events.emit(PipelineEvent::PipelineCompleted {
            success: result.is_ok(),
        });
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_stage(
        name: &str,
        calls: Arc<AtomicUsize>,
        fail: bool,
    ) -> FnStage<u32, u32, impl Fn(u32, ProgressReporter) -> futures::future::Ready<Result<Flow<u32>, Rejection>> + Send + Sync + 'static>
    {
        let label = name.to_string();
        stage(name, move |value: u32, _progress| {
            calls.fetch_add(1, Ordering::SeqCst);
            futures::future::ready(if fail {
                Err(Rejection::new(format!("{} broke", label)))
            } else {
                Ok(Flow::Continue(value + 1))
            })
        })
        .failure_prefix(format!("{} failed: ", name))
    }

    #[tokio::test]
    async fn test_all_stages_run_in_order() {
        let calls: Vec<_> = (0..3).map(|_| Arc::new(AtomicUsize::new(0))).collect();

        let pipeline = Pipeline::new(counting_stage("one", calls[0].clone(), false))
            .then(counting_stage("two", calls[1].clone(), false))
            .then(counting_stage("three", calls[2].clone(), false));

        let result = pipeline.run(10).await.unwrap();
        assert_eq!(result, Flow::Continue(13));
        assert!(calls.iter().all(|c| c.load(Ordering::SeqCst) == 1));
    }

    #[tokio::test]
    async fn test_rejection_stops_later_stages() {
        for failing in 0..4 {
            let calls: Vec<_> = (0..4).map(|_| Arc::new(AtomicUsize::new(0))).collect();
            let names = ["one", "two", "three", "four"];

            let pipeline = Pipeline::new(counting_stage(names[0], calls[0].clone(), failing == 0))
                .then(counting_stage(names[1], calls[1].clone(), failing == 1))
                .then(counting_stage(names[2], calls[2].clone(), failing == 2))
                .then(counting_stage(names[3], calls[3].clone(), failing == 3));

            let failure = pipeline.run(0).await.unwrap_err();
            assert_eq!(failure.stage, names[failing]);
            assert_eq!(
                failure.to_string(),
                format!("{} failed: {} broke", names[failing], names[failing])
            );

            for (idx, count) in calls.iter().enumerate() {
                let expected = if idx <= failing { 1 } else { 0 };
                assert_eq!(count.load(Ordering::SeqCst), expected, "stage {}", idx);
            }
        }
    }

    #[tokio::test]
    async fn test_halt_skips_remaining_stages() {
        let after = Arc::new(AtomicUsize::new(0));

        let pipeline = Pipeline::new(stage("open", |_: (), _progress| async {
            Ok::<_, Rejection>(Flow::<u32>::Halt("https://session".to_string()))
        }))
        .then(counting_stage("later", after.clone(), false));

        let result = pipeline.run(()).await.unwrap();
        assert_eq!(result, Flow::Halt("https://session".to_string()));
        assert_eq!(after.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_stage_types_are_threaded() {
        let pipeline = Pipeline::new(stage("parse", |input: &'static str, _progress| async move {
            input
                .parse::<u32>()
                .map(Flow::Continue)
                .map_err(|e| Rejection::new(e.to_string()))
        }))
        .then(stage("render", |n: u32, _progress| async move {
            Ok(Flow::Continue(format!("#{}", n * 2)))
        }));

        assert_eq!(
            pipeline.run("21").await.unwrap(),
            Flow::Continue("#42".to_string())
        );

        let failure = pipeline.run("x").await.unwrap_err();
        assert_eq!(failure.stage, "parse");
    }

    #[tokio::test]
    async fn test_declined_rejection_is_silent() {
        let pipeline = Pipeline::new(
            stage("confirm", |_: (), _progress| async {
                Err::<Flow<()>, _>(Rejection::declined())
            })
            .failure_prefix("ignored: "),
        );

        let failure = pipeline.run(()).await.unwrap_err();
        assert!(failure.silent);
        assert!(failure.reason.is_empty());
    }

    #[tokio::test]
    async fn test_events_report_progress() {
        let (tx, mut rx) = mpsc::unbounded_channel();

        let pipeline = Pipeline::new(
            stage("upload", |_: (), progress: ProgressReporter| async move {
                progress.report("50%");
                progress.report("100%");
                Ok::<_, Rejection>(Flow::Continue(()))
            })
            .announce("Uploading..."),
        )
        .with_events(tx);

        pipeline.run(()).await.unwrap();
        drop(pipeline);

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }

        assert_eq!(
            events,
            vec![
                PipelineEvent::StageStarted {
                    stage: "upload".to_string(),
                    announcement: Some("Uploading...".to_string()),
                },
                PipelineEvent::StageProgress {
                    stage: "upload".to_string(),
                    note: "50%".to_string(),
                },
                PipelineEvent::StageProgress {
                    stage: "upload".to_string(),
                    note: "100%".to_string(),
                },
                PipelineEvent::StageCompleted {
                    stage: "upload".to_string(),
                    success: true,
                },
                PipelineEvent::PipelineCompleted { success: true },
            ]
        );
    }
}
