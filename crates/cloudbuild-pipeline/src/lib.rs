//! Sequential command pipelines for the cloudbuild CLI.
//!
//! Every multi-step remote operation is a chain of stages run one after the
//! other; the first rejection aborts the chain with a single formatted
//! message.

pub mod auth;
pub mod download;
pub mod orchestrator;
pub mod project;
pub mod remote;
pub mod serve;

#[cfg(test)]
mod testing;

pub use orchestrator::{
    Chain, EventSink, FnStage, Flow, Pipeline, PipelineEvent, Rejection, Stage, StageFailure,
    stage,
};
pub use remote::{BuildOutcome, RemoteBuild, RemoteBuildError};
pub use serve::{Serve, ServeError};
