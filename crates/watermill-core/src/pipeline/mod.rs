//! Pipeline Orchestrator.
//!
//! Drives one bundle at a time through dequeue, download, partition, publish,
//! metadata join, classification and persistence. `Pipeline::run` is the
//! long-lived polling loop; `Pipeline::run_cycle` is a single poll.

pub mod runner;
pub mod stage;

pub use runner::{CycleOutcome, Pipeline, PipelineParts};
pub use stage::{LastCycle, PipelineStatus, Stage};
