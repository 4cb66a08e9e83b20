pub mod blob;
pub mod config;
pub mod decision;
pub mod error;
pub mod events;
pub mod partition;
pub mod paths;
pub mod persist;
pub mod pipeline;
pub mod queue;
pub mod store;
pub mod types;

pub use error::{PersistError, PipelineError, Result};
