//! `engine` crate: workflow models, structural validation, and the runner.

pub mod error;
pub mod executor;
pub mod graph;
pub mod models;
pub mod validate;

pub use error::EngineError;
pub use executor::{NodeConfig, RunReport, RunnerConfig, WorkflowRunner};
pub use graph::ExecutionGraph;
pub use models::{Edge, Node, NodeKind, Workflow};
pub use validate::{validate, validate_workflow, ValidationResult};

#[cfg(test)]
mod executor_tests;
