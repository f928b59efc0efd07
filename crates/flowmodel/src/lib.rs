//! Core types for the flow execution engine
//!
//! This crate provides the flow definition model, run/task-run records,
//! the task implementation contract, and the error taxonomy that the
//! engine and every other component depend on. It has no runtime
//! machinery of its own.

mod error;
mod flow;
mod run;
mod task;
mod value;

pub use error::{EngineError, StoreError, TaskError};
pub use flow::{Condition, Flow, TaskDef, TaskOutcome, END_TASK};
pub use run::{FlowRun, RunId, RunStatus, TaskRun, TaskRunStatus};
pub use task::{Task, TaskContext, TaskResult};
pub use value::Value;
