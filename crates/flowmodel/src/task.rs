use crate::{RunId, TaskError, Value};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Core trait every task implementation provides.
///
/// Implementations are registered under their task name; the engine resolves
/// them by the name declared in the flow. An `Err` from [`Task::run`] is
/// treated like a failure outcome, with the error detail recorded on the
/// task-run row.
#[async_trait]
pub trait Task: Send + Sync {
    /// Registry key, e.g. "fetch" or "process".
    fn name(&self) -> &str;

    /// Execute against the given context.
    async fn run(&self, ctx: TaskContext) -> Result<TaskResult, TaskError>;
}

/// Context handed to each task invocation.
#[derive(Clone)]
pub struct TaskContext {
    /// Run this invocation belongs to.
    pub run_id: RunId,

    /// Output of the previous task in the sequence, `Value::Null` for the
    /// first task.
    pub previous_output: Value,

    /// Cancelled when the run is stopped; long-running tasks may observe it
    /// to unwind early.
    pub cancellation: CancellationToken,
}

impl TaskContext {
    pub fn new(run_id: RunId, previous_output: Value) -> Self {
        Self {
            run_id,
            previous_output,
            cancellation: CancellationToken::new(),
        }
    }

    pub fn previous_output(&self) -> &Value {
        &self.previous_output
    }
}

/// Outcome of one task invocation: a succeeded flag plus an opaque payload
/// handed to the next task.
#[derive(Debug, Clone)]
pub struct TaskResult {
    pub succeeded: bool,
    pub output: Value,
}

impl TaskResult {
    pub fn success(output: impl Into<Value>) -> Self {
        Self {
            succeeded: true,
            output: output.into(),
        }
    }

    pub fn failure(output: impl Into<Value>) -> Self {
        Self {
            succeeded: false,
            output: output.into(),
        }
    }
}
