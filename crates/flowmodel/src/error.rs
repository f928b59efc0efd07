use thiserror::Error;

/// Errors surfaced by the execution engine.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("flow not found: {0}")]
    FlowNotFound(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Errors from the run/task store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("flow already exists: {0}")]
    FlowExists(String),

    #[error("backend failure: {0}")]
    Backend(String),
}

/// Errors raised by a task implementation.
///
/// These are recoverable at the flow level: the engine routes them through
/// the condition evaluator like any failure outcome.
#[derive(Error, Debug, Clone)]
pub enum TaskError {
    #[error("missing input: {0}")]
    MissingInput(String),

    #[error("execution failed: {0}")]
    ExecutionFailed(String),
}
