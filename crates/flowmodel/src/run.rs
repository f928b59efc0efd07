use crate::Value;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type RunId = Uuid;

/// Status of one flow run. Exactly one terminal status is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RunStatus {
    Pending,
    Running,
    Success,
    Failed,
    Cancelled,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStatus::Success | RunStatus::Failed | RunStatus::Cancelled
        )
    }
}

/// Status of one task-run row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskRunStatus {
    Running,
    Success,
    Failure,
}

/// One execution of a flow. Created in `Pending` when a start request is
/// accepted; the engine is the only writer for the rest of its lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowRun {
    pub id: RunId,
    pub flow_id: String,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Outcome of one task within a run, keyed by `(run_id, task_name)`.
///
/// A task revisited through a retry path overwrites its own row instead of
/// inserting a new one, so the row count per pair stays at one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRun {
    pub run_id: RunId,
    pub task_name: String,
    pub status: TaskRunStatus,
    pub output: Option<Value>,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}
