use async_trait::async_trait;
use chrono::Utc;
use flowmodel::{
    Flow, FlowRun, RunId, RunStatus, StoreError, TaskRun, TaskRunStatus, Value,
};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Persistence contract for flows, runs, and task-run rows.
///
/// The store is the single source of truth for status: the engine writes
/// every transition through it and reads it back when computing a run's
/// final outcome. Each call is an independent transaction; the engine never
/// holds a lock across calls, so observers may see any intermediate state.
#[async_trait]
pub trait RunStore: Send + Sync {
    /// Persist a new flow definition. Rejects duplicate identifiers.
    async fn create_flow(&self, flow: Flow) -> Result<(), StoreError>;

    async fn get_flow(&self, flow_id: &str) -> Result<Option<Flow>, StoreError>;

    async fn list_flows(&self) -> Result<Vec<Flow>, StoreError>;

    /// Create a run row in its initial status.
    async fn create_run(
        &self,
        run_id: RunId,
        flow_id: &str,
        status: RunStatus,
    ) -> Result<(), StoreError>;

    async fn get_run(&self, run_id: &RunId) -> Result<Option<FlowRun>, StoreError>;

    /// Runs of one flow, most recently started first.
    async fn list_runs(&self, flow_id: &str) -> Result<Vec<FlowRun>, StoreError>;

    /// Update a run's status, stamping `finished_at` when the status is
    /// terminal. Unknown run ids are a silent no-op.
    async fn update_run_status(
        &self,
        run_id: &RunId,
        status: RunStatus,
    ) -> Result<(), StoreError>;

    /// Insert or overwrite the task-run row keyed by `(run_id, task_name)`.
    /// An overwrite keeps the row's position and stamps `finished_at`.
    async fn upsert_task_run(
        &self,
        run_id: &RunId,
        task_name: &str,
        status: TaskRunStatus,
        output: Option<Value>,
        error: Option<String>,
    ) -> Result<(), StoreError>;

    /// Task-run rows of one run in first-visit order.
    async fn list_task_runs(&self, run_id: &RunId) -> Result<Vec<TaskRun>, StoreError>;

    async fn count_task_runs(
        &self,
        run_id: &RunId,
        status: TaskRunStatus,
    ) -> Result<usize, StoreError>;
}

/// In-memory store backed by `tokio::sync::RwLock` maps.
#[derive(Default)]
pub struct MemoryStore {
    flows: RwLock<HashMap<String, Flow>>,
    runs: RwLock<HashMap<RunId, FlowRun>>,
    task_runs: RwLock<HashMap<RunId, Vec<TaskRun>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RunStore for MemoryStore {
    async fn create_flow(&self, flow: Flow) -> Result<(), StoreError> {
        let mut flows = self.flows.write().await;
        if flows.contains_key(&flow.id) {
            return Err(StoreError::FlowExists(flow.id));
        }
        flows.insert(flow.id.clone(), flow);
        Ok(())
    }

    async fn get_flow(&self, flow_id: &str) -> Result<Option<Flow>, StoreError> {
        Ok(self.flows.read().await.get(flow_id).cloned())
    }

    async fn list_flows(&self) -> Result<Vec<Flow>, StoreError> {
        let mut flows: Vec<Flow> = self.flows.read().await.values().cloned().collect();
        flows.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(flows)
    }

    async fn create_run(
        &self,
        run_id: RunId,
        flow_id: &str,
        status: RunStatus,
    ) -> Result<(), StoreError> {
        let run = FlowRun {
            id: run_id,
            flow_id: flow_id.to_string(),
            status,
            started_at: Utc::now(),
            finished_at: None,
        };
        self.runs.write().await.insert(run_id, run);
        Ok(())
    }

    async fn get_run(&self, run_id: &RunId) -> Result<Option<FlowRun>, StoreError> {
        Ok(self.runs.read().await.get(run_id).cloned())
    }

    async fn list_runs(&self, flow_id: &str) -> Result<Vec<FlowRun>, StoreError> {
        let mut runs: Vec<FlowRun> = self
            .runs
            .read()
            .await
            .values()
            .filter(|r| r.flow_id == flow_id)
            .cloned()
            .collect();
        runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(runs)
    }

    async fn update_run_status(
        &self,
        run_id: &RunId,
        status: RunStatus,
    ) -> Result<(), StoreError> {
        if let Some(run) = self.runs.write().await.get_mut(run_id) {
            if status.is_terminal() {
                run.finished_at = Some(Utc::now());
            }
            run.status = status;
        }
        Ok(())
    }

    async fn upsert_task_run(
        &self,
        run_id: &RunId,
        task_name: &str,
        status: TaskRunStatus,
        output: Option<Value>,
        error: Option<String>,
    ) -> Result<(), StoreError> {
        let mut all = self.task_runs.write().await;
        let rows = all.entry(*run_id).or_default();
        match rows.iter_mut().find(|r| r.task_name == task_name) {
            Some(row) => {
                row.status = status;
                row.output = output;
                row.error = error;
                row.finished_at = Some(Utc::now());
            }
            None => rows.push(TaskRun {
                run_id: *run_id,
                task_name: task_name.to_string(),
                status,
                output,
                error,
                started_at: Utc::now(),
                finished_at: None,
            }),
        }
        Ok(())
    }

    async fn list_task_runs(&self, run_id: &RunId) -> Result<Vec<TaskRun>, StoreError> {
        Ok(self
            .task_runs
            .read()
            .await
            .get(run_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn count_task_runs(
        &self,
        run_id: &RunId,
        status: TaskRunStatus,
    ) -> Result<usize, StoreError> {
        Ok(self
            .task_runs
            .read()
            .await
            .get(run_id)
            .map(|rows| rows.iter().filter(|r| r.status == status).count())
            .unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn flow(id: &str) -> Flow {
        Flow {
            id: id.to_string(),
            name: "demo".to_string(),
            start_task: "A".to_string(),
            tasks: vec![],
            conditions: vec![],
        }
    }

    #[tokio::test]
    async fn duplicate_flow_id_is_rejected() {
        let store = MemoryStore::new();
        store.create_flow(flow("f1")).await.unwrap();
        assert!(matches!(
            store.create_flow(flow("f1")).await,
            Err(StoreError::FlowExists(_))
        ));
    }

    #[tokio::test]
    async fn terminal_status_stamps_finished_at() {
        let store = MemoryStore::new();
        let run_id = Uuid::new_v4();
        store
            .create_run(run_id, "f1", RunStatus::Pending)
            .await
            .unwrap();

        store
            .update_run_status(&run_id, RunStatus::Running)
            .await
            .unwrap();
        let run = store.get_run(&run_id).await.unwrap().unwrap();
        assert_eq!(run.status, RunStatus::Running);
        assert!(run.finished_at.is_none());

        store
            .update_run_status(&run_id, RunStatus::Success)
            .await
            .unwrap();
        let run = store.get_run(&run_id).await.unwrap().unwrap();
        assert_eq!(run.status, RunStatus::Success);
        assert!(run.finished_at.is_some());
    }

    #[tokio::test]
    async fn unknown_run_status_update_is_a_no_op() {
        let store = MemoryStore::new();
        store
            .update_run_status(&Uuid::new_v4(), RunStatus::Cancelled)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn task_run_upsert_overwrites_in_place() {
        let store = MemoryStore::new();
        let run_id = Uuid::new_v4();

        store
            .upsert_task_run(&run_id, "A", TaskRunStatus::Running, None, None)
            .await
            .unwrap();
        store
            .upsert_task_run(&run_id, "B", TaskRunStatus::Running, None, None)
            .await
            .unwrap();
        store
            .upsert_task_run(
                &run_id,
                "A",
                TaskRunStatus::Failure,
                None,
                Some("task returned failure".to_string()),
            )
            .await
            .unwrap();

        let rows = store.list_task_runs(&run_id).await.unwrap();
        assert_eq!(rows.len(), 2);
        // Overwrite keeps first-visit order.
        assert_eq!(rows[0].task_name, "A");
        assert_eq!(rows[0].status, TaskRunStatus::Failure);
        assert!(rows[0].finished_at.is_some());
        assert_eq!(rows[1].task_name, "B");

        assert_eq!(
            store
                .count_task_runs(&run_id, TaskRunStatus::Failure)
                .await
                .unwrap(),
            1
        );
    }
}
