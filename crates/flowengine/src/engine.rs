use crate::evaluate::evaluate;
use crate::locator::TaskLocator;
use crate::store::RunStore;
use flowmodel::{
    EngineError, RunId, RunStatus, Task, TaskContext, TaskRunStatus, Value, END_TASK,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// In-flight bookkeeping for one run.
struct RunHandle {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

/// Drives flow runs to completion.
///
/// Each started run gets its own spawned execution context; many runs
/// execute concurrently and share nothing but the store and the read-mostly
/// implementation cache. Within one run, tasks are strictly sequential.
///
/// The engine is the only writer of run and task-run status; it holds no
/// lock across store calls, so every update is independently visible.
#[derive(Clone)]
pub struct FlowEngine {
    store: Arc<dyn RunStore>,
    locator: Arc<dyn TaskLocator>,
    cache: Arc<RwLock<HashMap<String, Arc<dyn Task>>>>,
    inflight: Arc<Mutex<HashMap<RunId, RunHandle>>>,
}

impl FlowEngine {
    /// Create an engine, eagerly priming the implementation cache from the
    /// locator. The cache is refreshed lazily on miss and never invalidated
    /// mid-run; registry changes fully take effect only on restart.
    pub async fn new(store: Arc<dyn RunStore>, locator: Arc<dyn TaskLocator>) -> Self {
        let cache: HashMap<String, Arc<dyn Task>> =
            locator.list_all().await.into_iter().collect();
        tracing::info!(tasks = cache.len(), "primed task implementation cache");
        Self {
            store,
            locator,
            cache: Arc::new(RwLock::new(cache)),
            inflight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Start a run of `flow_id` and return its identifier immediately; the
    /// run itself proceeds in a spawned execution context. Fails only when
    /// the flow is unknown or the run row cannot be created.
    pub async fn start(&self, flow_id: &str) -> Result<RunId, EngineError> {
        if self.store.get_flow(flow_id).await?.is_none() {
            return Err(EngineError::FlowNotFound(flow_id.to_string()));
        }

        let run_id = Uuid::new_v4();
        self.store
            .create_run(run_id, flow_id, RunStatus::Pending)
            .await?;

        let cancel = CancellationToken::new();
        self.inflight.lock().await.insert(
            run_id,
            RunHandle {
                cancel: cancel.clone(),
                task: None,
            },
        );

        let engine = self.clone();
        let flow_id = flow_id.to_string();
        let handle = tokio::spawn(async move { engine.drive(run_id, flow_id, cancel).await });

        // The context may already have finished and deregistered itself;
        // only attach the handle while its entry is still present.
        if let Some(entry) = self.inflight.lock().await.get_mut(&run_id) {
            entry.task = Some(handle);
        }

        tracing::info!(%run_id, "run started");
        Ok(run_id)
    }

    /// Stop a run: set its cancellation flag, forcibly cancel its execution
    /// context if still registered, then write CANCELLED unconditionally.
    /// Last writer wins, even against a run that already reached a terminal
    /// status. Safe to call repeatedly or for unknown run ids.
    pub async fn stop(&self, run_id: &RunId) -> Result<(), EngineError> {
        if let Some(entry) = self.inflight.lock().await.remove(run_id) {
            entry.cancel.cancel();
            if let Some(handle) = entry.task {
                handle.abort();
            }
            tracing::info!(%run_id, "run cancelled");
        }
        self.store
            .update_run_status(run_id, RunStatus::Cancelled)
            .await?;
        Ok(())
    }

    /// Whether the run is still registered in the in-flight table.
    pub async fn is_active(&self, run_id: &RunId) -> bool {
        self.inflight.lock().await.contains_key(run_id)
    }

    /// Wait for a run's execution context to finish. Completed or unknown
    /// runs return immediately.
    pub async fn wait(&self, run_id: &RunId) {
        let handle = self
            .inflight
            .lock()
            .await
            .get_mut(run_id)
            .and_then(|entry| entry.task.take());
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    /// Outermost layer of one execution context: race the run loop against
    /// the cancellation flag, write the final status, then deregister the
    /// run. Deregistration happens on every exit path.
    async fn drive(self, run_id: RunId, flow_id: String, cancel: CancellationToken) {
        let status = tokio::select! {
            _ = cancel.cancelled() => RunStatus::Cancelled,
            outcome = self.run_to_completion(run_id, &flow_id, &cancel) => match outcome {
                Ok(status) => status,
                Err(err) => {
                    tracing::error!(%run_id, error = %err, "run loop failed");
                    RunStatus::Failed
                }
            },
        };

        if let Err(err) = self.store.update_run_status(&run_id, status).await {
            tracing::warn!(%run_id, error = %err, "failed to record final run status");
        }
        self.inflight.lock().await.remove(&run_id);
        tracing::info!(%run_id, ?status, "run finished");
    }

    /// The run loop: walk the task sequence from `start_task` until the end
    /// marker or a dead end, recording each visit, then derive the final
    /// status from the recorded failures.
    async fn run_to_completion(
        &self,
        run_id: RunId,
        flow_id: &str,
        cancel: &CancellationToken,
    ) -> Result<RunStatus, EngineError> {
        self.store
            .update_run_status(&run_id, RunStatus::Running)
            .await?;

        let Some(flow) = self.store.get_flow(flow_id).await? else {
            tracing::warn!(%run_id, flow_id, "flow definition missing");
            return Ok(RunStatus::Failed);
        };

        let mut current = flow.start_task.clone();
        let mut previous_output = Value::Null;

        while !current.is_empty() && current != END_TASK {
            if cancel.is_cancelled() {
                return Ok(RunStatus::Cancelled);
            }

            // Structural errors end the sequence without consulting
            // conditions, unlike a task-level failure.
            if flow.find_task(&current).is_none() {
                self.record_failure(&run_id, &current, "task not defined").await?;
                break;
            }

            let Some(task) = self.resolve(&current).await else {
                self.record_failure(&run_id, &current, "impl not found").await?;
                break;
            };

            self.store
                .upsert_task_run(&run_id, &current, TaskRunStatus::Running, None, None)
                .await?;
            tracing::debug!(%run_id, task = %current, "running task");

            let ctx = TaskContext {
                run_id,
                previous_output: previous_output.clone(),
                cancellation: cancel.clone(),
            };

            match task.run(ctx).await {
                Err(err) => {
                    self.record_failure(&run_id, &current, &format!("exception: {err}"))
                        .await?;
                    current = evaluate(&flow.conditions, &current, false);
                }
                Ok(result) => {
                    let (status, error) = if result.succeeded {
                        (TaskRunStatus::Success, None)
                    } else {
                        (
                            TaskRunStatus::Failure,
                            Some("task returned failure".to_string()),
                        )
                    };
                    let output = if result.output.is_null() {
                        None
                    } else {
                        Some(result.output.clone())
                    };
                    self.store
                        .upsert_task_run(&run_id, &current, status, output, error)
                        .await?;

                    previous_output = result.output;
                    current = evaluate(&flow.conditions, &current, result.succeeded);
                }
            }
        }

        // Reaching the end marker does not by itself decide the outcome:
        // any failure row recorded earlier in this run fails the whole run.
        let failures = self
            .store
            .count_task_runs(&run_id, TaskRunStatus::Failure)
            .await?;
        Ok(if failures > 0 {
            RunStatus::Failed
        } else {
            RunStatus::Success
        })
    }

    async fn record_failure(
        &self,
        run_id: &RunId,
        task_name: &str,
        error: &str,
    ) -> Result<(), EngineError> {
        tracing::warn!(%run_id, task = %task_name, error, "task failed");
        self.store
            .upsert_task_run(
                run_id,
                task_name,
                TaskRunStatus::Failure,
                None,
                Some(error.to_string()),
            )
            .await?;
        Ok(())
    }

    /// Resolve a task implementation, preferring the local cache and
    /// falling back to the locator on miss. Cache fills are safe under
    /// concurrent access from multiple runs.
    async fn resolve(&self, task_name: &str) -> Option<Arc<dyn Task>> {
        if let Some(task) = self.cache.read().await.get(task_name) {
            return Some(Arc::clone(task));
        }
        let task = self.locator.locate(task_name).await?;
        self.cache
            .write()
            .await
            .insert(task_name.to_string(), Arc::clone(&task));
        Some(task)
    }
}
