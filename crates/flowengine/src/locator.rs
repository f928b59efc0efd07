use async_trait::async_trait;
use flowmodel::Task;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Source of task implementations, keyed by task name.
///
/// The engine consults it once at startup to prime its local cache and
/// again on every cache miss. Real deployments may back this with a
/// database table or a plugin host; [`TaskRegistry`] is the in-process
/// implementation.
#[async_trait]
pub trait TaskLocator: Send + Sync {
    /// All registered (task name, implementation) pairs.
    async fn list_all(&self) -> Vec<(String, Arc<dyn Task>)>;

    /// Implementation for a single task name, if registered.
    async fn locate(&self, task_name: &str) -> Option<Arc<dyn Task>>;
}

/// In-process registry of task implementations, populated at startup
/// through explicit registration calls.
#[derive(Default)]
pub struct TaskRegistry {
    tasks: RwLock<HashMap<String, Arc<dyn Task>>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task under its own name. A later registration for the
    /// same name replaces the earlier one.
    pub async fn register(&self, task: Arc<dyn Task>) {
        let name = task.name().to_string();
        tracing::info!("registering task implementation: {}", name);
        self.tasks.write().await.insert(name, task);
    }

    /// Names of every registered task.
    pub async fn task_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tasks.read().await.keys().cloned().collect();
        names.sort();
        names
    }
}

#[async_trait]
impl TaskLocator for TaskRegistry {
    async fn list_all(&self) -> Vec<(String, Arc<dyn Task>)> {
        self.tasks
            .read()
            .await
            .iter()
            .map(|(name, task)| (name.clone(), Arc::clone(task)))
            .collect()
    }

    async fn locate(&self, task_name: &str) -> Option<Arc<dyn Task>> {
        self.tasks.read().await.get(task_name).map(Arc::clone)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowmodel::{TaskContext, TaskError, TaskResult};

    struct Noop(&'static str);

    #[async_trait]
    impl Task for Noop {
        fn name(&self) -> &str {
            self.0
        }

        async fn run(&self, _ctx: TaskContext) -> Result<TaskResult, TaskError> {
            Ok(TaskResult::success(flowmodel::Value::Null))
        }
    }

    #[tokio::test]
    async fn register_and_locate() {
        let registry = TaskRegistry::new();
        registry.register(Arc::new(Noop("fetch"))).await;
        registry.register(Arc::new(Noop("process"))).await;

        assert!(registry.locate("fetch").await.is_some());
        assert!(registry.locate("unknown").await.is_none());
        assert_eq!(registry.task_names().await, vec!["fetch", "process"]);
        assert_eq!(registry.list_all().await.len(), 2);
    }
}
