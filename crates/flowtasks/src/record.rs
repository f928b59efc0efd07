use async_trait::async_trait;
use flowmodel::{Task, TaskContext, TaskError, TaskResult, Value};
use std::collections::HashMap;
use std::time::Duration;

/// Acknowledges persistence of the previous task's result.
pub struct StoreTask;

#[async_trait]
impl Task for StoreTask {
    fn name(&self) -> &str {
        "store"
    }

    async fn run(&self, ctx: TaskContext) -> Result<TaskResult, TaskError> {
        tokio::time::sleep(Duration::from_millis(100)).await;
        tracing::debug!(run_id = %ctx.run_id, "storing result");
        let output = Value::Object(HashMap::from([(
            "stored".to_string(),
            Value::Bool(true),
        )]));
        Ok(TaskResult::success(output))
    }
}
