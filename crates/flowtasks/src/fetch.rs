use async_trait::async_trait;
use flowmodel::{Task, TaskContext, TaskError, TaskResult, Value};
use std::collections::HashMap;
use std::time::Duration;

/// Produces a fixed batch of items, simulating a slow upstream fetch.
pub struct FetchTask;

#[async_trait]
impl Task for FetchTask {
    fn name(&self) -> &str {
        "fetch"
    }

    async fn run(&self, _ctx: TaskContext) -> Result<TaskResult, TaskError> {
        tokio::time::sleep(Duration::from_millis(200)).await;
        let output = Value::Object(HashMap::from([(
            "items".to_string(),
            Value::Array(vec![
                Value::Number(1.0),
                Value::Number(2.0),
                Value::Number(3.0),
            ]),
        )]));
        Ok(TaskResult::success(output))
    }
}
