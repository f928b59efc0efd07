use async_trait::async_trait;
use flowmodel::{Task, TaskContext, TaskError, TaskResult, Value};
use std::collections::HashMap;
use std::time::Duration;

/// Sums the `items` of the previous task's output into `{"sum": n}`.
/// Fails when there is no previous output to work on.
pub struct ProcessTask;

#[async_trait]
impl Task for ProcessTask {
    fn name(&self) -> &str {
        "process"
    }

    async fn run(&self, ctx: TaskContext) -> Result<TaskResult, TaskError> {
        tokio::time::sleep(Duration::from_millis(200)).await;

        let previous = ctx.previous_output();
        if is_empty(previous) {
            return Ok(TaskResult::failure(Value::Null));
        }

        let sum: f64 = previous
            .get("items")
            .and_then(Value::as_array)
            .unwrap_or(&[])
            .iter()
            .filter_map(Value::as_f64)
            .sum();

        let output = Value::Object(HashMap::from([("sum".to_string(), Value::Number(sum))]));
        Ok(TaskResult::success(output))
    }
}

/// A previous output with nothing in it gives this task nothing to work on.
fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => *n == 0.0,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn sums_previous_items() {
        let previous = Value::Object(HashMap::from([(
            "items".to_string(),
            Value::Array(vec![
                Value::Number(1.0),
                Value::Number(2.0),
                Value::Number(3.0),
            ]),
        )]));
        let result = ProcessTask
            .run(TaskContext::new(Uuid::new_v4(), previous))
            .await
            .unwrap();
        assert!(result.succeeded);
        assert_eq!(result.output.get("sum").and_then(Value::as_f64), Some(6.0));
    }

    #[tokio::test]
    async fn fails_without_previous_output() {
        let result = ProcessTask
            .run(TaskContext::new(Uuid::new_v4(), Value::Null))
            .await
            .unwrap();
        assert!(!result.succeeded);
    }

    #[tokio::test]
    async fn fails_on_empty_previous_object() {
        let result = ProcessTask
            .run(TaskContext::new(Uuid::new_v4(), Value::Object(HashMap::new())))
            .await
            .unwrap();
        assert!(!result.succeeded);
    }
}
