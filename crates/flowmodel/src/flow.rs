use serde::{Deserialize, Serialize};

/// Name that terminates a run's task sequence when used as a next-task
/// target or as `start_task`.
pub const END_TASK: &str = "end";

/// Outcome value a condition reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskOutcome {
    Success,
    Failure,
    End,
}

/// Complete flow definition, immutable after creation.
///
/// The identifier is caller-supplied and must be unique in the store.
/// `start_task` should name a declared task or [`END_TASK`]; the engine does
/// not enforce this, an undeclared name fails the run at its first step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Flow {
    pub id: String,
    pub name: String,
    pub start_task: String,
    pub tasks: Vec<TaskDef>,
    pub conditions: Vec<Condition>,
}

impl Flow {
    /// Find a task definition by name, the join key used by the engine.
    pub fn find_task(&self, name: &str) -> Option<&TaskDef> {
        self.tasks.iter().find(|t| t.name == name)
    }
}

/// Task declaration inside a flow. The name must be unique within the flow
/// and is also the key used to resolve the runtime implementation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDef {
    pub name: String,
    pub description: String,
}

/// Branching rule reacting to one task's outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Condition {
    pub name: String,
    pub description: String,
    pub source_task: String,
    pub outcome: TaskOutcome,
    pub target_task_success: String,
    pub target_task_failure: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_wire_shape() {
        let flow: Flow = serde_json::from_str(
            r#"{
                "id": "f1",
                "name": "demo",
                "start_task": "A",
                "tasks": [
                    {"name": "A", "description": "first"},
                    {"name": "B", "description": "second"}
                ],
                "conditions": [{
                    "name": "after-a",
                    "description": "",
                    "source_task": "A",
                    "outcome": "success",
                    "target_task_success": "B",
                    "target_task_failure": "end"
                }]
            }"#,
        )
        .unwrap();

        assert_eq!(flow.start_task, "A");
        assert!(flow.find_task("B").is_some());
        assert!(flow.find_task("C").is_none());
        assert_eq!(flow.conditions[0].outcome, TaskOutcome::Success);
        assert_eq!(flow.conditions[0].target_task_failure, END_TASK);
    }
}
