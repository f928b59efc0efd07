use flowmodel::{Condition, TaskOutcome, END_TASK};

/// Select the next task name after `source_task` finished with `succeeded`.
///
/// Only the first declared condition for a source task is ever consulted;
/// later conditions on the same task are dead. With no matching condition
/// the task sequence ends.
///
/// The success branch is taken only when the task succeeded AND the chosen
/// condition's own `outcome` field is `success` — a condition configured
/// with outcome `failure` routes even a successful task to its failure
/// target. Intentional: existing flows rely on this exact rule.
pub fn evaluate(conditions: &[Condition], source_task: &str, succeeded: bool) -> String {
    let Some(cond) = conditions.iter().find(|c| c.source_task == source_task) else {
        return END_TASK.to_string();
    };
    if succeeded && cond.outcome == TaskOutcome::Success {
        cond.target_task_success.clone()
    } else {
        cond.target_task_failure.clone()
    }
}
