//! Built-in task implementations
//!
//! A small demo pipeline: `fetch` produces a batch of items, `process`
//! aggregates the previous task's items, `store` acknowledges persistence.
//! Useful for exercising flows end to end without external services.

mod fetch;
mod process;
mod record;

pub use fetch::FetchTask;
pub use process::ProcessTask;
pub use record::StoreTask;

use flowengine::TaskRegistry;
use std::sync::Arc;

/// Register every built-in task with the given registry.
pub async fn register_builtin(registry: &TaskRegistry) {
    registry.register(Arc::new(FetchTask)).await;
    registry.register(Arc::new(ProcessTask)).await;
    registry.register(Arc::new(StoreTask)).await;
}
