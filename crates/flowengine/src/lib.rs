//! Flow execution runtime
//!
//! This crate provides the engine that drives flow runs to completion:
//! task sequencing, condition evaluation, status recording, and cooperative
//! cancellation of concurrent runs. It consumes a pluggable task locator
//! and a run/task store through trait contracts.

mod engine;
mod evaluate;
mod locator;
mod store;

pub use engine::FlowEngine;
pub use evaluate::evaluate;
pub use locator::{TaskLocator, TaskRegistry};
pub use store::{MemoryStore, RunStore};
