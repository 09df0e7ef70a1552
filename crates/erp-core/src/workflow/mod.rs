//! Workflow automation: condition evaluation and action execution
//! on domain events.

pub mod conditions;
pub mod engine;

pub use conditions::{evaluate, evaluate_all, resolve_path};
pub use engine::{render_template, WorkflowListener};
