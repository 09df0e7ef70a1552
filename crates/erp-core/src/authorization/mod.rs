//! Permission catalog, actors and resource policies.

pub mod actor;
pub mod catalog;
pub mod policy;

pub use actor::Actor;
pub use catalog::{permission_matches, PermissionDef, PERMISSIONS};
pub use policy::{Ability, ResourcePolicy, UserPolicy};
