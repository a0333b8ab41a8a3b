//! Per-collection services with read-through/write-through caching.
//!
//! `EntityService` is the generic pattern, instantiated once per entity
//! kind. Tasks and projects get thin facades on top that keep the project
//! rollup (embedded task copies + progress) consistent on every write.

mod entity;
mod project;
mod task;

pub use entity::EntityService;
pub use project::ProjectService;
pub use task::TaskService;
