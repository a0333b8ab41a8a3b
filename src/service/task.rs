//! Task service: the generic entity service plus rollup upkeep.
//!
//! Every write re-establishes the owning project's embedded task list and
//! progress before returning, so the aggregate invariant holds at the end
//! of each operation.

use color_eyre::Result;

use crate::cache::CacheStore;
use crate::model::Task;
use crate::remote::Gateway;
use crate::rollup::RollupManager;
use crate::service::EntityService;

pub struct TaskService<C, G> {
  inner: EntityService<Task, C, G>,
  rollup: RollupManager<C, G>,
}

impl<C, G> Clone for TaskService<C, G> {
  fn clone(&self) -> Self {
    Self {
      inner: self.inner.clone(),
      rollup: self.rollup.clone(),
    }
  }
}

impl<C: CacheStore, G: Gateway> TaskService<C, G> {
  pub fn new(inner: EntityService<Task, C, G>, rollup: RollupManager<C, G>) -> Self {
    Self { inner, rollup }
  }

  pub async fn get_all(&self) -> Vec<Task> {
    self.inner.get_all().await
  }

  pub async fn get(&self, id: &str) -> Option<Task> {
    self.inner.get(id).await
  }

  pub fn cached(&self) -> Vec<Task> {
    self.inner.cached()
  }

  pub async fn create(&self, task: Task) -> Result<Task> {
    let created = self.inner.create(task).await?;
    self.rollup.task_saved(&created).await;
    Ok(created)
  }

  pub async fn update(&self, id: &str, apply: impl FnOnce(&mut Task)) -> Option<Task> {
    let updated = self.inner.update(id, apply).await?;
    self.rollup.task_saved(&updated).await;
    Some(updated)
  }

  pub async fn delete(&self, id: &str) {
    // Unlink from projects before the task's own deletion
    self.rollup.task_deleted(id).await;
    self.inner.delete(id).await;
  }

  pub fn last_error(&self) -> Option<String> {
    self.inner.last_error()
  }

  pub fn clear_error(&self) {
    self.inner.clear_error()
  }
}
