//! Project service: keeps the progress rollup normalized on project writes
//! and unlinks tasks when a project goes away.

use color_eyre::Result;

use crate::cache::CacheStore;
use crate::model::Project;
use crate::remote::Gateway;
use crate::rollup::RollupManager;
use crate::service::EntityService;

pub struct ProjectService<C, G> {
  inner: EntityService<Project, C, G>,
  rollup: RollupManager<C, G>,
}

impl<C, G> Clone for ProjectService<C, G> {
  fn clone(&self) -> Self {
    Self {
      inner: self.inner.clone(),
      rollup: self.rollup.clone(),
    }
  }
}

impl<C: CacheStore, G: Gateway> ProjectService<C, G> {
  pub fn new(inner: EntityService<Project, C, G>, rollup: RollupManager<C, G>) -> Self {
    Self { inner, rollup }
  }

  pub async fn get_all(&self) -> Vec<Project> {
    self.inner.get_all().await
  }

  pub async fn get(&self, id: &str) -> Option<Project> {
    self.inner.get(id).await
  }

  pub fn cached(&self) -> Vec<Project> {
    self.inner.cached()
  }

  pub async fn create(&self, mut project: Project) -> Result<Project> {
    project.recompute_progress();
    self.inner.create(project).await
  }

  pub async fn update(&self, id: &str, apply: impl FnOnce(&mut Project)) -> Option<Project> {
    self
      .inner
      .update(id, |project| {
        apply(project);
        project.recompute_progress();
      })
      .await
  }

  /// Delete a project and clear `project_id` on every task that referenced
  /// it. The tasks themselves are kept (unlink, not cascade-delete).
  pub async fn delete(&self, id: &str) {
    self.inner.delete(id).await;
    self.rollup.project_deleted(id).await;
  }

  pub fn last_error(&self) -> Option<String> {
    self.inner.last_error()
  }

  pub fn clear_error(&self) {
    self.inner.clear_error()
  }
}
