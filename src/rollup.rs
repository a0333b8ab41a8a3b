//! Project rollup upkeep.
//!
//! Projects carry a denormalized copy of their tasks plus a completion
//! percentage. Both are re-established synchronously inside every task
//! write path, never lazily on read: after a task create/update the copy is
//! upserted into the owning project's embedded list (and dropped from any
//! project the task moved away from), after a task delete it is unlinked
//! from every project, and deleting a project clears `project_id` on the
//! tasks that referenced it. Each changed project is persisted through the
//! project service, whose own remote push runs independently of the task's.

use crate::cache::CacheStore;
use crate::model::{Project, Task};
use crate::remote::Gateway;
use crate::service::EntityService;

pub struct RollupManager<C, G> {
  tasks: EntityService<Task, C, G>,
  projects: EntityService<Project, C, G>,
}

impl<C, G> Clone for RollupManager<C, G> {
  fn clone(&self) -> Self {
    Self {
      tasks: self.tasks.clone(),
      projects: self.projects.clone(),
    }
  }
}

impl<C: CacheStore, G: Gateway> RollupManager<C, G> {
  pub fn new(tasks: EntityService<Task, C, G>, projects: EntityService<Project, C, G>) -> Self {
    Self { tasks, projects }
  }

  /// Reconcile project rollups after a task was created or updated.
  pub async fn task_saved(&self, task: &Task) {
    for project in self.projects.cached() {
      let belongs = task.project_id.as_deref() == Some(project.id.as_str());
      let embedded = project.tasks.iter().any(|t| t.id == task.id);

      if belongs {
        let copy = task.clone();
        let _ = self
          .projects
          .update(&project.id, move |p| {
            if let Some(slot) = p.tasks.iter_mut().find(|t| t.id == copy.id) {
              *slot = copy;
            } else {
              p.tasks.push(copy);
            }
            p.recompute_progress();
          })
          .await;
      } else if embedded {
        // Task moved to another project (or none); drop the stale copy
        let task_id = task.id.clone();
        let _ = self
          .projects
          .update(&project.id, move |p| {
            p.tasks.retain(|t| t.id != task_id);
            p.recompute_progress();
          })
          .await;
      }
    }
  }

  /// Unlink a deleted task from every project that embeds it.
  pub async fn task_deleted(&self, task_id: &str) {
    for project in self.projects.cached() {
      if project.tasks.iter().any(|t| t.id == task_id) {
        let task_id = task_id.to_string();
        let _ = self
          .projects
          .update(&project.id, move |p| {
            p.tasks.retain(|t| t.id != task_id);
            p.recompute_progress();
          })
          .await;
      }
    }
  }

  /// Clear `project_id` on every task that referenced a deleted project.
  ///
  /// Unlink, not cascade: the tasks themselves survive.
  pub async fn project_deleted(&self, project_id: &str) {
    for task in self.tasks.cached() {
      if task.project_id.as_deref() == Some(project_id) {
        let _ = self
          .tasks
          .update(&task.id, |t| {
            t.project_id = None;
          })
          .await;
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::SqliteCache;
  use crate::model::TaskStatus;
  use crate::testing::{service, MockGateway};
  use std::sync::Arc;

  fn fixture() -> (
    RollupManager<SqliteCache, MockGateway>,
    EntityService<Task, SqliteCache, MockGateway>,
    EntityService<Project, SqliteCache, MockGateway>,
  ) {
    let gateway = Arc::new(MockGateway::offline());
    let cache = Arc::new(SqliteCache::in_memory().unwrap());
    let tasks = service::<Task>(&cache, &gateway);
    let projects = service::<Project>(&cache, &gateway);
    (
      RollupManager::new(tasks.clone(), projects.clone()),
      tasks,
      projects,
    )
  }

  #[tokio::test]
  async fn test_task_saved_upserts_copy_and_progress() {
    let (rollup, tasks, projects) = fixture();
    let project = projects.create(Project::new("p")).await.unwrap();

    for i in 0..4 {
      let mut task = Task::new(format!("t{}", i));
      task.project_id = Some(project.id.clone());
      if i == 0 {
        task.status = TaskStatus::Completed;
      }
      let created = tasks.create(task).await.unwrap();
      rollup.task_saved(&created).await;
    }

    let cached = projects.cached();
    assert_eq!(cached[0].tasks.len(), 4);
    assert_eq!(cached[0].progress, 25);

    // Complete a second task
    let second = tasks.cached()[1].clone();
    let updated = tasks
      .update(&second.id, |t| t.status = TaskStatus::Completed)
      .await
      .unwrap();
    rollup.task_saved(&updated).await;

    assert_eq!(projects.cached()[0].progress, 50);
  }

  #[tokio::test]
  async fn test_task_moving_projects_leaves_old_rollup() {
    let (rollup, tasks, projects) = fixture();
    let first = projects.create(Project::new("p1")).await.unwrap();
    let second = projects.create(Project::new("p2")).await.unwrap();

    let mut task = Task::new("t");
    task.project_id = Some(first.id.clone());
    let task = tasks.create(task).await.unwrap();
    rollup.task_saved(&task).await;

    let moved = tasks
      .update(&task.id, |t| t.project_id = Some(second.id.clone()))
      .await
      .unwrap();
    rollup.task_saved(&moved).await;

    let cached = projects.cached();
    let p1 = cached.iter().find(|p| p.id == first.id).unwrap();
    let p2 = cached.iter().find(|p| p.id == second.id).unwrap();
    assert!(p1.tasks.is_empty());
    assert_eq!(p1.progress, 0);
    assert_eq!(p2.tasks.len(), 1);
  }

  #[tokio::test]
  async fn test_task_deleted_unlinks_and_recomputes() {
    let (rollup, tasks, projects) = fixture();
    let project = projects.create(Project::new("p")).await.unwrap();

    let mut done = Task::new("done");
    done.project_id = Some(project.id.clone());
    done.status = TaskStatus::Completed;
    let done = tasks.create(done).await.unwrap();
    rollup.task_saved(&done).await;

    let mut open = Task::new("open");
    open.project_id = Some(project.id.clone());
    let open = tasks.create(open).await.unwrap();
    rollup.task_saved(&open).await;

    assert_eq!(projects.cached()[0].progress, 50);

    rollup.task_deleted(&open.id).await;
    let cached = projects.cached();
    assert_eq!(cached[0].tasks.len(), 1);
    assert_eq!(cached[0].progress, 100);
  }

  #[tokio::test]
  async fn test_project_deleted_clears_weak_references() {
    let (rollup, tasks, projects) = fixture();
    let project = projects.create(Project::new("p")).await.unwrap();

    let mut task = Task::new("t");
    task.project_id = Some(project.id.clone());
    let task = tasks.create(task).await.unwrap();
    rollup.task_saved(&task).await;

    projects.delete(&project.id).await;
    rollup.project_deleted(&project.id).await;

    let cached = tasks.cached();
    assert_eq!(cached.len(), 1);
    assert!(cached[0].project_id.is_none());
  }
}
