//! Entity types shared with the remote store.
//!
//! Every collection is serialized with camelCase field names to match the
//! remote wire format. Ids are strings: remote-assigned when online,
//! locally generated (uuid v4) when the store is unreachable.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// Trait for records managed by an `EntityService`.
///
/// Implementors share the base shape: a string `id` plus `createdAt` /
/// `updatedAt` timestamps, owned by a named collection.
pub trait Entity: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
  /// Collection name, used as remote path segment and local cache key
  fn collection() -> &'static str;

  fn id(&self) -> &str;

  fn id_mut(&mut self) -> &mut String;

  fn stamp_created(&mut self, at: DateTime<Utc>);

  fn stamp_updated(&mut self, at: DateTime<Utc>);

  /// Required-field checks, run before any network call
  fn validate(&self) -> Result<()>;
}

macro_rules! entity_impl {
  ($ty:ty, $collection:literal, $label:literal) => {
    impl Entity for $ty {
      fn collection() -> &'static str {
        $collection
      }

      fn id(&self) -> &str {
        &self.id
      }

      fn id_mut(&mut self) -> &mut String {
        &mut self.id
      }

      fn stamp_created(&mut self, at: DateTime<Utc>) {
        self.created_at = at;
      }

      fn stamp_updated(&mut self, at: DateTime<Utc>) {
        self.updated_at = at;
      }

      fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
          return Err(eyre!(concat!($label, " title cannot be empty")));
        }
        Ok(())
      }
    }
  };
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
  #[default]
  Todo,
  InProgress,
  Completed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
  Low,
  #[default]
  Medium,
  High,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
  #[default]
  Active,
  Completed,
  OnHold,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HabitFrequency {
  #[default]
  Daily,
  Weekly,
  Monthly,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
  pub id: String,
  pub title: String,
  pub status: TaskStatus,
  pub priority: Priority,
  pub due_date: Option<DateTime<Utc>>,
  /// Weak reference to an owning project, not ownership
  pub project_id: Option<String>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl Task {
  pub fn new(title: impl Into<String>) -> Self {
    let now = Utc::now();
    Self {
      id: String::new(),
      title: title.into(),
      status: TaskStatus::default(),
      priority: Priority::default(),
      due_date: None,
      project_id: None,
      created_at: now,
      updated_at: now,
    }
  }
}

/// A project with its denormalized task copies.
///
/// `tasks` holds copies of the tasks whose `project_id` points here; the
/// global task collection stays the source of truth for live fields. The
/// two views are reconciled on every task write (see `rollup`), not on read.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
  pub id: String,
  pub title: String,
  pub status: ProjectStatus,
  pub priority: Priority,
  #[serde(default)]
  pub tasks: Vec<Task>,
  /// Completion percentage, 0-100
  #[serde(default)]
  pub progress: u8,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl Project {
  pub fn new(title: impl Into<String>) -> Self {
    let now = Utc::now();
    Self {
      id: String::new(),
      title: title.into(),
      status: ProjectStatus::default(),
      priority: Priority::default(),
      tasks: Vec::new(),
      progress: 0,
      created_at: now,
      updated_at: now,
    }
  }

  /// Re-derive `progress` from the embedded task list.
  pub fn recompute_progress(&mut self) {
    self.progress = completion_percent(&self.tasks);
  }
}

/// Percentage of completed tasks, rounded; 0 for an empty list.
pub fn completion_percent(tasks: &[Task]) -> u8 {
  if tasks.is_empty() {
    return 0;
  }
  let done = tasks
    .iter()
    .filter(|t| t.status == TaskStatus::Completed)
    .count();
  ((done as f64 / tasks.len() as f64) * 100.0).round() as u8
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
  pub id: String,
  pub title: String,
  pub date: DateTime<Utc>,
  pub location: Option<String>,
  pub notes: Option<String>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl Event {
  pub fn new(title: impl Into<String>, date: DateTime<Utc>) -> Self {
    let now = Utc::now();
    Self {
      id: String::new(),
      title: title.into(),
      date,
      location: None,
      notes: None,
      created_at: now,
      updated_at: now,
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
  pub id: String,
  pub title: String,
  pub content: String,
  #[serde(default)]
  pub tags: Vec<String>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl Note {
  pub fn new(title: impl Into<String>) -> Self {
    let now = Utc::now();
    Self {
      id: String::new(),
      title: title.into(),
      content: String::new(),
      tags: Vec::new(),
      created_at: now,
      updated_at: now,
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Goal {
  pub id: String,
  pub title: String,
  pub description: Option<String>,
  pub target_date: Option<DateTime<Utc>>,
  #[serde(default)]
  pub completed: bool,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl Goal {
  pub fn new(title: impl Into<String>) -> Self {
    let now = Utc::now();
    Self {
      id: String::new(),
      title: title.into(),
      description: None,
      target_date: None,
      completed: false,
      created_at: now,
      updated_at: now,
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Habit {
  pub id: String,
  pub title: String,
  pub frequency: HabitFrequency,
  #[serde(default)]
  pub streak: u32,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl Habit {
  pub fn new(title: impl Into<String>) -> Self {
    let now = Utc::now();
    Self {
      id: String::new(),
      title: title.into(),
      frequency: HabitFrequency::default(),
      streak: 0,
      created_at: now,
      updated_at: now,
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeEntry {
  pub id: String,
  pub title: String,
  /// Weak reference to the task the time was spent on
  pub task_id: Option<String>,
  pub started_at: DateTime<Utc>,
  #[serde(default)]
  pub duration_minutes: u32,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl TimeEntry {
  pub fn new(title: impl Into<String>) -> Self {
    let now = Utc::now();
    Self {
      id: String::new(),
      title: title.into(),
      task_id: None,
      started_at: now,
      duration_minutes: 0,
      created_at: now,
      updated_at: now,
    }
  }
}

entity_impl!(Task, "tasks", "Task");
entity_impl!(Project, "projects", "Project");
entity_impl!(Event, "events", "Event");
entity_impl!(Note, "notes", "Note");
entity_impl!(Goal, "goals", "Goal");
entity_impl!(Habit, "habits", "Habit");
entity_impl!(TimeEntry, "time_tracking", "Time entry");

#[cfg(test)]
mod tests {
  use super::*;

  fn task_with_status(status: TaskStatus) -> Task {
    let mut t = Task::new("t");
    t.status = status;
    t
  }

  #[test]
  fn test_completion_percent_empty() {
    assert_eq!(completion_percent(&[]), 0);
  }

  #[test]
  fn test_completion_percent_rounds() {
    // 1 of 3 completed -> 33.33 rounds to 33
    let tasks = vec![
      task_with_status(TaskStatus::Completed),
      task_with_status(TaskStatus::Todo),
      task_with_status(TaskStatus::InProgress),
    ];
    assert_eq!(completion_percent(&tasks), 33);

    // 2 of 3 completed -> 66.67 rounds to 67
    let tasks = vec![
      task_with_status(TaskStatus::Completed),
      task_with_status(TaskStatus::Completed),
      task_with_status(TaskStatus::Todo),
    ];
    assert_eq!(completion_percent(&tasks), 67);
  }

  #[test]
  fn test_validate_rejects_blank_title() {
    let task = Task::new("   ");
    assert!(task.validate().is_err());
    assert!(Task::new("water the plants").validate().is_ok());
  }

  #[test]
  fn test_wire_shape_is_camel_case() {
    let task = Task::new("x");
    let value = serde_json::to_value(&task).unwrap();
    assert!(value.get("createdAt").is_some());
    assert!(value.get("projectId").is_some());
    assert_eq!(value["status"], "todo");
  }
}
