//! Construction of the full service graph.
//!
//! Services are explicit instances wired with their dependencies (cache
//! handle, gateway handle, coalescer, signal) and passed by reference; there
//! are no ambient singletons, so tests can stand up isolated graphs.

use color_eyre::Result;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::cache::{CacheStore, SqliteCache};
use crate::coalescer::SyncCoalescer;
use crate::config::Config;
use crate::model::{Event, Goal, Habit, Note, Project, Task, TimeEntry};
use crate::remote::{Gateway, HttpGateway, SessionToken};
use crate::rollup::RollupManager;
use crate::service::{EntityService, ProjectService, TaskService};
use crate::signal::ChangeSignal;

/// Every collection the layer manages, in signal-watch order.
pub const COLLECTIONS: [&str; 7] = [
  "tasks",
  "projects",
  "events",
  "notes",
  "goals",
  "habits",
  "time_tracking",
];

pub struct Services<C, G> {
  pub tasks: TaskService<C, G>,
  pub projects: ProjectService<C, G>,
  pub events: EntityService<Event, C, G>,
  pub notes: EntityService<Note, C, G>,
  pub goals: EntityService<Goal, C, G>,
  pub habits: EntityService<Habit, C, G>,
  pub time_tracking: EntityService<TimeEntry, C, G>,
  gateway: Arc<G>,
  coalescer: SyncCoalescer<G>,
  signal: ChangeSignal<C>,
}

impl<C, G> Clone for Services<C, G> {
  fn clone(&self) -> Self {
    Self {
      tasks: self.tasks.clone(),
      projects: self.projects.clone(),
      events: self.events.clone(),
      notes: self.notes.clone(),
      goals: self.goals.clone(),
      habits: self.habits.clone(),
      time_tracking: self.time_tracking.clone(),
      gateway: Arc::clone(&self.gateway),
      coalescer: self.coalescer.clone(),
      signal: self.signal.clone(),
    }
  }
}

impl Services<SqliteCache, HttpGateway> {
  /// Open the default production graph: sqlite cache + HTTP gateway.
  pub fn open(config: &Config) -> Result<Self> {
    let cache = match &config.cache.path {
      Some(path) => SqliteCache::open_at(path)?,
      None => SqliteCache::open()?,
    };
    let token: SessionToken = Arc::new(RwLock::new(Config::api_token()));
    let gateway = HttpGateway::new(&config.remote, token)?;

    Ok(Self::with_parts(Arc::new(cache), Arc::new(gateway), config))
  }

  /// Handle to the shared bearer credential, for the session collaborator.
  pub fn session(&self) -> SessionToken {
    self.gateway.session()
  }
}

impl<C: CacheStore, G: Gateway> Services<C, G> {
  /// Build the graph from explicit cache and gateway handles.
  pub fn with_parts(cache: Arc<C>, gateway: Arc<G>, config: &Config) -> Self {
    let coalescer = SyncCoalescer::new(
      Arc::clone(&gateway),
      Duration::from_millis(config.sync.debounce_ms),
    );
    let signal = ChangeSignal::new(
      Arc::clone(&cache),
      Duration::from_millis(config.sync.signal_poll_ms),
    );

    let tasks_inner =
      EntityService::<Task, C, G>::new(cache.clone(), gateway.clone(), coalescer.clone(), signal.clone());
    let projects_inner = EntityService::<Project, C, G>::new(
      cache.clone(),
      gateway.clone(),
      coalescer.clone(),
      signal.clone(),
    );
    let rollup = RollupManager::new(tasks_inner.clone(), projects_inner.clone());

    Self {
      tasks: TaskService::new(tasks_inner, rollup.clone()),
      projects: ProjectService::new(projects_inner, rollup),
      events: EntityService::new(cache.clone(), gateway.clone(), coalescer.clone(), signal.clone()),
      notes: EntityService::new(cache.clone(), gateway.clone(), coalescer.clone(), signal.clone()),
      goals: EntityService::new(cache.clone(), gateway.clone(), coalescer.clone(), signal.clone()),
      habits: EntityService::new(cache.clone(), gateway.clone(), coalescer.clone(), signal.clone()),
      time_tracking: EntityService::new(cache, gateway.clone(), coalescer.clone(), signal.clone()),
      gateway,
      coalescer,
      signal,
    }
  }

  pub fn signal(&self) -> &ChangeSignal<C> {
    &self.signal
  }

  pub fn coalescer(&self) -> &SyncCoalescer<G> {
    &self.coalescer
  }

  /// React to change signals from sibling contexts by reloading the named
  /// collection. Runs until the returned handle is aborted or dropped along
  /// with the graph.
  pub fn watch_remote_changes(&self) -> JoinHandle<()> {
    let mut rx = self.signal.subscribe(&COLLECTIONS);
    let services = self.clone();
    tokio::spawn(async move {
      while let Some(collection) = rx.recv().await {
        services.reload(&collection).await;
      }
    })
  }

  async fn reload(&self, collection: &str) {
    match collection {
      "tasks" => {
        self.tasks.get_all().await;
      }
      "projects" => {
        self.projects.get_all().await;
      }
      "events" => {
        self.events.get_all().await;
      }
      "notes" => {
        self.notes.get_all().await;
      }
      "goals" => {
        self.goals.get_all().await;
      }
      "habits" => {
        self.habits.get_all().await;
      }
      "time_tracking" => {
        self.time_tracking.get_all().await;
      }
      _ => {}
    }
  }
}
