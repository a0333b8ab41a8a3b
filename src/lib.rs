//! Offline-first local cache and sync layer for a personal productivity app.
//!
//! Sits between the UI and the remote store: reads are served from a
//! durable local cache when the remote is unreachable, writes land in the
//! cache optimistically before the remote call resolves, bursts of edits
//! coalesce into one debounced background push, local writes are announced
//! to sibling contexts through a shared change signal, and every task write
//! re-establishes the owning project's denormalized rollup.
//!
//! Entry point is [`Services`], built from a [`Config`]:
//!
//! ```no_run
//! use tasksync::{Config, Services};
//!
//! # async fn run() -> color_eyre::Result<()> {
//! let config = Config::load(None)?;
//! let services = Services::open(&config)?;
//! let _watcher = services.watch_remote_changes();
//!
//! let tasks = services.tasks.get_all().await;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod coalescer;
pub mod config;
pub mod logging;
pub mod model;
pub mod remote;
pub mod rollup;
pub mod service;
pub mod services;
pub mod signal;

#[cfg(test)]
pub(crate) mod testing;

pub use cache::{CacheStore, SqliteCache};
pub use coalescer::SyncCoalescer;
pub use config::Config;
pub use model::{Entity, Event, Goal, Habit, Note, Project, Task, TimeEntry};
pub use remote::{ApiResponse, Gateway, HttpGateway, SessionToken};
pub use rollup::RollupManager;
pub use service::{EntityService, ProjectService, TaskService};
pub use services::Services;
pub use signal::ChangeSignal;
