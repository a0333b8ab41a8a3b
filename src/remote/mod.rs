//! Timeout-bounded client for the remote store.

mod gateway;

pub use gateway::{ApiResponse, Gateway, HttpGateway, SessionToken};
