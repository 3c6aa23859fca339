//! Service plumbing shared by every route module: errors, state, configuration, database,
//! tracing bootstrap and request middleware.

pub mod aliases;
pub mod app_error;
pub mod app_state;
pub mod bootstrap;
pub mod config;
pub mod db;
pub mod middleware;
pub mod swagger;
