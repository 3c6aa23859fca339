pub mod calendar;
pub mod common;
pub mod models;
pub mod permissions;
pub mod pricing;
pub mod printing;
pub mod routes;
pub mod schema;
pub mod services;
