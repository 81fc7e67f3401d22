//! HTTP API: trigger endpoint, admin job endpoints, configuration.

pub mod app;
pub mod config;
pub mod context;
pub mod middleware;
