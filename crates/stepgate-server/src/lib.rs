//! # stepgate-server
//!
//! HTTP server for the stepgate step-up verification service: configuration
//! loading, tracing bootstrap, and router assembly around
//! [`stepgate_engine`].

pub mod config;
pub mod observability;
pub mod server;

pub use config::{DEFAULT_CONFIG_PATH, ListenConfig, LoggingConfig, ServerConfig, load_config};
pub use server::{App, build_router};
