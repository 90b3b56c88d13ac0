//! Safeline daemon library
//!
//! This module provides the components of `safelined`:
//! - REST API handlers over the lifecycle engine
//! - Configuration and directory fixtures
//! - Server lifecycle management

pub mod api;
pub mod config;
pub mod error;
pub mod seed;
pub mod server;

pub use config::DaemonConfig;
pub use error::{ApiError, DaemonError};
pub use server::Server;
