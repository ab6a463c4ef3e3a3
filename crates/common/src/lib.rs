//! Shared types, config, and error definitions for quake-viz.

pub mod config;
pub mod duration;
pub mod error;
pub mod types;

pub use config::AppConfig;
pub use error::Error;
pub use types::*;

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, Error>;
