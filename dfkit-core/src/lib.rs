//! dfkit core - errors, configuration, logging and flash message types
//!
//! This crate has no HTTP dependency; the axum integration lives in `dfkit-web`.

pub mod config;
pub mod error;
pub mod flash;
pub mod logging;

pub use config::*;
pub use error::*;
pub use flash::*;
pub use logging::*;

// Re-export commonly used external types
pub use tracing;
