//! Sourcing Core - Core data structures and trait definitions
//!
//! Defines the session data model, the error taxonomy, configuration and
//! logging shared by every crate of the sourcing client

pub mod config;
pub mod error;
pub mod logging;
pub mod traits;
pub mod types;

pub use config::*;
pub use error::*;
pub use logging::*;
pub use traits::*;
pub use types::*;

// Re-export commonly used external types
pub use tracing;
