//! Registry Core Library
//!
//! Domain models, the error taxonomy, configuration, and the pure parts of the
//! deletion and work item workflows: stage routing, requeue planning and the
//! confirmation token authority.

pub mod config;
pub mod error;
pub mod models;
pub mod requeue;
pub mod stages;
pub mod token;

// Re-export commonly used types
pub use config::{BaseConfig, Config, RegistryConfig};
pub use error::{AppError, BatchViolation, ErrorMetadata, LogLevel};
pub use token::{ConfirmationTokenAuthority, IssuedToken};

pub type AppResult<T> = Result<T, AppError>;
