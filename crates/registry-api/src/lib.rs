//! Registry API Library
//!
//! HTTP surface for the deletion approval, restoration and requeue
//! workflows, plus the startup wiring shared with the operator CLI.

mod api_doc;
mod handlers;
mod telemetry;

pub mod auth;
pub mod error;
pub mod setup;
pub mod state;

pub use api_doc::ApiDoc;
pub use error::{ErrorResponse, HttpAppError};
pub use state::AppState;
pub use telemetry::init_telemetry;
