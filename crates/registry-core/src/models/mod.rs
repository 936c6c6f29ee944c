//! Data models for the registry
//!
//! Work items and deletion requests are owned by this system; institutions,
//! users, objects and files are read-only inputs.

mod alert;
mod catalog;
mod deletion_request;
mod work_item;

pub use alert::*;
pub use catalog::*;
pub use deletion_request::*;
pub use work_item::*;

#[cfg(test)]
pub(crate) use work_item::fixtures;
