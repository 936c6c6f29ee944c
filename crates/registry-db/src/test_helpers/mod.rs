//! In-memory stores and fixtures for tests
//!
//! `MemoryStore` implements every store trait over one shared state, so the
//! atomicity the PostgreSQL repositories get from transactions comes from a
//! single mutex here.

mod fixtures;
mod memory_store;

pub use fixtures::*;
pub use memory_store::MemoryStore;
