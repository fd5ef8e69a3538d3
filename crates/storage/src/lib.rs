//! Job store abstraction and implementations for genflow.
//!
//! This crate provides a trait-based store for state-point records with a
//! JSON file implementation and an in-memory one.

#![warn(missing_docs)]

pub mod trait_;
pub mod filter;
#[cfg(feature = "json")]
pub mod json_storage;
pub mod memory;

pub use trait_::{JobStore, StorageError, Result};
pub use filter::{Condition, RecordFilter};
#[cfg(feature = "json")]
pub use json_storage::JsonJobStore;
pub use memory::InMemoryJobStore;
