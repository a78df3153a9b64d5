//! # StudySync State
//!
//! Durable sync-state persistence for StudySync.
//!
//! This crate provides:
//! - `StateBackend` trait over keyed durable storage
//! - `MemoryBackend` for tests and ephemeral use
//! - `FileBackend` with atomic write-then-rename semantics
//! - `SyncStateStore` holding `SyncConfig` and `last_sync_at`
//!
//! ## Durability
//!
//! `SyncStateStore::save_config` persists the full merged configuration
//! before returning; callers may assume durability on return. The in-memory
//! copy is only updated after the backend write succeeds.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;
mod store;

pub use backend::StateBackend;
pub use error::{StateError, StateResult};
pub use file::FileBackend;
pub use memory::MemoryBackend;
pub use store::SyncStateStore;
