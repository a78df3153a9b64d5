//! # StudySync Types
//!
//! Shared data model for the StudySync offline-first sync engine.
//!
//! This crate provides:
//! - `Domain` for the three synchronized record collections
//! - `SyncableRecord` for presence-based replication
//! - `SyncConfig` / `SyncConfigUpdate` for persisted configuration
//! - `DomainSyncResult` for per-run reporting
//! - `SyncEvent` for external observers
//!
//! This is a pure data crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod domain;
mod event;
mod record;
mod result;

pub use config::{SyncConfig, SyncConfigUpdate, DEFAULT_SYNC_INTERVAL_MS};
pub use domain::Domain;
pub use event::SyncEvent;
pub use record::SyncableRecord;
pub use result::{DomainSyncResult, RecordFailure};
