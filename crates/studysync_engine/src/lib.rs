//! # StudySync Engine
//!
//! Offline-first reconciliation engine and sync scheduler for StudySync.
//!
//! This crate provides:
//! - `LocalStore` / `RemoteClient` seams for the three record domains
//! - `ReconciliationEngine` computing and applying presence-based deltas
//! - `SyncScheduler` funnelling timer, connectivity, and manual triggers
//!   into a single guarded run
//! - `FailureGovernor` classifying failures and pausing on auth errors
//!
//! ## Architecture
//!
//! Reconciliation is **presence-based**: for each domain the engine snapshots
//! the local and remote record sets, uploads records missing remotely, and
//! downloads records missing locally, comparing by record id only. A record
//! present on both sides is considered synced and is never re-examined.
//!
//! All trigger sources share one guarded entry point; an atomic
//! compare-and-swap ensures at most one run is active per scheduler instance.
//! Failures are recovered at the smallest possible scope: one bad record
//! never aborts its batch, and one bad domain never blocks the others.
//!
//! ## Key Invariants
//!
//! - At most one reconciliation run active at a time
//! - Presence snapshots are taken before any mutation for a domain
//! - An auth failure pauses automatic runs until `resume()` is called
//! - Manual `sync_now()` stays available while paused

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod governor;
mod reconcile;
mod scheduler;
mod store;

pub use error::{SyncError, SyncResult};
pub use governor::{ErrorKind, FailureGovernor};
pub use reconcile::ReconciliationEngine;
pub use scheduler::{SchedulerState, SyncScheduler};
pub use store::{
    Clock, LocalStore, ManualClock, MemoryLocalStore, MemoryRemoteClient, RemoteClient,
    SystemClock,
};
