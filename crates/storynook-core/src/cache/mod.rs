//! Cache-coherent repositories for remote entity collections.
//!
//! This module provides the generic `Repository` that every entity
//! collection in the app runs on. Data is cached in memory per scope and
//! considered stale once its per-repository ttl elapses.
//!
//! The pieces:
//! - `CachedCollection`: items plus a freshness stamp
//! - `Delta` / `Keyed`: optimistic local mutations
//! - `CollectionSource` / `Scope`: the remote seam repositories fetch
//!   through
//! - `Repository`: ties them together with in-flight fetch deduplication,
//!   rollback and watch-based observers
//! - `StoreError`: the failure taxonomy callers match on

pub mod collection;
pub mod delta;
pub mod error;
pub mod repository;
pub mod source;

pub use collection::{CachedCollection, Freshness};
pub use delta::{Delta, Keyed};
pub use error::StoreError;
pub use repository::{FailurePolicy, Repository};
pub use source::{CollectionSource, Scope};
