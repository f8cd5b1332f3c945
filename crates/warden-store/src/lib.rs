//! Durable fact and fingerprint storage for warden.
//!
//! This crate provides the single source of truth the reconciliation engine
//! works against:
//! - A [`KvStore`] trait with file-backed and in-memory implementations
//! - A [`FactStore`] exposing typed accessors over the kv store
//! - Change detection: fingerprint comparison of fact values and template
//!   digests across convergence passes

mod detect;
mod error;
mod facts;
mod kv;

pub use error::StoreError;
pub use facts::{FactStore, TargetJob};
pub use kv::{FileKv, KvStore, MemoryKv};
