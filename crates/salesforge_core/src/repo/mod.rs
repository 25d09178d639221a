//! Repository layer: the sequence store and its SQL helpers.
//!
//! # Responsibility
//! - Define the `SequenceStore` contract consumed by request handlers.
//! - Isolate SQLite query details from callers.
//!
//! # Invariants
//! - Store APIs report exactly two failure kinds: `NotFound` and `Storage`.
//! - Store APIs never retry; every failure surfaces immediately.

pub mod error;
pub mod query;
pub mod sequence_store;
