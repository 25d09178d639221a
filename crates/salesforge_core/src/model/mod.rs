//! Domain model for outreach sequences.
//!
//! # Responsibility
//! - Define the data structures shared by the store and its callers.
//!
//! # Invariants
//! - Every sequence and step is identified by a store-assigned integer id.
//! - Steps are owned by exactly one sequence and never move between them.

pub mod sequence;
