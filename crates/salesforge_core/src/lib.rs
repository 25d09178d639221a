//! Persistence core for outreach sequences.
//! This crate owns the storage invariants: atomic creation, step ownership
//! checks, step ordering and the not-found/storage-failure split.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;

pub use db::{open_db, open_db_in_memory, CancelGuard, DbError, DbResult};
pub use logging::{default_log_level, init_logging, logging_status, LogDestination};
pub use model::sequence::{
    Sequence, SequenceId, SequencePatch, SequenceValidationError, Step, StepId, StepPatch,
    Timestamp, UpdatedSequence,
};
pub use repo::error::{NotFoundTarget, RepoError, RepoResult};
pub use repo::sequence_store::{SequenceStore, SqliteSequenceStore};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
