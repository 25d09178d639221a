//! Two-kind error taxonomy for store operations.
//!
//! Every failure is either `NotFound` (the targeted row is absent or fails
//! its ownership check) or `Storage` (anything the backend reported, passed
//! through unchanged). Operations classify backend outcomes into one of the
//! two before returning.

use crate::db::DbError;
use crate::model::sequence::{SequenceId, StepId};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

/// Row an operation targeted when it reported `NotFound`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotFoundTarget {
    Sequence(SequenceId),
    /// A step looked up together with the sequence it must belong to.
    Step {
        step_id: StepId,
        sequence_id: SequenceId,
    },
}

impl Display for NotFoundTarget {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sequence(id) => write!(f, "sequence {id}"),
            Self::Step {
                step_id,
                sequence_id,
            } => write!(f, "step {step_id} of sequence {sequence_id}"),
        }
    }
}

#[derive(Debug)]
pub enum RepoError {
    NotFound(NotFoundTarget),
    Storage(DbError),
}

impl RepoError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(target) => write!(f, "{target} not found"),
            Self::Storage(err) => write!(f, "{err}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::NotFound(_) => None,
            Self::Storage(err) => Some(err),
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Storage(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Storage(DbError::Sqlite(value))
    }
}

/// Maps the driver's "no rows" outcome of a single-row query to `NotFound`.
pub(crate) trait NoRowsExt<T> {
    fn or_not_found(self, target: NotFoundTarget) -> RepoResult<T>;
}

impl<T> NoRowsExt<T> for rusqlite::Result<T> {
    fn or_not_found(self, target: NotFoundTarget) -> RepoResult<T> {
        match self {
            Ok(value) => Ok(value),
            Err(rusqlite::Error::QueryReturnedNoRows) => Err(RepoError::NotFound(target)),
            Err(err) => Err(err.into()),
        }
    }
}

/// DELETE never reports "no rows"; zero affected rows is the not-found case.
pub(crate) fn ensure_affected(changed: usize, target: NotFoundTarget) -> RepoResult<()> {
    if changed == 0 {
        return Err(RepoError::NotFound(target));
    }
    Ok(())
}
