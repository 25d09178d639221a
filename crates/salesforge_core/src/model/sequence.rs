//! Sequence and step domain model.
//!
//! # Responsibility
//! - Define the canonical outreach sequence record and its ordered steps.
//! - Define the patch shapes accepted by the update operations.
//! - Validate caller input before it reaches the store.
//!
//! # Invariants
//! - `id`, `created_at` and `updated_at` are store-assigned; values set by
//!   callers are ignored on create and overwritten with persisted ones.
//! - A step's `sequence_id` never changes after creation.
//! - `steps` is ordered by ascending step id once persisted.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Store-assigned sequence identity.
pub type SequenceId = i64;

/// Store-assigned step identity.
pub type StepId = i64;

/// Unix epoch milliseconds assigned by the store.
pub type Timestamp = i64;

/// Named outreach sequence with tracking flags and ordered steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sequence {
    pub id: SequenceId,
    pub name: String,
    pub open_tracking_enabled: bool,
    pub click_tracking_enabled: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub steps: Vec<Step>,
}

impl Sequence {
    /// Creates an unpersisted sequence; identity and timestamps stay zero
    /// until `SequenceStore::create_sequence` fills them in.
    pub fn new(
        name: impl Into<String>,
        open_tracking_enabled: bool,
        click_tracking_enabled: bool,
        steps: Vec<Step>,
    ) -> Self {
        Self {
            id: 0,
            name: name.into(),
            open_tracking_enabled,
            click_tracking_enabled,
            created_at: 0,
            updated_at: 0,
            steps,
        }
    }

    /// Checks caller-provided fields before creation.
    ///
    /// # Errors
    /// - `EmptyName` when `name` is empty.
    /// - `EmptyStepSubject` / `EmptyStepContent` with the offending index.
    pub fn validate(&self) -> Result<(), SequenceValidationError> {
        if self.name.is_empty() {
            return Err(SequenceValidationError::EmptyName);
        }
        for (index, step) in self.steps.iter().enumerate() {
            if step.subject.is_empty() {
                return Err(SequenceValidationError::EmptyStepSubject { index });
            }
            if step.content.is_empty() {
                return Err(SequenceValidationError::EmptyStepContent { index });
            }
        }
        Ok(())
    }
}

/// One subject/content unit owned by exactly one sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub id: StepId,
    /// Owning sequence. Not part of the JSON shape; the path carries it.
    #[serde(skip)]
    pub sequence_id: SequenceId,
    pub subject: String,
    pub content: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Step {
    /// Creates an unpersisted step for inclusion in a new sequence.
    pub fn new(subject: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: 0,
            sequence_id: 0,
            subject: subject.into(),
            content: content.into(),
            created_at: 0,
            updated_at: 0,
        }
    }
}

/// Flags-only patch for `SequenceStore::update_sequence`.
///
/// The sequence name is deliberately absent: it is fixed at creation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SequencePatch {
    pub open_tracking_enabled: bool,
    pub click_tracking_enabled: bool,
}

/// Read-back of a flags update, produced by the update statement itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatedSequence {
    pub id: SequenceId,
    pub open_tracking_enabled: bool,
    pub click_tracking_enabled: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Patch for `SequenceStore::update_step`.
///
/// `sequence_id` is an ownership check, not a new value: the update only
/// applies when the step belongs to that sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepPatch {
    pub sequence_id: SequenceId,
    pub subject: String,
    pub content: String,
}

impl StepPatch {
    pub fn validate(&self) -> Result<(), SequenceValidationError> {
        if self.subject.is_empty() {
            return Err(SequenceValidationError::EmptySubject);
        }
        if self.content.is_empty() {
            return Err(SequenceValidationError::EmptyContent);
        }
        Ok(())
    }
}

/// Caller input rejected before any store access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SequenceValidationError {
    EmptyName,
    EmptyStepSubject { index: usize },
    EmptyStepContent { index: usize },
    EmptySubject,
    EmptyContent,
}

impl Display for SequenceValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyName => write!(f, "name is required"),
            Self::EmptyStepSubject { index } => write!(f, "steps[{index}].subject is required"),
            Self::EmptyStepContent { index } => write!(f, "steps[{index}].content is required"),
            Self::EmptySubject => write!(f, "subject is required"),
            Self::EmptyContent => write!(f, "content is required"),
        }
    }
}

impl Error for SequenceValidationError {}
