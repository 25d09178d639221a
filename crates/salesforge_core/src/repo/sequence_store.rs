//! Sequence store contract and SQLite implementation.
//!
//! # Responsibility
//! - Persist sequences with their steps and expose fetch/update/delete.
//! - Classify every backend outcome as success, `NotFound` or `Storage`.
//!
//! # Invariants
//! - Create is all-or-nothing: the sequence row and all step rows commit in
//!   one transaction, or none of them persist.
//! - Step mutations match on step id *and* sequence id together.
//! - Fetched steps are ordered by ascending step id.
//! - Timestamps are written by SQL, never taken from the caller.

use crate::db::CancelGuard;
use crate::model::sequence::{
    Sequence, SequenceId, SequencePatch, Step, StepId, StepPatch, Timestamp, UpdatedSequence,
};
use crate::repo::error::{ensure_affected, NoRowsExt, NotFoundTarget, RepoResult};
use crate::repo::query::{Delete, Insert, Select, Update, BUMP_UPDATED_AT_SQL};
use log::{info, warn};
use rusqlite::types::Value;
use rusqlite::{Connection, Row, Transaction, TransactionBehavior};

const SEQUENCES_TABLE: &str = "sequences";
const STEPS_TABLE: &str = "steps";

const SEQUENCE_COLUMNS: &[&str] = &[
    "id",
    "name",
    "open_tracking_enabled",
    "click_tracking_enabled",
    "created_at",
    "updated_at",
];

const STEP_COLUMNS: &[&str] = &[
    "id",
    "sequence_id",
    "subject",
    "content",
    "created_at",
    "updated_at",
];

/// Persistence contract for sequences and their steps.
pub trait SequenceStore {
    /// Inserts `sequence` and its steps atomically, then writes the assigned
    /// ids and timestamps back into it. On error `sequence` is left untouched.
    fn create_sequence(&self, sequence: &mut Sequence) -> RepoResult<()>;

    /// Loads one sequence with its steps ordered by ascending step id.
    fn fetch_sequence(&self, id: SequenceId) -> RepoResult<Sequence>;

    /// Replaces both tracking flags and refreshes `updated_at`.
    fn update_sequence(&self, id: SequenceId, patch: &SequencePatch)
        -> RepoResult<UpdatedSequence>;

    /// Replaces subject/content of a step owned by `patch.sequence_id`.
    fn update_step(&self, id: StepId, patch: &StepPatch) -> RepoResult<Step>;

    /// Deletes a step owned by `sequence_id`.
    fn delete_step(&self, id: StepId, sequence_id: SequenceId) -> RepoResult<()>;
}

/// SQLite-backed sequence store over a borrowed, bootstrapped connection.
pub struct SqliteSequenceStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteSequenceStore<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    /// Returns an armed guard that interrupts this store's connection when
    /// dropped; disarm it once the operation has returned.
    pub fn cancel_guard(&self) -> CancelGuard {
        CancelGuard::for_connection(self.conn)
    }
}

struct CreatedSequence {
    id: SequenceId,
    created_at: Timestamp,
    updated_at: Timestamp,
    steps: Vec<Step>,
}

impl SequenceStore for SqliteSequenceStore<'_> {
    fn create_sequence(&self, sequence: &mut Sequence) -> RepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;

        let created = match insert_sequence_with_steps(&tx, sequence) {
            Ok(created) => created,
            Err(err) => {
                // Dropping `tx` uncommitted rolls back whatever was inserted.
                drop(tx);
                warn!(
                    "event=sequence_create module=repo status=rollback steps={} error={}",
                    sequence.steps.len(),
                    err
                );
                return Err(err);
            }
        };
        tx.commit()?;

        info!(
            "event=sequence_create module=repo status=ok sequence_id={} steps={}",
            created.id,
            created.steps.len()
        );

        sequence.id = created.id;
        sequence.created_at = created.created_at;
        sequence.updated_at = created.updated_at;
        sequence.steps = created.steps;
        Ok(())
    }

    fn fetch_sequence(&self, id: SequenceId) -> RepoResult<Sequence> {
        let query = Select::from_table(SEQUENCES_TABLE)
            .columns(SEQUENCE_COLUMNS)
            .where_eq("id", id)
            .build()?;
        let mut sequence = self
            .conn
            .prepare_cached(&query.sql)?
            .query_row(query.params(), parse_sequence_row)
            .or_not_found(NotFoundTarget::Sequence(id))?;

        let query = Select::from_table(STEPS_TABLE)
            .columns(STEP_COLUMNS)
            .where_eq("sequence_id", id)
            .order_by("id ASC")
            .build()?;
        let mut stmt = self.conn.prepare_cached(&query.sql)?;
        sequence.steps = stmt
            .query_map(query.params(), parse_step_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(sequence)
    }

    fn update_sequence(
        &self,
        id: SequenceId,
        patch: &SequencePatch,
    ) -> RepoResult<UpdatedSequence> {
        let query = Update::table(SEQUENCES_TABLE)
            .set("open_tracking_enabled", patch.open_tracking_enabled)
            .set("click_tracking_enabled", patch.click_tracking_enabled)
            .set_raw("updated_at", BUMP_UPDATED_AT_SQL)
            .where_eq("id", id)
            .returning(&[
                "id",
                "open_tracking_enabled",
                "click_tracking_enabled",
                "created_at",
                "updated_at",
            ])
            .build()?;

        self.conn
            .prepare_cached(&query.sql)?
            .query_row(query.params(), |row| {
                Ok(UpdatedSequence {
                    id: row.get("id")?,
                    open_tracking_enabled: row.get("open_tracking_enabled")?,
                    click_tracking_enabled: row.get("click_tracking_enabled")?,
                    created_at: row.get("created_at")?,
                    updated_at: row.get("updated_at")?,
                })
            })
            .or_not_found(NotFoundTarget::Sequence(id))
    }

    fn update_step(&self, id: StepId, patch: &StepPatch) -> RepoResult<Step> {
        let query = Update::table(STEPS_TABLE)
            .set("subject", patch.subject.clone())
            .set("content", patch.content.clone())
            .set_raw("updated_at", BUMP_UPDATED_AT_SQL)
            .where_eq("id", id)
            .where_eq("sequence_id", patch.sequence_id)
            .returning(STEP_COLUMNS)
            .build()?;

        self.conn
            .prepare_cached(&query.sql)?
            .query_row(query.params(), parse_step_row)
            .or_not_found(NotFoundTarget::Step {
                step_id: id,
                sequence_id: patch.sequence_id,
            })
    }

    fn delete_step(&self, id: StepId, sequence_id: SequenceId) -> RepoResult<()> {
        let query = Delete::from_table(STEPS_TABLE)
            .where_eq("id", id)
            .where_eq("sequence_id", sequence_id)
            .build()?;

        let changed = self
            .conn
            .prepare_cached(&query.sql)?
            .execute(query.params())?;

        ensure_affected(
            changed,
            NotFoundTarget::Step {
                step_id: id,
                sequence_id,
            },
        )
    }
}

fn insert_sequence_with_steps(
    tx: &Transaction<'_>,
    sequence: &Sequence,
) -> RepoResult<CreatedSequence> {
    let query = Insert::into_table(SEQUENCES_TABLE)
        .columns(&["name", "open_tracking_enabled", "click_tracking_enabled"])
        .values(vec![
            Value::Text(sequence.name.clone()),
            Value::from(sequence.open_tracking_enabled),
            Value::from(sequence.click_tracking_enabled),
        ])
        .returning(&["id", "created_at", "updated_at"])
        .build()?;

    let (id, created_at, updated_at) = tx.query_row(&query.sql, query.params(), |row| {
        Ok((
            row.get::<_, SequenceId>("id")?,
            row.get::<_, Timestamp>("created_at")?,
            row.get::<_, Timestamp>("updated_at")?,
        ))
    })?;

    let steps = if sequence.steps.is_empty() {
        Vec::new()
    } else {
        insert_steps(tx, id, &sequence.steps)?
    };

    Ok(CreatedSequence {
        id,
        created_at,
        updated_at,
        steps,
    })
}

/// One multi-row insert for all steps of a new sequence.
///
/// SQLite does not guarantee `RETURNING` row order, so rows are sorted by id;
/// ids are monotonic with insertion, which restores input order.
fn insert_steps(
    tx: &Transaction<'_>,
    sequence_id: SequenceId,
    steps: &[Step],
) -> RepoResult<Vec<Step>> {
    let query = steps
        .iter()
        .fold(
            Insert::into_table(STEPS_TABLE).columns(&["sequence_id", "subject", "content"]),
            |insert, step| {
                insert.values(vec![
                    Value::Integer(sequence_id),
                    Value::Text(step.subject.clone()),
                    Value::Text(step.content.clone()),
                ])
            },
        )
        .returning(STEP_COLUMNS)
        .build()?;

    let mut stmt = tx.prepare(&query.sql)?;
    let mut inserted = stmt
        .query_map(query.params(), parse_step_row)?
        .collect::<Result<Vec<_>, _>>()?;
    inserted.sort_by_key(|step| step.id);
    Ok(inserted)
}

fn parse_sequence_row(row: &Row<'_>) -> rusqlite::Result<Sequence> {
    Ok(Sequence {
        id: row.get("id")?,
        name: row.get("name")?,
        open_tracking_enabled: row.get("open_tracking_enabled")?,
        click_tracking_enabled: row.get("click_tracking_enabled")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
        steps: Vec::new(),
    })
}

fn parse_step_row(row: &Row<'_>) -> rusqlite::Result<Step> {
    Ok(Step {
        id: row.get("id")?,
        sequence_id: row.get("sequence_id")?,
        subject: row.get("subject")?,
        content: row.get("content")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
