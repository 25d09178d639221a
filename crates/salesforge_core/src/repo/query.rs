//! Parameterized SQL assembly for store statements.
//!
//! # Responsibility
//! - Build INSERT/UPDATE/SELECT/DELETE statements with bind values collected
//!   alongside the SQL text.
//! - Keep a single placeholder style: numbered `?N` in bind order.
//!
//! # Invariants
//! - Table, column and raw-expression strings are `&'static str`; caller data
//!   only ever reaches SQL through bind values.
//! - A multi-row insert must supply exactly one value per column per row.

use crate::db::{DbError, DbResult};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, ParamsFromIter};

/// Current time as Unix epoch milliseconds, evaluated by SQLite. The schema
/// column defaults in `0001_init.sql` use the same expression.
macro_rules! now_ms_sql {
    () => {
        "CAST(ROUND((julianday('now') - 2440587.5) * 86400000.0) AS INTEGER)"
    };
}

/// Refreshed `updated_at`: the current time, but always past the stored value
/// so two writes within one millisecond still move it forward.
pub const BUMP_UPDATED_AT_SQL: &str = concat!("MAX(updated_at + 1, ", now_ms_sql!(), ")");

/// Finished statement: SQL text plus values in placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltQuery {
    pub sql: String,
    pub values: Vec<Value>,
}

impl BuiltQuery {
    pub fn params(&self) -> ParamsFromIter<std::slice::Iter<'_, Value>> {
        params_from_iter(self.values.iter())
    }
}

#[derive(Debug, Default)]
struct Binds {
    values: Vec<Value>,
}

impl Binds {
    fn push(&mut self, value: Value) -> String {
        self.values.push(value);
        format!("?{}", self.values.len())
    }
}

/// Equality conditions joined with `AND`.
#[derive(Debug, Default)]
struct Conditions {
    items: Vec<(&'static str, Value)>,
}

impl Conditions {
    fn push(&mut self, column: &'static str, value: Value) {
        self.items.push((column, value));
    }

    fn render(self, sql: &mut String, binds: &mut Binds) {
        for (position, (column, value)) in self.items.into_iter().enumerate() {
            sql.push_str(if position == 0 { " WHERE " } else { " AND " });
            sql.push_str(column);
            sql.push_str(" = ");
            sql.push_str(&binds.push(value));
        }
    }
}

fn render_returning(sql: &mut String, columns: &[&'static str]) {
    if !columns.is_empty() {
        sql.push_str(" RETURNING ");
        sql.push_str(&columns.join(", "));
    }
}

/// `INSERT INTO … VALUES (…), (…) [RETURNING …]`.
#[derive(Debug)]
pub struct Insert {
    table: &'static str,
    columns: Vec<&'static str>,
    rows: Vec<Vec<Value>>,
    returning: Vec<&'static str>,
}

impl Insert {
    pub fn into_table(table: &'static str) -> Self {
        Self {
            table,
            columns: Vec::new(),
            rows: Vec::new(),
            returning: Vec::new(),
        }
    }

    pub fn columns(mut self, columns: &[&'static str]) -> Self {
        self.columns = columns.to_vec();
        self
    }

    /// Appends one row; call repeatedly for a multi-row insert.
    pub fn values(mut self, row: Vec<Value>) -> Self {
        self.rows.push(row);
        self
    }

    pub fn returning(mut self, columns: &[&'static str]) -> Self {
        self.returning = columns.to_vec();
        self
    }

    pub fn build(self) -> DbResult<BuiltQuery> {
        if self.columns.is_empty() {
            return Err(DbError::InvalidQuery(format!(
                "insert into {} has no columns",
                self.table
            )));
        }
        if self.rows.is_empty() {
            return Err(DbError::InvalidQuery(format!(
                "insert into {} has no rows",
                self.table
            )));
        }

        let mut binds = Binds::default();
        let mut tuples = Vec::with_capacity(self.rows.len());
        for (index, row) in self.rows.into_iter().enumerate() {
            if row.len() != self.columns.len() {
                return Err(DbError::InvalidQuery(format!(
                    "insert into {} row {index} has {} values for {} columns",
                    self.table,
                    row.len(),
                    self.columns.len()
                )));
            }
            let placeholders = row
                .into_iter()
                .map(|value| binds.push(value))
                .collect::<Vec<_>>();
            tuples.push(format!("({})", placeholders.join(", ")));
        }

        let mut sql = format!(
            "INSERT INTO {} ({}) VALUES {}",
            self.table,
            self.columns.join(", "),
            tuples.join(", ")
        );
        render_returning(&mut sql, &self.returning);

        Ok(BuiltQuery {
            sql,
            values: binds.values,
        })
    }
}

#[derive(Debug)]
enum Assignment {
    Bind(&'static str, Value),
    Raw(&'static str, &'static str),
}

/// `UPDATE … SET … WHERE … [RETURNING …]`.
#[derive(Debug)]
pub struct Update {
    table: &'static str,
    assignments: Vec<Assignment>,
    conditions: Conditions,
    returning: Vec<&'static str>,
}

impl Update {
    pub fn table(table: &'static str) -> Self {
        Self {
            table,
            assignments: Vec::new(),
            conditions: Conditions::default(),
            returning: Vec::new(),
        }
    }

    pub fn set(mut self, column: &'static str, value: impl Into<Value>) -> Self {
        self.assignments.push(Assignment::Bind(column, value.into()));
        self
    }

    /// Assigns a SQL expression evaluated by the backend.
    pub fn set_raw(mut self, column: &'static str, expression: &'static str) -> Self {
        self.assignments.push(Assignment::Raw(column, expression));
        self
    }

    pub fn where_eq(mut self, column: &'static str, value: impl Into<Value>) -> Self {
        self.conditions.push(column, value.into());
        self
    }

    pub fn returning(mut self, columns: &[&'static str]) -> Self {
        self.returning = columns.to_vec();
        self
    }

    pub fn build(self) -> DbResult<BuiltQuery> {
        if self.assignments.is_empty() {
            return Err(DbError::InvalidQuery(format!(
                "update of {} sets no columns",
                self.table
            )));
        }

        let mut binds = Binds::default();
        let assignments = self
            .assignments
            .into_iter()
            .map(|assignment| match assignment {
                Assignment::Bind(column, value) => format!("{column} = {}", binds.push(value)),
                Assignment::Raw(column, expression) => format!("{column} = {expression}"),
            })
            .collect::<Vec<_>>();

        let mut sql = format!("UPDATE {} SET {}", self.table, assignments.join(", "));
        self.conditions.render(&mut sql, &mut binds);
        render_returning(&mut sql, &self.returning);

        Ok(BuiltQuery {
            sql,
            values: binds.values,
        })
    }
}

/// `SELECT … FROM … WHERE … [ORDER BY …]`.
#[derive(Debug)]
pub struct Select {
    table: &'static str,
    columns: Vec<&'static str>,
    conditions: Conditions,
    order_by: Option<&'static str>,
}

impl Select {
    pub fn from_table(table: &'static str) -> Self {
        Self {
            table,
            columns: Vec::new(),
            conditions: Conditions::default(),
            order_by: None,
        }
    }

    pub fn columns(mut self, columns: &[&'static str]) -> Self {
        self.columns = columns.to_vec();
        self
    }

    pub fn where_eq(mut self, column: &'static str, value: impl Into<Value>) -> Self {
        self.conditions.push(column, value.into());
        self
    }

    pub fn order_by(mut self, clause: &'static str) -> Self {
        self.order_by = Some(clause);
        self
    }

    pub fn build(self) -> DbResult<BuiltQuery> {
        if self.columns.is_empty() {
            return Err(DbError::InvalidQuery(format!(
                "select from {} has no columns",
                self.table
            )));
        }

        let mut binds = Binds::default();
        let mut sql = format!("SELECT {} FROM {}", self.columns.join(", "), self.table);
        self.conditions.render(&mut sql, &mut binds);
        if let Some(clause) = self.order_by {
            sql.push_str(" ORDER BY ");
            sql.push_str(clause);
        }

        Ok(BuiltQuery {
            sql,
            values: binds.values,
        })
    }
}

/// `DELETE FROM … WHERE …`.
#[derive(Debug)]
pub struct Delete {
    table: &'static str,
    conditions: Conditions,
}

impl Delete {
    pub fn from_table(table: &'static str) -> Self {
        Self {
            table,
            conditions: Conditions::default(),
        }
    }

    pub fn where_eq(mut self, column: &'static str, value: impl Into<Value>) -> Self {
        self.conditions.push(column, value.into());
        self
    }

    /// Refuses to build an unconditional delete.
    pub fn build(self) -> DbResult<BuiltQuery> {
        if self.conditions.items.is_empty() {
            return Err(DbError::InvalidQuery(format!(
                "delete from {} has no conditions",
                self.table
            )));
        }

        let mut binds = Binds::default();
        let mut sql = format!("DELETE FROM {}", self.table);
        self.conditions.render(&mut sql, &mut binds);

        Ok(BuiltQuery {
            sql,
            values: binds.values,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{Delete, Insert, Select, Update, BUMP_UPDATED_AT_SQL};
    use crate::db::DbError;
    use rusqlite::types::Value;

    const NOW_MS_SQL: &str = now_ms_sql!();

    #[test]
    fn timestamp_expressions_share_one_definition() {
        assert!(BUMP_UPDATED_AT_SQL.contains(NOW_MS_SQL));
        let schema = include_str!("../db/migrations/0001_init.sql");
        assert_eq!(schema.matches(NOW_MS_SQL).count(), 4);
    }

    #[test]
    fn multi_row_insert_numbers_placeholders_in_bind_order() {
        let query = Insert::into_table("steps")
            .columns(&["sequence_id", "subject"])
            .values(vec![Value::Integer(7), Value::Text("a".to_string())])
            .values(vec![Value::Integer(7), Value::Text("b".to_string())])
            .returning(&["id"])
            .build()
            .unwrap();

        assert_eq!(
            query.sql,
            "INSERT INTO steps (sequence_id, subject) VALUES (?1, ?2), (?3, ?4) RETURNING id"
        );
        assert_eq!(query.values.len(), 4);
        assert_eq!(query.values[3], Value::Text("b".to_string()));
    }

    #[test]
    fn insert_rejects_row_with_wrong_arity() {
        let err = Insert::into_table("steps")
            .columns(&["sequence_id", "subject"])
            .values(vec![Value::Integer(7)])
            .build()
            .unwrap_err();
        assert!(matches!(err, DbError::InvalidQuery(message) if message.contains("row 0")));
    }

    #[test]
    fn update_mixes_bound_and_raw_assignments() {
        let query = Update::table("steps")
            .set("subject", "s".to_string())
            .set_raw("updated_at", NOW_MS_SQL)
            .where_eq("id", 3_i64)
            .where_eq("sequence_id", 9_i64)
            .returning(&["id", "updated_at"])
            .build()
            .unwrap();

        assert_eq!(
            query.sql,
            format!(
                "UPDATE steps SET subject = ?1, updated_at = {NOW_MS_SQL} \
                 WHERE id = ?2 AND sequence_id = ?3 RETURNING id, updated_at"
            )
        );
        assert_eq!(
            query.values,
            vec![
                Value::Text("s".to_string()),
                Value::Integer(3),
                Value::Integer(9)
            ]
        );
    }

    #[test]
    fn select_renders_filter_and_order() {
        let query = Select::from_table("steps")
            .columns(&["id", "subject"])
            .where_eq("sequence_id", 4_i64)
            .order_by("id ASC")
            .build()
            .unwrap();

        assert_eq!(
            query.sql,
            "SELECT id, subject FROM steps WHERE sequence_id = ?1 ORDER BY id ASC"
        );
    }

    #[test]
    fn delete_without_conditions_is_rejected() {
        let err = Delete::from_table("steps").build().unwrap_err();
        assert!(matches!(err, DbError::InvalidQuery(_)));
    }
}
