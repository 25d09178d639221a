//! Interrupt-based cancellation for in-flight statements.
//!
//! A `CancelGuard` is armed before a store operation starts and disarmed once
//! it returns. Dropping an armed guard interrupts whatever statement is
//! running on the connection, so an abandoned caller never leaves a query
//! or transaction running. An interrupted transaction is rolled back when
//! its `rusqlite::Transaction` is dropped uncommitted.
//!
//! SQLite clears a pending interrupt when the next statement starts on an
//! idle connection, so a late interrupt cannot leak into unrelated work.

use log::warn;
use rusqlite::{Connection, InterruptHandle};

/// Interrupts the connection it was created for when dropped while armed.
pub struct CancelGuard {
    handle: InterruptHandle,
    armed: bool,
}

impl CancelGuard {
    /// Arms a guard over an interrupt handle obtained from a connection.
    pub fn new(handle: InterruptHandle) -> Self {
        Self {
            handle,
            armed: true,
        }
    }

    /// Arms a guard for `conn`.
    pub fn for_connection(conn: &Connection) -> Self {
        Self::new(conn.get_interrupt_handle())
    }

    /// Marks the guarded operation as finished; dropping no longer interrupts.
    pub fn disarm(mut self) {
        self.armed = false;
    }

    /// Interrupts the guarded connection immediately.
    pub fn cancel(mut self) {
        self.armed = false;
        self.handle.interrupt();
    }
}

impl Drop for CancelGuard {
    fn drop(&mut self) {
        if self.armed {
            warn!("event=operation_cancelled module=db status=interrupted");
            self.handle.interrupt();
        }
    }
}
