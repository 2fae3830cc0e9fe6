//! Database module for SQLite operations.
//!
//! This module provides the `Database` struct, the SQLite implementation of
//! the metadata store. Operations are organized into submodules by record kind.

mod accounts;
mod documents;
mod migrations;
pub mod models;
mod pictures;
mod store;

pub use models::{Account, Document, DocumentQuery, DocumentStatus, Picture};

use rusqlite::Connection;
use rusqlite::functions::FunctionFlags;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::{DatabaseError, ServiceResult};

/// Database manager for SQLite operations
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open or create the database at the given path
    pub fn open(path: &Path) -> ServiceResult<Self> {
        let conn = Connection::open(path).map_err(DatabaseError::Connection)?;

        // Enable WAL mode for better concurrency
        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .map_err(DatabaseError::Query)?;

        Self::init(conn)
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> ServiceResult<Self> {
        let conn = Connection::open_in_memory().map_err(DatabaseError::Connection)?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> ServiceResult<Self> {
        conn.execute_batch("PRAGMA foreign_keys=ON;")
            .map_err(DatabaseError::Query)?;

        register_functions(&conn)?;
        migrations::run_migrations(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// A panic while holding the lock cannot leave a half-applied statement
    /// behind, so a poisoned mutex is still safe to use.
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// SQLite's `lower()` only folds ASCII; name search needs full Unicode case folding.
fn register_functions(conn: &Connection) -> ServiceResult<()> {
    conn.create_scalar_function(
        "contains_ci",
        2,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let haystack = ctx.get::<String>(0)?;
            let needle = ctx.get::<String>(1)?;
            Ok(haystack.to_lowercase().contains(&needle.to_lowercase()))
        },
    )
    .map_err(DatabaseError::Query)?;

    Ok(())
}
