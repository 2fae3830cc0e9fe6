//! Database schema migrations.

use rusqlite::Connection;

use crate::error::{DatabaseError, ServiceResult};

/// Run all database migrations.
///
/// Called during database initialization to ensure the schema is up to date.
/// Pictures reference their document without `ON DELETE CASCADE`: removal
/// order is owned by the lifecycle code, and the foreign key rejects a
/// document delete that would leave pictures behind.
pub(super) fn run_migrations(conn: &Connection) -> ServiceResult<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS accounts (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            credential_hash TEXT NOT NULL,
            name TEXT,
            surname TEXT,
            reset_token TEXT,
            reset_token_expires TEXT,
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_accounts_reset_token ON accounts(reset_token);

        CREATE TABLE IF NOT EXISTS documents (
            id TEXT PRIMARY KEY,
            account_id TEXT NOT NULL,
            name TEXT NOT NULL,
            year INTEGER NOT NULL,
            uploaded_at TEXT NOT NULL,
            blob_key TEXT NOT NULL UNIQUE,
            filename TEXT NOT NULL,
            file_hash TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending'
        );

        CREATE INDEX IF NOT EXISTS idx_documents_account ON documents(account_id);
        CREATE INDEX IF NOT EXISTS idx_documents_uploaded ON documents(uploaded_at);

        CREATE TABLE IF NOT EXISTS pictures (
            id TEXT PRIMARY KEY,
            document_id TEXT NOT NULL,
            page_number INTEGER NOT NULL,
            image_index INTEGER NOT NULL,
            blob_key TEXT NOT NULL UNIQUE,
            mime_type TEXT NOT NULL,
            description TEXT NOT NULL,
            created_at TEXT NOT NULL,
            UNIQUE(document_id, page_number, image_index),
            FOREIGN KEY (document_id) REFERENCES documents(id)
        );

        CREATE INDEX IF NOT EXISTS idx_pictures_document ON pictures(document_id);
    "#,
    )
    .map_err(|e| DatabaseError::Migration {
        message: e.to_string(),
    })?;

    Ok(())
}
