//! Document record operations.

use rusqlite::types::Value;
use rusqlite::{OptionalExtension, params, params_from_iter};

use super::Database;
use super::models::{Document, DocumentQuery, DocumentStatus, format_timestamp};
use crate::error::{DatabaseError, ServiceResult};

const DOCUMENT_SELECT: &str = "SELECT d.id, d.account_id, d.name, d.year, d.uploaded_at, d.blob_key, d.filename, d.file_hash, d.status, \
     (SELECT COUNT(*) FROM pictures WHERE document_id = d.id) AS picture_count \
     FROM documents d";

impl Database {
    /// Insert a new document
    pub fn insert_document(&self, doc: &Document) -> ServiceResult<()> {
        let conn = self.conn();

        conn.execute(
            r#"
            INSERT INTO documents (id, account_id, name, year, uploaded_at, blob_key, filename, file_hash, status)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                doc.id,
                doc.account_id,
                doc.name,
                doc.year,
                format_timestamp(&doc.uploaded_at),
                doc.blob_key,
                doc.filename,
                doc.file_hash,
                doc.status.as_str(),
            ],
        )
        .map_err(DatabaseError::Query)?;

        Ok(())
    }

    /// Get a document by ID, only if it belongs to the given account
    pub fn get_owned_document(
        &self,
        account_id: &str,
        document_id: &str,
    ) -> ServiceResult<Option<Document>> {
        let conn = self.conn();

        conn.query_row(
            &format!("{DOCUMENT_SELECT} WHERE d.id = ?1 AND d.account_id = ?2"),
            params![document_id, account_id],
            Document::from_row,
        )
        .optional()
        .map_err(DatabaseError::Query)
        .map_err(Into::into)
    }

    /// Update document ingestion status
    pub fn set_document_status(
        &self,
        document_id: &str,
        status: DocumentStatus,
    ) -> ServiceResult<bool> {
        let conn = self.conn();

        let rows = conn
            .execute(
                "UPDATE documents SET status = ?1 WHERE id = ?2",
                params![status.as_str(), document_id],
            )
            .map_err(DatabaseError::Query)?;

        Ok(rows > 0)
    }

    /// List an account's documents matching every set field of the query,
    /// oldest upload first
    pub fn list_documents(&self, query: &DocumentQuery) -> ServiceResult<Vec<Document>> {
        let (where_clause, values) = build_document_filter(query);
        let sql = format!("{DOCUMENT_SELECT} WHERE {where_clause} ORDER BY d.uploaded_at, d.id");

        let conn = self.conn();
        let mut stmt = conn.prepare(&sql).map_err(DatabaseError::Query)?;

        let rows = stmt
            .query_map(params_from_iter(values.iter()), Document::from_row)
            .map_err(DatabaseError::Query)?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(DatabaseError::Query)
            .map_err(Into::into)
    }

    /// Count an account's documents
    pub fn count_documents(&self, account_id: &str) -> ServiceResult<usize> {
        let conn = self.conn();

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM documents WHERE account_id = ?1",
                params![account_id],
                |row| row.get(0),
            )
            .map_err(DatabaseError::Query)?;

        Ok(count as usize)
    }

    /// Delete a single document record
    pub fn delete_document(&self, document_id: &str) -> ServiceResult<bool> {
        let conn = self.conn();

        let rows = conn
            .execute("DELETE FROM documents WHERE id = ?1", params![document_id])
            .map_err(DatabaseError::Query)?;

        Ok(rows > 0)
    }

    /// Delete every document record owned by an account
    pub fn delete_documents_for_account(&self, account_id: &str) -> ServiceResult<usize> {
        let conn = self.conn();

        let rows = conn
            .execute(
                "DELETE FROM documents WHERE account_id = ?1",
                params![account_id],
            )
            .map_err(DatabaseError::Query)?;

        Ok(rows)
    }
}

/// Build the WHERE clause and its positional values for a document query
fn build_document_filter(query: &DocumentQuery) -> (String, Vec<Value>) {
    let mut clauses = vec!["d.account_id = ?".to_string()];
    let mut values = vec![Value::Text(query.account_id.clone())];

    if let Some(name) = &query.name_contains {
        // Not LIKE: '%' and '_' in the needle stay literal
        clauses.push("contains_ci(d.name, ?)".to_string());
        values.push(Value::Text(name.clone()));
    }
    if let Some(year) = query.year {
        clauses.push("d.year = ?".to_string());
        values.push(Value::Integer(i64::from(year)));
    }
    if let Some(from) = &query.uploaded_from {
        clauses.push("d.uploaded_at >= ?".to_string());
        values.push(Value::Text(format_timestamp(from)));
    }
    if let Some(before) = &query.uploaded_before {
        clauses.push("d.uploaded_at < ?".to_string());
        values.push(Value::Text(format_timestamp(before)));
    }
    if let Some(id) = &query.document_id {
        clauses.push("d.id = ?".to_string());
        values.push(Value::Text(id.clone()));
    }

    (clauses.join(" AND "), values)
}
