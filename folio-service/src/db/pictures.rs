//! Picture record operations.

use rusqlite::{OptionalExtension, params, params_from_iter};

use super::Database;
use super::models::{Picture, format_timestamp};
use crate::error::{DatabaseError, ServiceResult};

const PICTURE_COLUMNS: &str =
    "id, document_id, page_number, image_index, blob_key, mime_type, description, created_at";

impl Database {
    /// Insert a picture record
    pub fn insert_picture(&self, picture: &Picture) -> ServiceResult<()> {
        let conn = self.conn();

        conn.execute(
            r#"
            INSERT INTO pictures (id, document_id, page_number, image_index, blob_key, mime_type, description, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                picture.id,
                picture.document_id,
                picture.page_number,
                picture.image_index,
                picture.blob_key,
                picture.mime_type,
                picture.description,
                format_timestamp(&picture.created_at),
            ],
        )
        .map_err(DatabaseError::Query)?;

        Ok(())
    }

    /// Get a picture by ID
    pub fn get_picture(&self, id: &str) -> ServiceResult<Option<Picture>> {
        let conn = self.conn();

        conn.query_row(
            &format!("SELECT {PICTURE_COLUMNS} FROM pictures WHERE id = ?1"),
            params![id],
            Picture::from_row,
        )
        .optional()
        .map_err(DatabaseError::Query)
        .map_err(Into::into)
    }

    /// Get the pictures of several documents, in document order per document
    pub fn list_pictures(&self, document_ids: &[String]) -> ServiceResult<Vec<Picture>> {
        if document_ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; document_ids.len()].join(", ");
        let sql = format!(
            "SELECT {PICTURE_COLUMNS} FROM pictures WHERE document_id IN ({placeholders}) \
             ORDER BY document_id, page_number, image_index"
        );

        let conn = self.conn();
        let mut stmt = conn.prepare(&sql).map_err(DatabaseError::Query)?;

        let rows = stmt
            .query_map(params_from_iter(document_ids.iter()), Picture::from_row)
            .map_err(DatabaseError::Query)?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(DatabaseError::Query)
            .map_err(Into::into)
    }

    /// Delete a single picture record
    pub fn delete_picture(&self, id: &str) -> ServiceResult<bool> {
        let conn = self.conn();

        let rows = conn
            .execute("DELETE FROM pictures WHERE id = ?1", params![id])
            .map_err(DatabaseError::Query)?;

        Ok(rows > 0)
    }

    /// Delete all picture records of a document (returns the blob keys for cleanup)
    pub fn delete_pictures_for_document(&self, document_id: &str) -> ServiceResult<Vec<String>> {
        let conn = self.conn();

        let mut stmt = conn
            .prepare("DELETE FROM pictures WHERE document_id = ?1 RETURNING blob_key")
            .map_err(DatabaseError::Query)?;

        let keys = stmt
            .query_map(params![document_id], |row| row.get(0))
            .map_err(DatabaseError::Query)?
            .collect::<Result<Vec<String>, _>>()
            .map_err(DatabaseError::Query)?;

        Ok(keys)
    }
}
