//! Database model structs.
//!
//! This module contains the data structures for database records.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Row;
use serde::{Deserialize, Serialize};

/// Ingestion status of a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    /// Record and original file are stored; pictures are still being processed
    Pending,
    /// The ingestion pipeline ran to completion
    Ready,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Pending => "pending",
            DocumentStatus::Ready => "ready",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "ready" => DocumentStatus::Ready,
            _ => DocumentStatus::Pending,
        }
    }
}

/// Account record
#[derive(Debug, Clone)]
pub struct Account {
    pub id: String,
    pub email: String,
    /// Produced and checked by the auth collaborator; opaque here
    pub credential_hash: String,
    pub name: Option<String>,
    pub surname: Option<String>,
    pub reset_token: Option<String>,
    pub reset_token_expires: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Account {
    pub(crate) fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        let expires_str: Option<String> = row.get(6)?;
        let created_at_str: String = row.get(7)?;

        Ok(Self {
            id: row.get(0)?,
            email: row.get(1)?,
            credential_hash: row.get(2)?,
            name: row.get(3)?,
            surname: row.get(4)?,
            reset_token: row.get(5)?,
            reset_token_expires: expires_str.as_deref().and_then(parse_timestamp),
            created_at: parse_timestamp(&created_at_str).unwrap_or_else(Utc::now),
        })
    }
}

/// Document record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub account_id: String,
    pub name: String,
    pub year: i32,
    pub uploaded_at: DateTime<Utc>,
    /// Key of the original file in the blob store
    pub blob_key: String,
    pub filename: String,
    /// SHA-256 of the uploaded bytes
    pub file_hash: String,
    pub status: DocumentStatus,
    pub picture_count: usize,
}

impl Document {
    pub(crate) fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        let uploaded_at_str: String = row.get(4)?;
        let status_str: String = row.get(8)?;
        let picture_count: i64 = row.get(9)?;

        Ok(Self {
            id: row.get(0)?,
            account_id: row.get(1)?,
            name: row.get(2)?,
            year: row.get(3)?,
            uploaded_at: parse_timestamp(&uploaded_at_str).unwrap_or_else(Utc::now),
            blob_key: row.get(5)?,
            filename: row.get(6)?,
            file_hash: row.get(7)?,
            status: DocumentStatus::from_str(&status_str),
            picture_count: picture_count as usize,
        })
    }
}

/// A described, content-bearing picture extracted from a document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Picture {
    pub id: String,
    pub document_id: String,
    /// 1-based page number
    pub page_number: u32,
    /// 1-based position among the page's images
    pub image_index: u32,
    pub blob_key: String,
    pub mime_type: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl Picture {
    pub(crate) fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        let created_at_str: String = row.get(7)?;

        Ok(Self {
            id: row.get(0)?,
            document_id: row.get(1)?,
            page_number: row.get(2)?,
            image_index: row.get(3)?,
            blob_key: row.get(4)?,
            mime_type: row.get(5)?,
            description: row.get(6)?,
            created_at: parse_timestamp(&created_at_str).unwrap_or_else(Utc::now),
        })
    }
}

/// Filter over one account's documents. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentQuery {
    pub account_id: String,
    /// Case-insensitive substring of the display name
    pub name_contains: Option<String>,
    pub year: Option<i32>,
    /// Inclusive lower bound on the upload time
    pub uploaded_from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on the upload time
    pub uploaded_before: Option<DateTime<Utc>>,
    pub document_id: Option<String>,
}

impl DocumentQuery {
    pub fn for_account(account_id: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            ..Default::default()
        }
    }
}

/// Fixed-width RFC 3339 so stored timestamps compare correctly as text
pub(crate) fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}
