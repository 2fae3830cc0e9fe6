//! Store interfaces consumed by the service.
//!
//! The service only talks to its metadata and blob stores through these
//! traits, so each component receives explicit handles and tests can use
//! isolated instances.

mod fs;

pub use fs::FsBlobStore;

use chrono::{DateTime, Utc};

use crate::db::{Account, Document, DocumentQuery, DocumentStatus, Picture};
use crate::error::{BlobError, ServiceResult};

/// Record store for accounts, documents and pictures.
///
/// Every call is an independently committed write or a read; there are no
/// multi-call transactions.
pub trait MetadataStore: Send + Sync {
    fn insert_account(&self, account: &Account) -> ServiceResult<()>;
    fn get_account(&self, id: &str) -> ServiceResult<Option<Account>>;
    fn find_account_by_email(&self, email: &str) -> ServiceResult<Option<Account>>;
    fn update_account_profile(
        &self,
        id: &str,
        name: Option<&str>,
        surname: Option<&str>,
    ) -> ServiceResult<bool>;
    fn set_reset_challenge(
        &self,
        id: &str,
        token: &str,
        expires: DateTime<Utc>,
    ) -> ServiceResult<bool>;
    fn find_account_by_reset_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> ServiceResult<Option<Account>>;
    fn complete_password_reset(&self, id: &str, credential_hash: &str) -> ServiceResult<bool>;
    /// Returns the number of account records removed
    fn delete_account(&self, id: &str) -> ServiceResult<usize>;

    fn insert_document(&self, document: &Document) -> ServiceResult<()>;
    fn get_owned_document(
        &self,
        account_id: &str,
        document_id: &str,
    ) -> ServiceResult<Option<Document>>;
    fn set_document_status(&self, document_id: &str, status: DocumentStatus)
    -> ServiceResult<bool>;
    fn list_documents(&self, query: &DocumentQuery) -> ServiceResult<Vec<Document>>;
    fn count_documents(&self, account_id: &str) -> ServiceResult<usize>;
    fn delete_document(&self, document_id: &str) -> ServiceResult<bool>;
    fn delete_documents_for_account(&self, account_id: &str) -> ServiceResult<usize>;

    fn insert_picture(&self, picture: &Picture) -> ServiceResult<()>;
    fn get_picture(&self, id: &str) -> ServiceResult<Option<Picture>>;
    fn list_pictures(&self, document_ids: &[String]) -> ServiceResult<Vec<Picture>>;
    fn delete_picture(&self, id: &str) -> ServiceResult<bool>;
    /// Returns the blob keys of the removed pictures
    fn delete_pictures_for_document(&self, document_id: &str) -> ServiceResult<Vec<String>>;
}

/// Name-addressed byte storage for original files and picture bytes
pub trait BlobStore: Send + Sync {
    fn put(&self, key: &str, data: &[u8]) -> Result<(), BlobError>;

    /// `None` when nothing is stored under the key
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BlobError>;

    /// Idempotent: returns `false` when the key did not exist
    fn delete(&self, key: &str) -> Result<bool, BlobError>;
}
