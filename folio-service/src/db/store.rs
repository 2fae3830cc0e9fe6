//! `MetadataStore` implementation backed by the SQLite database.

use chrono::{DateTime, Utc};

use super::Database;
use super::models::{Account, Document, DocumentQuery, DocumentStatus, Picture};
use crate::error::ServiceResult;
use crate::storage::MetadataStore;

impl MetadataStore for Database {
    fn insert_account(&self, account: &Account) -> ServiceResult<()> {
        Database::insert_account(self, account)
    }

    fn get_account(&self, id: &str) -> ServiceResult<Option<Account>> {
        Database::get_account(self, id)
    }

    fn find_account_by_email(&self, email: &str) -> ServiceResult<Option<Account>> {
        Database::find_account_by_email(self, email)
    }

    fn update_account_profile(
        &self,
        id: &str,
        name: Option<&str>,
        surname: Option<&str>,
    ) -> ServiceResult<bool> {
        Database::update_account_profile(self, id, name, surname)
    }

    fn set_reset_challenge(
        &self,
        id: &str,
        token: &str,
        expires: DateTime<Utc>,
    ) -> ServiceResult<bool> {
        Database::set_reset_challenge(self, id, token, expires)
    }

    fn find_account_by_reset_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> ServiceResult<Option<Account>> {
        Database::find_account_by_reset_token(self, token, now)
    }

    fn complete_password_reset(&self, id: &str, credential_hash: &str) -> ServiceResult<bool> {
        Database::complete_password_reset(self, id, credential_hash)
    }

    fn delete_account(&self, id: &str) -> ServiceResult<usize> {
        Database::delete_account(self, id)
    }

    fn insert_document(&self, document: &Document) -> ServiceResult<()> {
        Database::insert_document(self, document)
    }

    fn get_owned_document(
        &self,
        account_id: &str,
        document_id: &str,
    ) -> ServiceResult<Option<Document>> {
        Database::get_owned_document(self, account_id, document_id)
    }

    fn set_document_status(
        &self,
        document_id: &str,
        status: DocumentStatus,
    ) -> ServiceResult<bool> {
        Database::set_document_status(self, document_id, status)
    }

    fn list_documents(&self, query: &DocumentQuery) -> ServiceResult<Vec<Document>> {
        Database::list_documents(self, query)
    }

    fn count_documents(&self, account_id: &str) -> ServiceResult<usize> {
        Database::count_documents(self, account_id)
    }

    fn delete_document(&self, document_id: &str) -> ServiceResult<bool> {
        Database::delete_document(self, document_id)
    }

    fn delete_documents_for_account(&self, account_id: &str) -> ServiceResult<usize> {
        Database::delete_documents_for_account(self, account_id)
    }

    fn insert_picture(&self, picture: &Picture) -> ServiceResult<()> {
        Database::insert_picture(self, picture)
    }

    fn get_picture(&self, id: &str) -> ServiceResult<Option<Picture>> {
        Database::get_picture(self, id)
    }

    fn list_pictures(&self, document_ids: &[String]) -> ServiceResult<Vec<Picture>> {
        Database::list_pictures(self, document_ids)
    }

    fn delete_picture(&self, id: &str) -> ServiceResult<bool> {
        Database::delete_picture(self, id)
    }

    fn delete_pictures_for_document(&self, document_id: &str) -> ServiceResult<Vec<String>> {
        Database::delete_pictures_for_document(self, document_id)
    }
}
