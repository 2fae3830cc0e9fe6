//! Cascading deletion of documents, pictures and accounts.
//!
//! A cascade is an ordered list of independent steps; nothing is wrapped in
//! a transaction. Blob removals are best-effort: a failure is logged and the
//! cascade moves on. Metadata failures are recorded, a parent record is kept
//! when removing its children failed, and the first metadata failure is
//! returned once every step has run.

use tracing::{info, warn};

use crate::db::{Document, DocumentQuery};
use crate::error::{ServiceError, ServiceResult, format_error_chain};
use crate::service::FolioService;

/// Outcome tracking for one cascade
struct Cascade<'a> {
    target: &'a str,
    failure: Option<ServiceError>,
}

impl<'a> Cascade<'a> {
    fn new(target: &'a str) -> Self {
        Self {
            target,
            failure: None,
        }
    }

    /// Record the result of a metadata step; `None` when it failed
    fn metadata<T>(&mut self, step: &str, result: ServiceResult<T>) -> Option<T> {
        match result {
            Ok(value) => {
                info!(target_id = %self.target, step = step, "Cascade step completed");
                Some(value)
            }
            Err(e) => {
                warn!(
                    target_id = %self.target,
                    step = step,
                    error = %format_error_chain(&e),
                    "Cascade step failed"
                );
                self.failure.get_or_insert(e);
                None
            }
        }
    }

    fn skip(&self, step: &str) {
        warn!(
            target_id = %self.target,
            step = step,
            "Cascade step skipped; dependent records could not be removed"
        );
    }

    fn finish(self) -> ServiceResult<()> {
        match self.failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl FolioService {
    /// Delete a document and everything derived from it.
    ///
    /// Order: original file, picture records, picture files, document record.
    /// An ingestion still running for the document is cancelled first.
    pub fn delete_document(&self, account_id: &str, document_id: &str) -> ServiceResult<()> {
        let document = self
            .metadata
            .get_owned_document(account_id, document_id)?
            .ok_or(ServiceError::NotFoundOrForbidden)?;

        self.cancel_ingestion(document_id);

        let mut cascade = Cascade::new(document_id);
        if self.purge_document_assets(&document, &mut cascade) {
            cascade.metadata("document record", self.metadata.delete_document(document_id));
        } else {
            cascade.skip("document record");
        }
        cascade.finish()?;

        info!(doc_id = %document_id, "Document deleted");
        Ok(())
    }

    /// Delete one picture of a document the account owns.
    pub fn delete_picture(&self, account_id: &str, picture_id: &str) -> ServiceResult<()> {
        let picture = self
            .metadata
            .get_picture(picture_id)?
            .ok_or(ServiceError::NotFoundOrForbidden)?;

        self.metadata
            .get_owned_document(account_id, &picture.document_id)?
            .ok_or(ServiceError::NotFoundOrForbidden)?;

        if !self.metadata.delete_picture(picture_id)? {
            // Removed concurrently
            return Err(ServiceError::NotFoundOrForbidden);
        }
        self.remove_blob(&picture.blob_key);

        info!(picture_id = %picture_id, doc_id = %picture.document_id, "Picture deleted");
        Ok(())
    }

    /// Delete an account with all of its documents and pictures.
    ///
    /// Cleanup is not rolled back when the final account removal affects no
    /// record; that case reports `AccountDeletionFailed`.
    pub fn delete_account(&self, account_id: &str) -> ServiceResult<()> {
        let documents = self
            .metadata
            .list_documents(&DocumentQuery::for_account(account_id))?;

        info!(
            account_id = %account_id,
            documents = documents.len(),
            "Deleting account"
        );

        let mut cascade = Cascade::new(account_id);
        let mut children_removed = true;
        for document in &documents {
            self.cancel_ingestion(&document.id);
            children_removed &= self.purge_document_assets(document, &mut cascade);
        }

        let documents_removed = children_removed
            && cascade
                .metadata(
                    "document records",
                    self.metadata.delete_documents_for_account(account_id),
                )
                .is_some();

        if !documents_removed {
            cascade.skip("account record");
            return cascade.finish();
        }

        let removed = cascade.metadata("account record", self.metadata.delete_account(account_id));
        cascade.finish()?;

        if removed == Some(0) {
            warn!(account_id = %account_id, "No account record removed after cleanup");
            return Err(ServiceError::AccountDeletionFailed {
                account_id: account_id.to_string(),
            });
        }

        info!(account_id = %account_id, "Account deleted");
        Ok(())
    }

    /// Remove a document's original file, picture records and picture files.
    /// Returns whether the picture records are gone, which gates removing the
    /// document record itself.
    fn purge_document_assets(&self, document: &Document, cascade: &mut Cascade<'_>) -> bool {
        self.remove_blob(&document.blob_key);

        let Some(keys) = cascade.metadata(
            "picture records",
            self.metadata.delete_pictures_for_document(&document.id),
        ) else {
            return false;
        };

        for key in &keys {
            self.remove_blob(key);
        }

        true
    }

    /// Best-effort blob removal; failures and missing blobs are logged only.
    pub(crate) fn remove_blob(&self, key: &str) {
        match self.blobs.delete(key) {
            Ok(true) => {}
            Ok(false) => warn!(key = %key, "Blob already absent"),
            Err(e) => warn!(
                key = %key,
                error = %format_error_chain(&e),
                "Failed to delete blob; continuing"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::SearchFilter;
    use crate::config::default_ingestion;
    use crate::db::{Account, Database, DocumentStatus, Picture};
    use crate::filter::KeywordFilter;
    use crate::ingestion::pdf::fixtures::{TestImage, build_pdf};
    use crate::service::DocumentUpload;
    use crate::service::testing::{Harness, ScriptedDescriber};
    use crate::storage::MetadataStore;
    use chrono::{DateTime, Utc};
    use std::sync::Arc;

    fn describer() -> ScriptedDescriber {
        ScriptedDescriber::new([(&b"a"[..], "a mountain"), (&b"b"[..], "a lake")])
    }

    async fn ingest(harness: &Harness, account_id: &str, name: &str) -> Document {
        let pdf = build_pdf(vec![
            vec![TestImage::Jpeg(b"a".to_vec())],
            vec![TestImage::Jpeg(b"b".to_vec())],
        ]);
        let id = harness
            .service
            .ingest(
                account_id,
                DocumentUpload {
                    name: name.to_string(),
                    year: "2001".to_string(),
                    filename: "scan.pdf".to_string(),
                    content: pdf,
                },
            )
            .await
            .unwrap();
        harness.db.get_owned_document(account_id, &id).unwrap().unwrap()
    }

    fn register(harness: &Harness, id: &str) {
        harness
            .db
            .insert_account(&Account {
                id: id.to_string(),
                email: format!("{id}@example.com"),
                credential_hash: "hash".to_string(),
                name: None,
                surname: None,
                reset_token: None,
                reset_token_expires: None,
                created_at: Utc::now(),
            })
            .unwrap();
    }

    #[tokio::test]
    async fn test_delete_document_removes_everything() {
        let harness = Harness::new(describer());
        let document = ingest(&harness, "alice", "Alps").await;
        let pictures = harness.db.list_pictures(&[document.id.clone()]).unwrap();
        assert_eq!(pictures.len(), 2);

        harness.service.delete_document("alice", &document.id).unwrap();

        assert!(harness.db.get_owned_document("alice", &document.id).unwrap().is_none());
        assert!(harness.db.list_pictures(&[document.id.clone()]).unwrap().is_empty());
        assert_eq!(harness.blobs.get(&document.blob_key).unwrap(), None);
        for picture in &pictures {
            assert_eq!(harness.blobs.get(&picture.blob_key).unwrap(), None);
        }

        // Second delete: not found, and no blob-layer error
        assert!(matches!(
            harness.service.delete_document("alice", &document.id),
            Err(ServiceError::NotFoundOrForbidden)
        ));
    }

    #[tokio::test]
    async fn test_delete_document_checks_ownership() {
        let harness = Harness::new(describer());
        let document = ingest(&harness, "alice", "Alps").await;

        assert!(matches!(
            harness.service.delete_document("mallory", &document.id),
            Err(ServiceError::NotFoundOrForbidden)
        ));
        assert!(harness.db.get_owned_document("alice", &document.id).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_missing_original_blob_is_tolerated() {
        let harness = Harness::new(describer());
        let document = ingest(&harness, "alice", "Alps").await;
        harness.blobs.delete(&document.blob_key).unwrap();

        harness.service.delete_document("alice", &document.id).unwrap();
        assert_eq!(harness.db.count_documents("alice").unwrap(), 0);
    }

    #[tokio::test]
    async fn test_blob_delete_failures_do_not_abort() {
        let harness = Harness::build(
            Arc::new(describer()),
            |_| {},
            Harness::flaky(None, Some("pictures/")),
        );
        let document = ingest(&harness, "alice", "Alps").await;

        harness.service.delete_document("alice", &document.id).unwrap();

        assert!(harness.db.get_owned_document("alice", &document.id).unwrap().is_none());
        assert!(harness.db.list_pictures(&[document.id.clone()]).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_picture() {
        let harness = Harness::new(describer());
        let document = ingest(&harness, "alice", "Alps").await;
        let pictures = harness.db.list_pictures(&[document.id.clone()]).unwrap();

        assert!(matches!(
            harness.service.delete_picture("mallory", &pictures[0].id),
            Err(ServiceError::NotFoundOrForbidden)
        ));

        harness.service.delete_picture("alice", &pictures[0].id).unwrap();

        let remaining = harness.db.list_pictures(&[document.id.clone()]).unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(harness.blobs.get(&pictures[0].blob_key).unwrap(), None);
        assert!(matches!(
            harness.service.delete_picture("alice", &pictures[0].id),
            Err(ServiceError::NotFoundOrForbidden)
        ));
    }

    #[tokio::test]
    async fn test_delete_account_cascades() {
        let harness = Harness::new(describer());
        register(&harness, "alice");
        register(&harness, "bob");
        let first = ingest(&harness, "alice", "Alps").await;
        ingest(&harness, "alice", "Andes").await;
        let kept = ingest(&harness, "bob", "Atlas").await;

        harness.service.delete_account("alice").unwrap();

        assert_eq!(harness.db.count_documents("alice").unwrap(), 0);
        assert!(harness.db.get_account("alice").unwrap().is_none());
        assert!(harness.db.list_pictures(&[first.id.clone()]).unwrap().is_empty());
        assert_eq!(harness.blobs.get(&first.blob_key).unwrap(), None);

        assert!(matches!(
            harness.service.search("alice", &SearchFilter::default()),
            Err(ServiceError::NoMatch)
        ));

        // Other accounts are untouched
        assert!(harness.db.get_owned_document("bob", &kept.id).unwrap().is_some());
        assert_eq!(harness.db.list_pictures(&[kept.id.clone()]).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_delete_account_without_record_fails_after_cleanup() {
        let harness = Harness::new(describer());
        let document = ingest(&harness, "ghost", "Alps").await;

        assert!(matches!(
            harness.service.delete_account("ghost"),
            Err(ServiceError::AccountDeletionFailed { .. })
        ));
        // Cleanup is not rolled back
        assert!(harness.db.get_owned_document("ghost", &document.id).unwrap().is_none());
    }

    /// Database whose bulk picture deletion always fails
    struct StuckPictures(Arc<Database>);

    impl MetadataStore for StuckPictures {
        fn insert_account(&self, account: &Account) -> ServiceResult<()> {
            self.0.insert_account(account)
        }
        fn get_account(&self, id: &str) -> ServiceResult<Option<Account>> {
            self.0.get_account(id)
        }
        fn find_account_by_email(&self, email: &str) -> ServiceResult<Option<Account>> {
            self.0.find_account_by_email(email)
        }
        fn update_account_profile(
            &self,
            id: &str,
            name: Option<&str>,
            surname: Option<&str>,
        ) -> ServiceResult<bool> {
            self.0.update_account_profile(id, name, surname)
        }
        fn set_reset_challenge(
            &self,
            id: &str,
            token: &str,
            expires: DateTime<Utc>,
        ) -> ServiceResult<bool> {
            self.0.set_reset_challenge(id, token, expires)
        }
        fn find_account_by_reset_token(
            &self,
            token: &str,
            now: DateTime<Utc>,
        ) -> ServiceResult<Option<Account>> {
            self.0.find_account_by_reset_token(token, now)
        }
        fn complete_password_reset(&self, id: &str, hash: &str) -> ServiceResult<bool> {
            self.0.complete_password_reset(id, hash)
        }
        fn delete_account(&self, id: &str) -> ServiceResult<usize> {
            self.0.delete_account(id)
        }
        fn insert_document(&self, document: &Document) -> ServiceResult<()> {
            self.0.insert_document(document)
        }
        fn get_owned_document(
            &self,
            account_id: &str,
            document_id: &str,
        ) -> ServiceResult<Option<Document>> {
            self.0.get_owned_document(account_id, document_id)
        }
        fn set_document_status(
            &self,
            document_id: &str,
            status: DocumentStatus,
        ) -> ServiceResult<bool> {
            self.0.set_document_status(document_id, status)
        }
        fn list_documents(&self, query: &DocumentQuery) -> ServiceResult<Vec<Document>> {
            self.0.list_documents(query)
        }
        fn count_documents(&self, account_id: &str) -> ServiceResult<usize> {
            self.0.count_documents(account_id)
        }
        fn delete_document(&self, document_id: &str) -> ServiceResult<bool> {
            self.0.delete_document(document_id)
        }
        fn delete_documents_for_account(&self, account_id: &str) -> ServiceResult<usize> {
            self.0.delete_documents_for_account(account_id)
        }
        fn insert_picture(&self, picture: &Picture) -> ServiceResult<()> {
            self.0.insert_picture(picture)
        }
        fn get_picture(&self, id: &str) -> ServiceResult<Option<Picture>> {
            self.0.get_picture(id)
        }
        fn list_pictures(&self, document_ids: &[String]) -> ServiceResult<Vec<Picture>> {
            self.0.list_pictures(document_ids)
        }
        fn delete_picture(&self, id: &str) -> ServiceResult<bool> {
            self.0.delete_picture(id)
        }
        fn delete_pictures_for_document(&self, _document_id: &str) -> ServiceResult<Vec<String>> {
            Err(ServiceError::Internal {
                message: "picture table locked".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn test_parent_kept_when_children_fail() {
        let seeded = Harness::new(describer());
        let document = ingest(&seeded, "alice", "Alps").await;
        register(&seeded, "alice");

        let service = FolioService::new(
            Arc::new(StuckPictures(seeded.db.clone())),
            seeded.blobs.clone(),
            Arc::new(describer()),
            Arc::new(KeywordFilter::default()),
            default_ingestion(),
        );

        assert!(matches!(
            service.delete_document("alice", &document.id),
            Err(ServiceError::Internal { .. })
        ));
        // Original file went; records stay so no picture points at a missing document
        assert_eq!(seeded.blobs.get(&document.blob_key).unwrap(), None);
        assert!(seeded.db.get_owned_document("alice", &document.id).unwrap().is_some());
        assert_eq!(seeded.db.list_pictures(&[document.id.clone()]).unwrap().len(), 2);

        assert!(matches!(
            service.delete_account("alice"),
            Err(ServiceError::Internal { .. })
        ));
        assert!(seeded.db.get_account("alice").unwrap().is_some());
        assert_eq!(seeded.db.count_documents("alice").unwrap(), 1);
    }
}
