//! Read-side operations: listings, file access, histogram and search.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::aggregation::{SearchFilter, SearchHit, YearHistogram};
use crate::db::{Document, DocumentQuery, Picture};
use crate::error::{ServiceError, ServiceResult};
use crate::ingestion::DocumentFormat;
use crate::service::FolioService;

/// Stored bytes of a picture
#[derive(Debug, Clone)]
pub struct PictureData {
    pub data: Vec<u8>,
    pub mime_type: String,
}

/// Original uploaded file of a document
#[derive(Debug, Clone)]
pub struct DocumentFile {
    pub data: Vec<u8>,
    pub filename: String,
    pub mime_type: &'static str,
}

impl FolioService {
    /// All documents of an account, oldest upload first
    pub fn list_documents(&self, account_id: &str) -> ServiceResult<Vec<Document>> {
        self.metadata
            .list_documents(&DocumentQuery::for_account(account_id))
    }

    pub fn count_documents(&self, account_id: &str) -> ServiceResult<usize> {
        self.metadata.count_documents(account_id)
    }

    fn owned_document(&self, account_id: &str, document_id: &str) -> ServiceResult<Document> {
        self.metadata
            .get_owned_document(account_id, document_id)?
            .ok_or(ServiceError::NotFoundOrForbidden)
    }

    /// Pictures of one document, in document order
    pub fn document_pictures(
        &self,
        account_id: &str,
        document_id: &str,
    ) -> ServiceResult<Vec<Picture>> {
        let document = self.owned_document(account_id, document_id)?;
        self.metadata.list_pictures(&[document.id])
    }

    pub fn picture_data(&self, account_id: &str, picture_id: &str) -> ServiceResult<PictureData> {
        let picture = self
            .metadata
            .get_picture(picture_id)?
            .ok_or(ServiceError::NotFoundOrForbidden)?;
        self.owned_document(account_id, &picture.document_id)?;

        let data = self.blobs.get(&picture.blob_key)?.ok_or_else(|| {
            warn!(picture_id = %picture_id, key = %picture.blob_key, "Picture record has no blob");
            ServiceError::NotFoundOrForbidden
        })?;

        Ok(PictureData {
            data,
            mime_type: picture.mime_type,
        })
    }

    pub fn document_file(&self, account_id: &str, document_id: &str) -> ServiceResult<DocumentFile> {
        let document = self.owned_document(account_id, document_id)?;

        let data = self.blobs.get(&document.blob_key)?.ok_or_else(|| {
            warn!(doc_id = %document_id, key = %document.blob_key, "Document record has no blob");
            ServiceError::NotFoundOrForbidden
        })?;

        Ok(DocumentFile {
            data,
            filename: document.filename,
            mime_type: DocumentFormat::Pdf.mime_type(),
        })
    }

    /// Documents and pictures of an account binned by year.
    /// Each picture counts under its document's year.
    pub fn histogram(&self, account_id: &str) -> ServiceResult<YearHistogram> {
        let documents = self.list_documents(account_id)?;
        if documents.is_empty() {
            return Err(ServiceError::NoData);
        }

        let years: HashMap<&str, i32> = documents
            .iter()
            .map(|d| (d.id.as_str(), d.year))
            .collect();
        let ids: Vec<String> = documents.iter().map(|d| d.id.clone()).collect();

        let doc_years: Vec<i32> = documents.iter().map(|d| d.year).collect();
        let picture_years: Vec<i32> = self
            .metadata
            .list_pictures(&ids)?
            .iter()
            .filter_map(|p| years.get(p.document_id.as_str()).copied())
            .collect();

        debug!(
            account_id = %account_id,
            documents = doc_years.len(),
            pictures = picture_years.len(),
            "Building year histogram"
        );

        YearHistogram::build(&doc_years, &picture_years).ok_or(ServiceError::NoData)
    }

    /// Documents of an account matching every given criterion, with the
    /// descriptions of their pictures.
    pub fn search(&self, account_id: &str, filter: &SearchFilter) -> ServiceResult<Vec<SearchHit>> {
        let documents = self.metadata.list_documents(&filter.to_query(account_id))?;
        if documents.is_empty() {
            return Err(ServiceError::NoMatch);
        }

        let ids: Vec<String> = documents.iter().map(|d| d.id.clone()).collect();
        let mut descriptions: HashMap<String, Vec<String>> = HashMap::new();
        for picture in self.metadata.list_pictures(&ids)? {
            descriptions
                .entry(picture.document_id)
                .or_default()
                .push(picture.description);
        }

        Ok(documents
            .into_iter()
            .map(|document| SearchHit {
                descriptions: descriptions.remove(&document.id).unwrap_or_default(),
                id: document.id,
                name: document.name,
                year: document.year,
                uploaded_at: document.uploaded_at,
            })
            .collect())
    }
}
