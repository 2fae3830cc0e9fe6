//! Document ingestion pipeline.
//!
//! An upload is validated and parsed before anything is written. The
//! document record and its original file are then stored as a unit, after
//! which each embedded picture is described, classified and, when it carries
//! content, stored. A picture that cannot be described or stored is skipped;
//! it never fails the upload.

use chrono::Utc;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::db::{Document, DocumentStatus, Picture};
use crate::error::{ServiceError, ServiceResult, format_error_chain};
use crate::filter::is_content_bearing;
use crate::ingestion::assets::{document_blob_key, picture_blob_key};
use crate::ingestion::hash::upload_fingerprint;
use crate::ingestion::{ExtractedPicture, PdfSource, parse_document, sniff_format};
use crate::service::FolioService;

/// An uploaded document as received from a caller
#[derive(Debug, Clone)]
pub struct DocumentUpload {
    pub name: String,
    /// Publication year as entered; must parse as an integer
    pub year: String,
    pub filename: String,
    pub content: Vec<u8>,
}

impl FolioService {
    /// Ingest an uploaded document, returning the new document's id.
    ///
    /// Fails with `InvalidInput`, `FileTooLarge` or `MalformedDocument`
    /// before anything is stored, and with `Storage` when the document
    /// record or original file cannot be written. The document is marked
    /// ready once every picture has been processed.
    pub async fn ingest(&self, account_id: &str, upload: DocumentUpload) -> ServiceResult<String> {
        let DocumentUpload {
            name,
            year,
            filename,
            content,
        } = upload;

        let name = name.trim();
        if name.is_empty() {
            return Err(ServiceError::InvalidInput {
                message: "Document name is required".to_string(),
            });
        }
        let year = parse_year(&year)?;

        if content.is_empty() {
            return Err(ServiceError::InvalidInput {
                message: "File is required".to_string(),
            });
        }
        let size = content.len() as u64;
        let max = self.config.max_document_size_bytes;
        if size > max {
            return Err(ServiceError::FileTooLarge { size, max });
        }

        let format = sniff_format(&content)?;

        // Parse before the first write so a broken file leaves nothing behind
        let (source, content) = tokio::task::spawn_blocking(move || {
            parse_document(format, &content).map(|source| (source, content))
        })
        .await
        .map_err(|e| ServiceError::Internal {
            message: format!("Document parsing task failed: {}", e),
        })??;

        let document_id = Uuid::new_v4().to_string();
        let document = Document {
            id: document_id.clone(),
            account_id: account_id.to_string(),
            name: name.to_string(),
            year,
            uploaded_at: Utc::now(),
            blob_key: document_blob_key(&document_id, &filename),
            filename,
            file_hash: upload_fingerprint(&content),
            status: DocumentStatus::Pending,
            picture_count: 0,
        };

        self.metadata.insert_document(&document)?;
        let ingestion = self.register_ingestion(&document_id);

        if let Err(e) = self.blobs.put(&document.blob_key, &content) {
            error!(
                doc_id = %document_id,
                key = %document.blob_key,
                error = %format_error_chain(&e),
                "Failed to store original file; removing document record"
            );
            if let Err(cleanup) = self.metadata.delete_document(&document_id) {
                error!(
                    doc_id = %document_id,
                    error = %format_error_chain(&cleanup),
                    "Failed to remove document record after blob write failure"
                );
            }
            return Err(e.into());
        }
        drop(content);

        info!(
            doc_id = %document_id,
            account_id = %account_id,
            pages = source.page_count(),
            size = size,
            "Document stored; extracting pictures"
        );

        let stored = self
            .process_pictures(&document_id, source, &ingestion.token)
            .await;

        if ingestion.token.is_cancelled() {
            warn!(doc_id = %document_id, stored = stored, "Ingestion stopped by document deletion");
            return Err(ServiceError::IngestionCancelled { document_id });
        }

        self.metadata
            .set_document_status(&document_id, DocumentStatus::Ready)?;

        info!(doc_id = %document_id, pictures = stored, "Document ingested");

        Ok(document_id)
    }

    /// Describe, classify and store every picture of a document.
    /// Returns the number of pictures stored.
    async fn process_pictures(
        &self,
        document_id: &str,
        source: PdfSource,
        token: &CancellationToken,
    ) -> usize {
        let concurrency = self.config.description_concurrency.max(1);

        // Extraction runs on a blocking thread and hands pictures over one at a
        // time, so at most `concurrency` decoded pictures wait in memory.
        let (tx, rx) = mpsc::channel::<ExtractedPicture>(concurrency);
        let extraction_token = token.clone();
        let extraction = tokio::task::spawn_blocking(move || {
            for picture in source.pictures() {
                if extraction_token.is_cancelled() || tx.blocking_send(picture).is_err() {
                    break;
                }
            }
        });

        let incoming = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|picture| (picture, rx))
        });
        let mut described = incoming
            .map(move |picture| async move {
                let result = self
                    .describer
                    .describe(&picture.data, picture.encoding)
                    .await;
                (picture, result)
            })
            .buffer_unordered(concurrency)
            .boxed();

        let mut stored = 0;
        while let Some((picture, result)) = described.next().await {
            if token.is_cancelled() {
                break;
            }

            let description = match result {
                Ok(description) => description,
                Err(e) => {
                    warn!(
                        doc_id = %document_id,
                        page = picture.page_number,
                        image_index = picture.image_index,
                        error = %format_error_chain(&e),
                        "Picture description unavailable; skipping"
                    );
                    continue;
                }
            };

            if !is_content_bearing(self.classifier.as_ref(), &description) {
                debug!(
                    doc_id = %document_id,
                    page = picture.page_number,
                    image_index = picture.image_index,
                    "Picture is not content-bearing; skipping"
                );
                continue;
            }

            if self.store_picture(document_id, &picture, description, token) {
                stored += 1;
            }
        }

        // Closing the channel stops extraction early when we broke out
        drop(described);
        if let Err(e) = extraction.await {
            warn!(doc_id = %document_id, error = %e, "Picture extraction task failed");
        }

        stored
    }

    /// Write a picture blob and its record. Either both land or neither does.
    fn store_picture(
        &self,
        document_id: &str,
        picture: &ExtractedPicture,
        description: String,
        token: &CancellationToken,
    ) -> bool {
        let key = picture_blob_key(
            document_id,
            picture.page_number,
            picture.image_index,
            picture.encoding,
        );

        if let Err(e) = self.blobs.put(&key, &picture.data) {
            warn!(
                doc_id = %document_id,
                key = %key,
                error = %format_error_chain(&e),
                "Failed to store picture; skipping"
            );
            return false;
        }

        let record = Picture {
            id: Uuid::new_v4().to_string(),
            document_id: document_id.to_string(),
            page_number: picture.page_number,
            image_index: picture.image_index,
            blob_key: key.clone(),
            mime_type: picture.encoding.mime_type().to_string(),
            description,
            created_at: Utc::now(),
        };

        if let Err(e) = self.metadata.insert_picture(&record) {
            warn!(
                doc_id = %document_id,
                key = %key,
                error = %format_error_chain(&e),
                "Failed to record picture; removing its blob"
            );
            self.remove_blob(&key);
            return false;
        }

        if token.is_cancelled() {
            // The document was deleted while this picture was being written
            warn!(
                doc_id = %document_id,
                picture_id = %record.id,
                "Picture landed after document deletion started; removing it"
            );
            if let Err(e) = self.metadata.delete_picture(&record.id) {
                warn!(
                    picture_id = %record.id,
                    error = %format_error_chain(&e),
                    "Orphaned picture record left behind"
                );
            }
            self.remove_blob(&key);
            return false;
        }

        debug!(
            doc_id = %document_id,
            picture_id = %record.id,
            page = record.page_number,
            image_index = record.image_index,
            "Picture stored"
        );
        true
    }
}

fn parse_year(value: &str) -> ServiceResult<i32> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ServiceError::InvalidInput {
            message: "Year is required".to_string(),
        });
    }

    value.parse().map_err(|_| ServiceError::InvalidInput {
        message: format!("Year must be a whole number: {}", value),
    })
}
