//! Service coordinator: ingestion, cascading deletion, queries and accounts.

mod accounts;
mod cancellation;
mod ingest;
mod lifecycle;
mod queries;

pub use accounts::AccountProfile;
pub use ingest::DocumentUpload;
pub use queries::{DocumentFile, PictureData};

use dashmap::DashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::IngestionConfig;
use crate::filter::ContentClassifier;
use crate::storage::{BlobStore, MetadataStore};
use crate::vision::DescriptionClient;

/// Main service coordinator.
///
/// Every collaborator is injected, so tests can run against isolated stores
/// and stub description clients.
pub struct FolioService {
    metadata: Arc<dyn MetadataStore>,
    blobs: Arc<dyn BlobStore>,
    describer: Arc<dyn DescriptionClient>,
    classifier: Arc<dyn ContentClassifier>,
    config: IngestionConfig,
    /// Documents currently being ingested, keyed by document id
    ingesting: DashMap<String, CancellationToken>,
}

impl FolioService {
    pub fn new(
        metadata: Arc<dyn MetadataStore>,
        blobs: Arc<dyn BlobStore>,
        describer: Arc<dyn DescriptionClient>,
        classifier: Arc<dyn ContentClassifier>,
        config: IngestionConfig,
    ) -> Self {
        info!(
            max_document_size = config.max_document_size_bytes,
            description_concurrency = config.description_concurrency,
            "Initializing document service"
        );

        Self {
            metadata,
            blobs,
            describer,
            classifier,
            config,
            ingesting: DashMap::new(),
        }
    }

    pub fn max_document_size(&self) -> u64 {
        self.config.max_document_size_bytes
    }
}
