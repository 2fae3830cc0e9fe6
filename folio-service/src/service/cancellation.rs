//! In-flight ingestion tracking.

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::service::FolioService;

/// Removes a document from the in-flight table when ingestion ends, however it ends
pub(crate) struct IngestionGuard<'a> {
    service: &'a FolioService,
    document_id: String,
    pub token: CancellationToken,
}

impl Drop for IngestionGuard<'_> {
    fn drop(&mut self) {
        self.service
            .ingesting
            .remove_if(&self.document_id, |_, token| !token.is_cancelled());
    }
}

impl FolioService {
    /// Register a document as being ingested.
    pub(crate) fn register_ingestion(&self, document_id: &str) -> IngestionGuard<'_> {
        let token = CancellationToken::new();
        self.ingesting
            .insert(document_id.to_string(), token.clone());

        IngestionGuard {
            service: self,
            document_id: document_id.to_string(),
            token,
        }
    }

    /// Stop ingestion of a document if it is in progress.
    pub(crate) fn cancel_ingestion(&self, document_id: &str) -> bool {
        if let Some((_, token)) = self.ingesting.remove(document_id) {
            token.cancel();
            warn!(
                doc_id = %document_id,
                "Deleting a document that is still being ingested; pictures written concurrently may be orphaned"
            );
            true
        } else {
            false
        }
    }

    /// Whether a document is currently being ingested.
    pub fn is_ingesting(&self, document_id: &str) -> bool {
        self.ingesting.contains_key(document_id)
    }

    /// Cancel every in-flight ingestion, e.g. on shutdown.
    pub fn cancel_all_ingestions(&self) {
        let count = self.ingesting.len();
        for entry in self.ingesting.iter() {
            entry.value().cancel();
        }
        self.ingesting.clear();

        if count > 0 {
            info!(count = count, "Cancelled in-flight ingestions");
        }
    }
}
