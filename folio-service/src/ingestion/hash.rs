//! Fingerprints of uploaded originals, stored as `documents.file_hash`.

use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 of an upload
pub fn upload_fingerprint(content: &[u8]) -> String {
    Sha256::digest(content)
        .iter()
        .map(|byte| format!("{:02x}", byte))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_upload_fingerprint() {
        assert_eq!(
            upload_fingerprint(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_fingerprint_tracks_content() {
        let original = upload_fingerprint(b"%PDF-1.7 original");
        assert_eq!(original.len(), 64);
        assert_eq!(original, upload_fingerprint(b"%PDF-1.7 original"));
        assert_ne!(original, upload_fingerprint(b"%PDF-1.7 revised"));
    }
}
