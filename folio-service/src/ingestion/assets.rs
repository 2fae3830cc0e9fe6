//! Blob key generation and filename utilities.

use super::pdf::PictureEncoding;

/// Sanitize a string for use as a filename
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_whitespace() || c.is_control() => '_',
            c => c,
        })
        .collect::<String>()
        .trim_matches(|c| c == '_' || c == '.')
        .to_string()
}

/// Key of an uploaded document's original file.
///
/// Scoped by document id so two uploads with the same filename never share a blob.
pub fn document_blob_key(document_id: &str, filename: &str) -> String {
    let sanitized = sanitize_filename(filename);
    let name = if sanitized.is_empty() {
        "document.pdf"
    } else {
        sanitized.as_str()
    };
    format!("documents/{}/{}", document_id, name)
}

/// Key of an extracted picture, e.g. `pictures/{doc}/page3_img2.jpg`
pub fn picture_blob_key(
    document_id: &str,
    page_number: u32,
    image_index: u32,
    encoding: PictureEncoding,
) -> String {
    format!(
        "pictures/{}/page{}_img{}.{}",
        document_id,
        page_number,
        image_index,
        encoding.extension()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("Hello World.pdf"), "Hello_World.pdf");
        assert_eq!(sanitize_filename("../../etc/passwd"), "etc_passwd");
        assert_eq!(sanitize_filename("  spaces  "), "spaces");
    }

    #[test]
    fn test_document_blob_key() {
        assert_eq!(
            document_blob_key("d1", "Annual Report.pdf"),
            "documents/d1/Annual_Report.pdf"
        );
        assert_eq!(document_blob_key("d1", ".."), "documents/d1/document.pdf");
    }

    #[test]
    fn test_picture_blob_key() {
        assert_eq!(
            picture_blob_key("d1", 3, 2, PictureEncoding::Jpeg),
            "pictures/d1/page3_img2.jpg"
        );
        assert_eq!(
            picture_blob_key("d1", 1, 1, PictureEncoding::Png),
            "pictures/d1/page1_img1.png"
        );
    }
}
