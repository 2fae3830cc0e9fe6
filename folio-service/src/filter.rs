//! Classification of picture descriptions.
//!
//! Pictures whose description reads like a logo, letterhead or institutional
//! insignia are dropped during ingestion. The classifier is a trait so the
//! keyword heuristic can be swapped for something smarter.

/// Decides whether a description marks its picture as non-content
pub trait ContentClassifier: Send + Sync {
    /// `true` when the picture should be discarded
    fn classifies(&self, description: &str) -> bool;
}

/// Keywords that mark institutional imagery
pub const DEFAULT_LOGO_KEYWORDS: &[&str] = &["logo", "insignia", "press", "university", "institute"];

/// Case-insensitive substring match against a keyword list
#[derive(Debug, Clone)]
pub struct KeywordFilter {
    keywords: Vec<String>,
}

impl KeywordFilter {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keywords = keywords
            .into_iter()
            .map(|k| k.as_ref().trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();

        Self { keywords }
    }
}

impl Default for KeywordFilter {
    fn default() -> Self {
        Self::new(DEFAULT_LOGO_KEYWORDS)
    }
}

impl ContentClassifier for KeywordFilter {
    fn classifies(&self, description: &str) -> bool {
        let lowered = description.to_lowercase();
        self.keywords.iter().any(|k| lowered.contains(k.as_str()))
    }
}

/// Whether a description is worth keeping as a picture record
pub fn is_content_bearing(classifier: &dyn ContentClassifier, description: &str) -> bool {
    !description.trim().is_empty() && !classifier.classifies(description)
}
