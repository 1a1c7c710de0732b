use super::GroundingError;
use crate::grounding_config::IndexBackend;
use crate::models::Fragment;

/// A fragment returned by an index query.
#[derive(Debug, Clone, PartialEq)]
pub struct Match {
    /// Position of the fragment in Fragment Store order.
    pub position: usize,
    /// Backend-specific relevance: shared token count (lexical) or cosine
    /// similarity (embedding). Higher is better.
    pub score: f32,
    pub fragment: Fragment,
}

/// Ranked lookup over one document's fragments.
///
/// Implementations must return an empty list for an empty or
/// whitespace-only query, and must be pure functions of the indexed
/// fragments and the query text.
pub trait SimilarityIndex: Send + Sync {
    fn query(&self, text: &str) -> Result<Vec<Match>, GroundingError>;

    /// Number of indexed (non-blank) fragments.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn backend(&self) -> IndexBackend;
}

/// Blank queries never match anything, whatever the backend.
pub(crate) fn is_blank_query(text: &str) -> bool {
    text.trim().is_empty()
}
