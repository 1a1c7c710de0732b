use std::cmp::Reverse;
use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use super::store::FragmentStore;
use super::types::{is_blank_query, Match, SimilarityIndex};
use super::GroundingError;
use crate::grounding_config::{IndexBackend, LexicalOrdering};
use crate::models::Fragment;

/// Maximal runs of letters or digits. Punctuation and whitespace separate tokens.
static TOKEN_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\p{L}\p{N}]+").unwrap());

/// Lowercased distinct word tokens of `text`.
pub fn tokenize(text: &str) -> HashSet<String> {
    TOKEN_PATTERN
        .find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .collect()
}

struct LexicalEntry {
    position: usize,
    fragment: Fragment,
    tokens: HashSet<String>,
}

/// Token-overlap index. Needs no model and no network.
///
/// A fragment matches when it shares at least one token with the query.
/// Ranking depends on [`LexicalOrdering`]; either way, fragments with equal
/// rank keep their Fragment Store order.
pub struct LexicalIndex {
    entries: Vec<LexicalEntry>,
    ordering: LexicalOrdering,
}

impl LexicalIndex {
    pub fn build(store: &FragmentStore, ordering: LexicalOrdering) -> Result<Self, GroundingError> {
        let entries: Vec<LexicalEntry> = store
            .indexable()?
            .into_iter()
            .map(|(position, fragment)| LexicalEntry {
                position,
                tokens: tokenize(&fragment.text),
                fragment: fragment.clone(),
            })
            .collect();

        tracing::debug!(
            fragments = store.len(),
            indexed = entries.len(),
            ordering = ordering.as_str(),
            "Lexical index built"
        );

        Ok(Self { entries, ordering })
    }

    pub fn ordering(&self) -> LexicalOrdering {
        self.ordering
    }
}

impl SimilarityIndex for LexicalIndex {
    fn query(&self, text: &str) -> Result<Vec<Match>, GroundingError> {
        if is_blank_query(text) {
            return Ok(Vec::new());
        }

        let query_tokens = tokenize(text);
        let mut hits: Vec<(usize, Match)> = self
            .entries
            .iter()
            .filter_map(|entry| {
                let shared = query_tokens
                    .iter()
                    .filter(|t| entry.tokens.contains(*t))
                    .count();
                (shared > 0).then(|| {
                    (
                        shared,
                        Match {
                            position: entry.position,
                            score: shared as f32,
                            fragment: entry.fragment.clone(),
                        },
                    )
                })
            })
            .collect();

        if self.ordering == LexicalOrdering::SharedTokens {
            // Stable: equal overlap keeps store order.
            hits.sort_by_key(|(shared, _)| Reverse(*shared));
        }

        Ok(hits.into_iter().map(|(_, m)| m).collect())
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn backend(&self) -> IndexBackend {
        IndexBackend::Lexical
    }
}
