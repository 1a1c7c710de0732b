use std::collections::HashSet;
use std::sync::Arc;

use super::cache::IndexCache;
use super::embedding::{EmbeddingIndex, EmbeddingModel};
use super::lexical::LexicalIndex;
use super::store::FragmentStore;
use super::types::SimilarityIndex;
use super::GroundingError;
use crate::grounding_config::{GroundingConfig, IndexBackend, LexicalOrdering};
use crate::models::{Claim, DocumentId, Fragment, LocatedCitation};

/// Citations plus the reasons the remaining claims were left out.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroundingReport {
    pub citations: Vec<LocatedCitation>,
    /// Excluded by the code filter.
    pub filtered: usize,
    /// No asserted sentence to search for.
    pub without_sentence: usize,
    /// Searched, but no fragment matched.
    pub unmatched: usize,
}

/// How indexes get built. Fixed when the resolver is constructed.
#[derive(Clone)]
enum IndexFactory {
    Lexical(LexicalOrdering),
    Embedding {
        embedder: Arc<dyn EmbeddingModel>,
        top_k: usize,
        min_score: f32,
    },
}

/// Maps claims onto the fragments that evidence them.
#[derive(Clone)]
pub struct GroundingResolver {
    factory: IndexFactory,
    cache: Option<Arc<IndexCache>>,
}

impl Default for GroundingResolver {
    fn default() -> Self {
        Self::new(&GroundingConfig::default(), None)
    }
}

impl GroundingResolver {
    /// Pick the index backend once. Asking for embeddings without a model
    /// falls back to the lexical index.
    pub fn new(config: &GroundingConfig, embedder: Option<Arc<dyn EmbeddingModel>>) -> Self {
        let factory = match (config.backend, embedder) {
            (IndexBackend::Embedding, Some(embedder)) => IndexFactory::Embedding {
                embedder,
                top_k: config.top_k,
                min_score: config.min_score,
            },
            (IndexBackend::Embedding, None) => {
                tracing::warn!("Embedding backend requested without an embedding model, using lexical index");
                IndexFactory::Lexical(config.lexical_ordering)
            }
            (IndexBackend::Lexical, _) => IndexFactory::Lexical(config.lexical_ordering),
        };

        Self {
            factory,
            cache: None,
        }
    }

    /// Reuse indexes across calls, keyed by document id. A cached index whose
    /// indexed fragment count differs from the current call's is rebuilt.
    pub fn with_cache(mut self, cache: Arc<IndexCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Backend actually in use after any fallback.
    pub fn backend(&self) -> IndexBackend {
        match self.factory {
            IndexFactory::Lexical(_) => IndexBackend::Lexical,
            IndexFactory::Embedding { .. } => IndexBackend::Embedding,
        }
    }

    pub fn build_index(&self, store: &FragmentStore) -> Result<Arc<dyn SimilarityIndex>, GroundingError> {
        Ok(match &self.factory {
            IndexFactory::Lexical(ordering) => Arc::new(LexicalIndex::build(store, *ordering)?),
            IndexFactory::Embedding {
                embedder,
                top_k,
                min_score,
            } => Arc::new(EmbeddingIndex::build(
                store,
                Arc::clone(embedder),
                *top_k,
                *min_score,
            )?),
        })
    }

    /// Ground `claims` against one document's `fragments`.
    ///
    /// Output follows claim order. Claims outside a non-empty `code_filter`,
    /// claims without an asserted sentence, and claims nothing matches are
    /// dropped. Fails only when the index cannot be built, in which case no
    /// citations are returned.
    pub fn resolve(
        &self,
        document_id: &DocumentId,
        fragments: &[Fragment],
        claims: &[Claim],
        code_filter: Option<&[String]>,
    ) -> Result<Vec<LocatedCitation>, GroundingError> {
        self.resolve_with_report(document_id, fragments, claims, code_filter)
            .map(|report| report.citations)
    }

    pub fn resolve_with_report(
        &self,
        document_id: &DocumentId,
        fragments: &[Fragment],
        claims: &[Claim],
        code_filter: Option<&[String]>,
    ) -> Result<GroundingReport, GroundingError> {
        if let Some(first) = fragments.first() {
            if first.document_id != *document_id {
                return Err(GroundingError::InvalidInput(format!(
                    "fragments belong to document {}, not {}",
                    first.document_id, document_id
                )));
            }
        }

        // Validated on every call, cache hit or not.
        let store = FragmentStore::load(fragments.iter().cloned());
        let indexed = store.indexable()?.len();

        // An empty store is never cached: OCR may still deliver the lines later.
        let index = match &self.cache {
            Some(cache) if indexed > 0 => cache.get_or_rebuild(
                *document_id,
                |cached| cached.len() == indexed,
                || self.build_index(&store),
            )?,
            _ => self.build_index(&store)?,
        };

        let filter: Option<HashSet<&str>> = code_filter
            .filter(|codes| !codes.is_empty())
            .map(|codes| codes.iter().map(String::as_str).collect());

        let mut report = GroundingReport::default();

        for claim in claims {
            if let Some(allowed) = &filter {
                if !allowed.contains(claim.code.as_str()) {
                    tracing::debug!(code = %claim.code, "Claim excluded by code filter");
                    report.filtered += 1;
                    continue;
                }
            }

            if claim.asserted_sentence.trim().is_empty() {
                tracing::debug!(code = %claim.code, "Claim has no asserted sentence");
                report.without_sentence += 1;
                continue;
            }

            let matches = index.query(&claim.asserted_sentence)?;
            match matches.first() {
                Some(best) => {
                    tracing::debug!(
                        code = %claim.code,
                        page = best.fragment.page,
                        position = best.position,
                        score = best.score,
                        "Claim grounded"
                    );
                    report.citations.push(LocatedCitation::locate(claim, &best.fragment));
                }
                None => {
                    tracing::debug!(code = %claim.code, "No fragment matches asserted sentence");
                    report.unmatched += 1;
                }
            }
        }

        tracing::info!(
            document_id = %document_id,
            backend = index.backend().as_str(),
            fragments = fragments.len(),
            claims = claims.len(),
            citations = report.citations.len(),
            filtered = report.filtered,
            without_sentence = report.without_sentence,
            unmatched = report.unmatched,
            "Grounding complete"
        );

        Ok(report)
    }
}

/// Ground claims with the default lexical index, rebuilt for this call.
pub fn resolve(
    document_id: &DocumentId,
    fragments: &[Fragment],
    claims: &[Claim],
    code_filter: Option<&[String]>,
) -> Result<Vec<LocatedCitation>, GroundingError> {
    GroundingResolver::default().resolve(document_id, fragments, claims, code_filter)
}
