use std::collections::HashSet;
use std::sync::Arc;

use super::lexical::tokenize;
use super::store::FragmentStore;
use super::types::{is_blank_query, Match, SimilarityIndex};
use super::GroundingError;
use crate::grounding_config::IndexBackend;
use crate::models::Fragment;

/// Dimension of all-MiniLM-L6-v2, also the hashing embedder's default.
pub const EMBEDDING_DIM: usize = 384;

/// Text → vector model backing the [`EmbeddingIndex`].
pub trait EmbeddingModel: Send + Sync {
    fn embed(&self, text: &str) -> Result<Vec<f32>, GroundingError>;
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, GroundingError>;
    fn dimension(&self) -> usize;

    /// Whether similarity in this model's space requires a shared token.
    /// When true, a positive score between token-disjoint texts is a hash
    /// collision and the index discards it.
    fn token_gated(&self) -> bool {
        false
    }
}

// ═══════════════════════════════════════════════════════════
// Hashing embedder (local, deterministic)
// ═══════════════════════════════════════════════════════════

/// Bag-of-words embedder using the signed hashing trick.
///
/// Each distinct lowercase token lands in one bucket with a sign taken from
/// its hash. Identical token sets embed identically; disjoint sets are
/// near-orthogonal. No model files, no network.
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(EMBEDDING_DIM)
    }
}

impl EmbeddingModel for HashingEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, GroundingError> {
        let mut vec = vec![0.0f32; self.dimension];
        for token in tokenize(text) {
            let h = fnv1a(token.as_bytes());
            let bucket = (h % self.dimension as u64) as usize;
            let sign = if h >> 63 == 0 { 1.0 } else { -1.0 };
            vec[bucket] += sign;
        }
        l2_normalize(&mut vec);
        Ok(vec)
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, GroundingError> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn token_gated(&self) -> bool {
        true
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    bytes
        .iter()
        .fold(OFFSET, |h, &b| (h ^ b as u64).wrapping_mul(PRIME))
}

fn l2_normalize(vec: &mut [f32]) {
    let norm: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for val in vec.iter_mut() {
            *val /= norm;
        }
    }
}

pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

// ═══════════════════════════════════════════════════════════
// ONNX embedder (behind the `onnx-embeddings` feature)
// ═══════════════════════════════════════════════════════════

#[cfg(feature = "onnx-embeddings")]
mod onnx {
    use super::{l2_normalize, EmbeddingModel, GroundingError, EMBEDDING_DIM};
    use ort::session::Session;
    use std::path::Path;
    use std::sync::Mutex;

    /// all-MiniLM-L6-v2 through ONNX Runtime.
    ///
    /// `model_dir` must hold `model.onnx` and `tokenizer.json`. The session
    /// sits behind a Mutex because `Session::run` takes `&mut self`.
    pub struct OnnxEmbedder {
        session: Mutex<Session>,
        tokenizer: tokenizers::Tokenizer,
    }

    impl OnnxEmbedder {
        pub fn load(model_dir: &Path) -> Result<Self, GroundingError> {
            let model_path = model_dir.join("model.onnx");
            let tokenizer_path = model_dir.join("tokenizer.json");

            for path in [&model_path, &tokenizer_path] {
                if !path.exists() {
                    return Err(GroundingError::ModelNotFound(path.clone()));
                }
            }

            let session = Session::builder()
                .map_err(|e: ort::Error| GroundingError::ModelInit(e.to_string()))?
                .with_intra_threads(2)
                .map_err(|e: ort::Error| GroundingError::ModelInit(e.to_string()))?
                .commit_from_file(&model_path)
                .map_err(|e: ort::Error| GroundingError::ModelInit(format!("ONNX load failed: {e}")))?;

            let tokenizer = tokenizers::Tokenizer::from_file(&tokenizer_path)
                .map_err(|e| GroundingError::ModelInit(format!("Tokenizer load failed: {e}")))?;

            tracing::info!(model_dir = %model_dir.display(), "ONNX embedder loaded");

            Ok(Self {
                session: Mutex::new(session),
                tokenizer,
            })
        }

        fn infer(&self, text: &str) -> Result<Vec<f32>, GroundingError> {
            use ort::value::TensorRef;

            let encoding = self
                .tokenizer
                .encode(text, true)
                .map_err(|e| GroundingError::Tokenization(e.to_string()))?;

            let to_i64 = |v: &[u32]| v.iter().map(|&x| x as i64).collect::<Vec<i64>>();
            let input_ids = to_i64(encoding.get_ids());
            let attention_mask = to_i64(encoding.get_attention_mask());
            let token_type_ids = to_i64(encoding.get_type_ids());
            let seq_len = input_ids.len();

            let ids_array = ndarray::Array2::from_shape_vec((1, seq_len), input_ids)
                .map_err(|e| GroundingError::Embedding(e.to_string()))?;
            let mask_array = ndarray::Array2::from_shape_vec((1, seq_len), attention_mask.clone())
                .map_err(|e| GroundingError::Embedding(e.to_string()))?;
            let type_array = ndarray::Array2::from_shape_vec((1, seq_len), token_type_ids)
                .map_err(|e| GroundingError::Embedding(e.to_string()))?;

            let ids = TensorRef::from_array_view(&ids_array)
                .map_err(|e| GroundingError::Embedding(e.to_string()))?;
            let mask = TensorRef::from_array_view(&mask_array)
                .map_err(|e| GroundingError::Embedding(e.to_string()))?;
            let types = TensorRef::from_array_view(&type_array)
                .map_err(|e| GroundingError::Embedding(e.to_string()))?;

            let mut session = self
                .session
                .lock()
                .map_err(|_| GroundingError::Embedding("Session lock poisoned".to_string()))?;

            let outputs = session
                .run(ort::inputs![ids, mask, types])
                .map_err(|e| GroundingError::Embedding(format!("ONNX inference failed: {e}")))?;

            let (shape, hidden) = outputs[0]
                .try_extract_tensor::<f32>()
                .map_err(|e| GroundingError::Embedding(format!("Output extraction: {e}")))?;

            mean_pool(&shape[..], hidden, &attention_mask)
        }
    }

    /// Mask-weighted mean over the token axis of a `[1, seq_len, DIM]`
    /// hidden-state tensor, L2-normalized.
    fn mean_pool(
        dims: &[i64],
        hidden: &[f32],
        attention_mask: &[i64],
    ) -> Result<Vec<f32>, GroundingError> {
        let seq_len = attention_mask.len();
        let expected = [1, seq_len as i64, EMBEDDING_DIM as i64];
        if dims != expected.as_slice() || hidden.len() != seq_len * EMBEDDING_DIM {
            return Err(GroundingError::Embedding(format!(
                "Unexpected output shape: {dims:?} ({} values), expected {expected:?}",
                hidden.len()
            )));
        }

        let mut pooled = vec![0.0f32; EMBEDDING_DIM];
        let mut mask_sum = 0.0f32;
        for (row, &m) in hidden.chunks_exact(EMBEDDING_DIM).zip(attention_mask) {
            let m = m as f32;
            mask_sum += m;
            for (p, h) in pooled.iter_mut().zip(row) {
                *p += h * m;
            }
        }
        if mask_sum > 0.0 {
            pooled.iter_mut().for_each(|v| *v /= mask_sum);
        }

        l2_normalize(&mut pooled);
        Ok(pooled)
    }

    impl EmbeddingModel for OnnxEmbedder {
        fn embed(&self, text: &str) -> Result<Vec<f32>, GroundingError> {
            self.infer(text)
        }

        fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, GroundingError> {
            texts.iter().map(|t| self.infer(t)).collect()
        }

        fn dimension(&self) -> usize {
            EMBEDDING_DIM
        }
    }

}

#[cfg(feature = "onnx-embeddings")]
pub use onnx::OnnxEmbedder;

// ═══════════════════════════════════════════════════════════
// Embedding index
// ═══════════════════════════════════════════════════════════

struct EmbeddedFragment {
    position: usize,
    fragment: Fragment,
    embedding: Vec<f32>,
    /// Kept only for token-gated models.
    tokens: Option<HashSet<String>>,
}

/// Cosine-similarity index. Fragments are embedded once at build.
///
/// Results keep only scores above `min_score`, sorted by score descending.
/// The sort is stable, so equal scores keep store order. At most `top_k`
/// matches are returned. For token-gated models a fragment must also share
/// a token with the query.
pub struct EmbeddingIndex {
    entries: Vec<EmbeddedFragment>,
    embedder: Arc<dyn EmbeddingModel>,
    top_k: usize,
    min_score: f32,
}

impl EmbeddingIndex {
    pub fn build(
        store: &FragmentStore,
        embedder: Arc<dyn EmbeddingModel>,
        top_k: usize,
        min_score: f32,
    ) -> Result<Self, GroundingError> {
        let indexable = store.indexable()?;
        let texts: Vec<&str> = indexable.iter().map(|(_, f)| f.text.as_str()).collect();
        let embeddings = if texts.is_empty() {
            Vec::new()
        } else {
            embedder.embed_batch(&texts)?
        };

        if embeddings.len() != indexable.len() {
            return Err(GroundingError::Embedding(format!(
                "embedder returned {} vectors for {} fragments",
                embeddings.len(),
                indexable.len()
            )));
        }

        let dimension = embedder.dimension();
        let gated = embedder.token_gated();
        let entries = indexable
            .into_iter()
            .zip(embeddings)
            .map(|((position, fragment), embedding)| {
                if embedding.len() != dimension {
                    return Err(GroundingError::Embedding(format!(
                        "fragment {position}: expected dimension {dimension}, got {}",
                        embedding.len()
                    )));
                }
                Ok(EmbeddedFragment {
                    position,
                    tokens: gated.then(|| tokenize(&fragment.text)),
                    fragment: fragment.clone(),
                    embedding,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(
            fragments = store.len(),
            indexed = entries.len(),
            dimension,
            top_k,
            min_score,
            gated,
            "Embedding index built"
        );

        Ok(Self {
            entries,
            embedder,
            top_k,
            min_score,
        })
    }
}

impl SimilarityIndex for EmbeddingIndex {
    fn query(&self, text: &str) -> Result<Vec<Match>, GroundingError> {
        if is_blank_query(text) || self.entries.is_empty() {
            return Ok(Vec::new());
        }

        let query_embedding = self.embedder.embed(text)?;
        let query_tokens = self.embedder.token_gated().then(|| tokenize(text));

        let mut scored: Vec<Match> = self
            .entries
            .iter()
            .filter(|entry| match (&query_tokens, &entry.tokens) {
                (Some(query), Some(tokens)) => !query.is_disjoint(tokens),
                _ => true,
            })
            .map(|entry| Match {
                position: entry.position,
                score: cosine_similarity(&query_embedding, &entry.embedding),
                fragment: entry.fragment.clone(),
            })
            .filter(|m| m.score > self.min_score)
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(self.top_k);

        Ok(scored)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn backend(&self) -> IndexBackend {
        IndexBackend::Embedding
    }
}
