use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use serde::Deserialize;
use uuid::Uuid;

use groundcite::models::{BoundingBox, Claim, DocumentId, Fragment, LocatedCitation};
use groundcite::pipeline::collaborators::{
    ClaimExtractor, FragmentSource, OcrOutput, SampleClaimExtractor, SampleFragmentSource,
};
use groundcite::pipeline::grounding::{EmbeddingModel, FragmentStore, GroundingResolver, HashingEmbedder};
use groundcite::{GroundingConfig, IndexBackend, LexicalOrdering};

const DEMO_DOCUMENT_NAME: &str = "sample-clinical-note.png";

/// Input of the `ground` command.
#[derive(Debug, Deserialize)]
struct GroundRequest {
    /// Any opaque string; UUIDs are used as-is.
    #[serde(default)]
    document_id: Option<String>,
    document_name: String,
    #[serde(default)]
    fragments: Vec<RequestFragment>,
    #[serde(default)]
    claims: Vec<Claim>,
    #[serde(default)]
    code_filter: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct RequestFragment {
    page: u32,
    text: String,
    #[serde(alias = "bounding_box")]
    bbox: BoundingBox,
}

impl GroundRequest {
    /// The request's id if it is a UUID, otherwise a v5 UUID of the given
    /// id (or of the document name when none is given), so repeated runs agree.
    fn resolved_document_id(&self) -> DocumentId {
        let key = self.document_id.as_deref().unwrap_or(self.document_name.as_str());
        Uuid::parse_str(key).unwrap_or_else(|_| Uuid::new_v5(&Uuid::NAMESPACE_URL, key.as_bytes()))
    }

    fn into_parts(self) -> (DocumentId, Vec<Fragment>, Vec<Claim>, Option<Vec<String>>) {
        let document_id = self.resolved_document_id();
        let document_name = self.document_name;
        let fragments = self
            .fragments
            .into_iter()
            .map(|f| Fragment {
                document_id,
                document_name: document_name.clone(),
                page: f.page,
                text: f.text,
                bounding_box: f.bbox,
            })
            .collect();
        (document_id, fragments, self.claims, self.code_filter)
    }
}

/// Environment config with CLI flags layered on top.
pub fn load_config(
    backend: Option<IndexBackend>,
    ordering: Option<LexicalOrdering>,
) -> anyhow::Result<GroundingConfig> {
    let mut config = GroundingConfig::from_env().context("Invalid grounding configuration")?;
    if let Some(backend) = backend {
        config.backend = backend;
    }
    if let Some(ordering) = ordering {
        config.lexical_ordering = ordering;
    }
    Ok(config)
}

pub fn build_resolver(config: &GroundingConfig) -> GroundingResolver {
    let embedder = match config.backend {
        IndexBackend::Embedding => Some(load_embedder()),
        IndexBackend::Lexical => None,
    };
    GroundingResolver::new(config, embedder)
}

/// ONNX model from the models directory when built with `onnx-embeddings`
/// and the files are present, else the hashing embedder.
fn load_embedder() -> Arc<dyn EmbeddingModel> {
    #[cfg(feature = "onnx-embeddings")]
    {
        if let Some(dir) = groundcite::config::embedding_model_dir() {
            match groundcite::pipeline::grounding::embedding::OnnxEmbedder::load(&dir) {
                Ok(embedder) => return Arc::new(embedder),
                Err(e) => tracing::warn!(error = %e, "ONNX embedder unavailable, using hashing embedder"),
            }
        }
    }

    Arc::new(HashingEmbedder::default())
}

/// Request text from `path`, or stdin when `path` is "-".
pub fn read_request(path: &Path) -> anyhow::Result<String> {
    if path.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read request from stdin")?;
        return Ok(buf);
    }
    std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read request file {}", path.display()))
}

/// Split "E11.9, I10" into trimmed, non-empty codes.
fn parse_codes(codes: &str) -> Vec<String> {
    codes
        .split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(String::from)
        .collect()
}

pub fn run_ground(
    resolver: &GroundingResolver,
    raw_request: &str,
    codes: Option<&str>,
) -> anyhow::Result<Vec<LocatedCitation>> {
    let request: GroundRequest =
        serde_json::from_str(raw_request).context("Malformed grounding request")?;
    let (document_id, fragments, claims, request_filter) = request.into_parts();
    let code_filter = codes.map(parse_codes).or(request_filter);

    let citations = resolver
        .resolve(&document_id, &fragments, &claims, code_filter.as_deref())
        .context("Grounding failed")?;
    Ok(citations)
}

/// Sample OCR, then sample extraction over its text, then grounding.
/// A failing collaborator contributes nothing rather than aborting.
pub fn run_demo(resolver: &GroundingResolver, codes: Option<&str>) -> anyhow::Result<Vec<LocatedCitation>> {
    let document_id = Uuid::new_v5(&Uuid::NAMESPACE_URL, DEMO_DOCUMENT_NAME.as_bytes());

    let fragments = match SampleFragmentSource.recognize(&document_id, DEMO_DOCUMENT_NAME, &[]) {
        Ok(OcrOutput { fragments, page }) => {
            tracing::info!(
                lines = fragments.len(),
                width = page.width,
                height = page.height,
                "Sample OCR complete"
            );
            fragments
        }
        Err(e) => {
            tracing::warn!(error = %e, "OCR failed, continuing without fragments");
            Vec::new()
        }
    };

    let text = FragmentStore::load(fragments.iter().cloned()).full_text();
    let claims = SampleClaimExtractor.extract(&text).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Claim extraction failed, continuing without claims");
        Vec::new()
    });

    let code_filter = codes.map(parse_codes);
    let citations = resolver
        .resolve(&document_id, &fragments, &claims, code_filter.as_deref())
        .context("Grounding failed")?;
    Ok(citations)
}
