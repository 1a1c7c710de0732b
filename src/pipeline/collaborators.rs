//! Boundaries to the OCR and claim-extraction services.
//!
//! Grounding only consumes their output: an ordered fragment list with page
//! dimensions, and a claim list. The sample implementations return the fixed
//! demo page and its two diagnosis claims.

use serde::Deserialize;
use thiserror::Error;

use crate::models::{BoundingBox, Claim, DocumentId, Fragment, PageDimensions};

#[derive(Error, Debug)]
pub enum CollaboratorError {
    #[error("OCR failed: {0}")]
    Ocr(String),

    #[error("Claim extraction failed: {0}")]
    Extraction(String),

    #[error("Response parsing error: {0}")]
    ResponseParsing(String),
}

/// Recognized lines of one document plus the page size they were measured on.
#[derive(Debug, Clone, PartialEq)]
pub struct OcrOutput {
    pub fragments: Vec<Fragment>,
    pub page: PageDimensions,
}

/// Turns document bytes into positioned text lines.
pub trait FragmentSource {
    fn recognize(
        &self,
        document_id: &DocumentId,
        document_name: &str,
        content: &[u8],
    ) -> Result<OcrOutput, CollaboratorError>;
}

/// Turns document text into coded claims with supporting sentences.
pub trait ClaimExtractor {
    fn extract(&self, document_text: &str) -> Result<Vec<Claim>, CollaboratorError>;
}

// ═══════════════════════════════════════════════════════════
// Sample collaborators
// ═══════════════════════════════════════════════════════════

/// Fixed three-line clinical note on an 800×1000 page.
pub struct SampleFragmentSource;

impl FragmentSource for SampleFragmentSource {
    fn recognize(
        &self,
        document_id: &DocumentId,
        document_name: &str,
        _content: &[u8],
    ) -> Result<OcrOutput, CollaboratorError> {
        let lines = [
            ("The patient has Type 2 Diabetes Mellitus without complications.", 200.0),
            ("Hypertension is also noted with controlled blood pressure.", 260.0),
            ("Follow-up visit recommended in 3 months.", 320.0),
        ];

        let fragments = lines
            .iter()
            .map(|(text, y)| Fragment {
                document_id: *document_id,
                document_name: document_name.to_string(),
                page: 1,
                text: (*text).to_string(),
                bounding_box: BoundingBox::new(80.0, *y, 720.0, y + 40.0),
            })
            .collect();

        Ok(OcrOutput {
            fragments,
            page: PageDimensions {
                width: 800,
                height: 1000,
            },
        })
    }
}

/// Returns the diabetes and hypertension claims whatever the input text.
pub struct SampleClaimExtractor;

impl ClaimExtractor for SampleClaimExtractor {
    fn extract(&self, _document_text: &str) -> Result<Vec<Claim>, CollaboratorError> {
        Ok(vec![
            Claim::new(
                "E11.9",
                "Type 2 diabetes mellitus without complications",
                "Diagnosis: Type 2 Diabetes Mellitus",
            ),
            Claim::new(
                "I10",
                "Essential (primary) hypertension",
                "Diagnosis: Hypertension",
            ),
        ])
    }
}

// ═══════════════════════════════════════════════════════════
// Extractor response parsing
// ═══════════════════════════════════════════════════════════

#[derive(Deserialize)]
struct ClaimsEnvelope {
    #[serde(default)]
    icds: Option<Vec<RawClaim>>,
}

#[derive(Deserialize)]
struct RawClaim {
    #[serde(default)]
    icd_code: Option<String>,
    #[serde(default)]
    icd_description: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    supporting_sentence: Option<String>,
}

/// Parse the extractor's JSON object `{"icds": [...]}`.
///
/// A missing or null list yields no claims. Missing fields become empty
/// strings, and `description` stands in for a missing `icd_description`.
pub fn parse_claims_response(raw: &str) -> Result<Vec<Claim>, CollaboratorError> {
    let envelope: ClaimsEnvelope = serde_json::from_str(raw)
        .map_err(|e| CollaboratorError::ResponseParsing(e.to_string()))?;

    Ok(envelope
        .icds
        .unwrap_or_default()
        .into_iter()
        .map(|item| Claim {
            code: item.icd_code.unwrap_or_default(),
            description: item
                .icd_description
                .or(item.description)
                .unwrap_or_default(),
            asserted_sentence: item.supporting_sentence.unwrap_or_default(),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::grounding::{resolve, FragmentStore};
    use uuid::Uuid;

    #[test]
    fn sample_source_produces_ordered_lines() {
        let doc = Uuid::new_v4();
        let output = SampleFragmentSource.recognize(&doc, "note.png", b"").unwrap();
        assert_eq!(output.fragments.len(), 3);
        assert_eq!(output.page, PageDimensions { width: 800, height: 1000 });
        assert!(output.fragments.iter().all(|f| f.document_id == doc && f.page == 1));
        assert!(output.fragments[0].bounding_box.y1 < output.fragments[1].bounding_box.y1);
    }

    #[test]
    fn sample_pipeline_grounds_both_claims() {
        let doc = Uuid::new_v4();
        let output = SampleFragmentSource.recognize(&doc, "note.png", b"").unwrap();
        let store = FragmentStore::load(output.fragments.clone());
        let claims = SampleClaimExtractor.extract(&store.full_text()).unwrap();

        let citations = resolve(&doc, &output.fragments, &claims, None).unwrap();
        assert_eq!(citations.len(), 2);
        assert_eq!(citations[0].code, "E11.9");
        assert!(citations[0].sentence.contains("Diabetes"));
        assert_eq!(citations[1].code, "I10");
        assert!(citations[1].sentence.starts_with("Hypertension"));
    }

    #[test]
    fn parses_extractor_response() {
        let raw = r#"{"icds": [
            {"icd_code": "E11.9", "icd_description": "Type 2 diabetes", "supporting_sentence": "Diagnosis: Type 2 Diabetes Mellitus"},
            {"icd_code": "I10", "description": "Hypertension"}
        ]}"#;
        let claims = parse_claims_response(raw).unwrap();
        assert_eq!(claims.len(), 2);
        assert_eq!(claims[0].asserted_sentence, "Diagnosis: Type 2 Diabetes Mellitus");
        assert_eq!(claims[1].description, "Hypertension");
        assert!(claims[1].asserted_sentence.is_empty());
    }

    #[test]
    fn missing_or_null_list_yields_no_claims() {
        assert!(parse_claims_response("{}").unwrap().is_empty());
        assert!(parse_claims_response(r#"{"icds": null}"#).unwrap().is_empty());
    }

    #[test]
    fn invalid_json_is_parse_error() {
        let result = parse_claims_response("not json");
        assert!(matches!(result, Err(CollaboratorError::ResponseParsing(_))));
    }
}
