use serde::{Deserialize, Serialize};

/// One coded finding produced by the claim extractor.
///
/// Field aliases accept the extractor's native JSON names. Missing fields
/// default to empty strings; an empty `asserted_sentence` makes the claim
/// ungroundable.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Claim {
    #[serde(default, alias = "icd_code")]
    pub code: String,
    #[serde(default, alias = "icd_description")]
    pub description: String,
    #[serde(default, alias = "supporting_sentence")]
    pub asserted_sentence: String,
}

impl Claim {
    pub fn new(
        code: impl Into<String>,
        description: impl Into<String>,
        asserted_sentence: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            description: description.into(),
            asserted_sentence: asserted_sentence.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_extractor_names_deserialize() {
        let json = r#"{
            "icd_code": "E11.9",
            "icd_description": "Type 2 diabetes mellitus without complications",
            "supporting_sentence": "Diagnosis: Type 2 Diabetes Mellitus"
        }"#;
        let claim: Claim = serde_json::from_str(json).unwrap();
        assert_eq!(claim.code, "E11.9");
        assert_eq!(claim.asserted_sentence, "Diagnosis: Type 2 Diabetes Mellitus");
    }

    #[test]
    fn missing_fields_default_to_empty() {
        let claim: Claim = serde_json::from_str(r#"{"code": "I10"}"#).unwrap();
        assert_eq!(claim.code, "I10");
        assert!(claim.description.is_empty());
        assert!(claim.asserted_sentence.is_empty());
    }
}
