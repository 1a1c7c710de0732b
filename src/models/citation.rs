use serde::{Deserialize, Serialize};

use super::claim::Claim;
use super::fragment::{BoundingBox, Fragment};

/// A claim bound to the fragment that evidences it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocatedCitation {
    pub code: String,
    pub description: String,
    pub document_name: String,
    pub page: u32,
    pub bounding_box: BoundingBox,
    /// Text of the matched fragment, not the claim's asserted sentence.
    pub sentence: String,
}

impl LocatedCitation {
    pub fn locate(claim: &Claim, fragment: &Fragment) -> Self {
        Self {
            code: claim.code.clone(),
            description: claim.description.clone(),
            document_name: fragment.document_name.clone(),
            page: fragment.page,
            bounding_box: fragment.bounding_box,
            sentence: fragment.text.clone(),
        }
    }
}
