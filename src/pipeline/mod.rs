pub mod collaborators; // OCR and claim-extraction boundaries
pub mod grounding; // Claim-to-fragment resolution
