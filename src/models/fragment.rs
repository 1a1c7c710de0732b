use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of the document a fragment belongs to.
pub type DocumentId = Uuid;

/// Axis-aligned rectangle in the recognizer's page coordinate space.
///
/// Serialized as `[x1, y1, x2, y2]`, the tuple form OCR collaborators report.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct BoundingBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl BoundingBox {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Collapse an 8-value quadrilateral `[x1, y1, .., x4, y4]` into its
    /// enclosing box. Returns `None` when fewer than 8 coordinates are given.
    pub fn from_polygon(points: &[f64]) -> Option<Self> {
        if points.len() < 8 {
            return None;
        }
        let quad = &points[..8];
        let xs = quad.iter().step_by(2);
        let ys = quad.iter().skip(1).step_by(2);

        let (x1, x2) = xs.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
        let (y1, y2) = ys.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });

        Some(Self { x1, y1, x2, y2 })
    }

    pub fn width(&self) -> f64 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f64 {
        self.y2 - self.y1
    }

    /// All coordinates finite and `x1 <= x2`, `y1 <= y2`.
    pub fn is_well_formed(&self) -> bool {
        let finite = [self.x1, self.y1, self.x2, self.y2]
            .iter()
            .all(|v| v.is_finite());
        finite && self.x1 <= self.x2 && self.y1 <= self.y2
    }
}

impl From<[f64; 4]> for BoundingBox {
    fn from(v: [f64; 4]) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }
}

impl From<BoundingBox> for [f64; 4] {
    fn from(b: BoundingBox) -> Self {
        [b.x1, b.y1, b.x2, b.y2]
    }
}

/// One OCR-recognized line with its position on the page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fragment {
    pub document_id: DocumentId,
    pub document_name: String,
    /// 1-based page number.
    pub page: u32,
    pub text: String,
    #[serde(alias = "bbox")]
    pub bounding_box: BoundingBox,
}

impl Fragment {
    /// False for empty or whitespace-only text. Such lines carry no evidence.
    pub fn has_text(&self) -> bool {
        !self.text.trim().is_empty()
    }
}

/// Size of a recognized page. Used for display only, never for matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageDimensions {
    pub width: u32,
    pub height: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounding_box_serializes_as_array() {
        let bbox = BoundingBox::new(80.0, 200.0, 720.0, 240.0);
        let json = serde_json::to_string(&bbox).unwrap();
        assert_eq!(json, "[80.0,200.0,720.0,240.0]");

        let back: BoundingBox = serde_json::from_str("[1, 2, 3, 4]").unwrap();
        assert_eq!(back, BoundingBox::new(1.0, 2.0, 3.0, 4.0));
    }

    #[test]
    fn polygon_collapses_to_enclosing_box() {
        let poly = [82.0, 201.0, 719.0, 199.0, 721.0, 241.0, 80.0, 240.0];
        let bbox = BoundingBox::from_polygon(&poly).unwrap();
        assert_eq!(bbox, BoundingBox::new(80.0, 199.0, 721.0, 241.0));
        assert!(bbox.is_well_formed());
    }

    #[test]
    fn short_polygon_is_rejected() {
        assert!(BoundingBox::from_polygon(&[0.0, 0.0, 10.0, 10.0]).is_none());
    }

    #[test]
    fn inverted_or_nan_box_is_malformed() {
        assert!(!BoundingBox::new(10.0, 0.0, 5.0, 5.0).is_well_formed());
        assert!(!BoundingBox::new(0.0, 10.0, 5.0, 5.0).is_well_formed());
        assert!(!BoundingBox::new(0.0, 0.0, f64::NAN, 5.0).is_well_formed());
        assert!(BoundingBox::new(3.0, 3.0, 3.0, 3.0).is_well_formed());
    }

    #[test]
    fn box_dimensions() {
        let bbox = BoundingBox::new(80.0, 200.0, 720.0, 240.0);
        assert_eq!(bbox.width(), 640.0);
        assert_eq!(bbox.height(), 40.0);
    }

    #[test]
    fn whitespace_fragment_has_no_text() {
        let mut fragment = Fragment {
            document_id: Uuid::nil(),
            document_name: "scan.png".into(),
            page: 1,
            text: " \t\n".into(),
            bounding_box: BoundingBox::new(0.0, 0.0, 1.0, 1.0),
        };
        assert!(!fragment.has_text());
        fragment.text = "Diagnosis".into();
        assert!(fragment.has_text());
    }

    #[test]
    fn fragment_accepts_bbox_alias() {
        let json = r#"{
            "document_id": "00000000-0000-0000-0000-000000000000",
            "document_name": "scan.png",
            "page": 2,
            "text": "Diagnosis: Hypertension",
            "bbox": [80, 260, 720, 300]
        }"#;
        let fragment: Fragment = serde_json::from_str(json).unwrap();
        assert_eq!(fragment.page, 2);
        assert_eq!(fragment.bounding_box.y2, 300.0);
    }
}
