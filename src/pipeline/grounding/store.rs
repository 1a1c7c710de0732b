use super::GroundingError;
use crate::models::{DocumentId, Fragment};

/// Write-once collection of one document's OCR fragments.
///
/// Keeps the order the recognizer produced (roughly reading order per page).
/// That order is the tie-break every index relies on.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FragmentStore {
    fragments: Vec<Fragment>,
}

impl FragmentStore {
    /// Accept the fragments as given. Validation happens at index build.
    pub fn load(fragments: impl IntoIterator<Item = Fragment>) -> Self {
        Self {
            fragments: fragments.into_iter().collect(),
        }
    }

    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    pub fn get(&self, position: usize) -> Option<&Fragment> {
        self.fragments.get(position)
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// Owning document, taken from the first fragment.
    pub fn document_id(&self) -> Option<DocumentId> {
        self.fragments.first().map(|f| f.document_id)
    }

    /// Fragment texts joined by newlines, as handed to the claim extractor.
    pub fn full_text(&self) -> String {
        self.fragments
            .iter()
            .map(|f| f.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Fragments worth indexing, with their store positions.
    ///
    /// Fails on the first malformed fragment: page 0, a non-finite or
    /// inverted bounding box, or a fragment from another document.
    /// Blank fragments are skipped, not rejected.
    pub fn indexable(&self) -> Result<Vec<(usize, &Fragment)>, GroundingError> {
        let owner = self.document_id();
        let mut out = Vec::with_capacity(self.fragments.len());

        for (position, fragment) in self.fragments.iter().enumerate() {
            if fragment.page == 0 {
                return Err(GroundingError::InvalidInput(format!(
                    "fragment {position}: page numbers are 1-based"
                )));
            }
            if !fragment.bounding_box.is_well_formed() {
                return Err(GroundingError::InvalidInput(format!(
                    "fragment {position}: malformed bounding box {:?}",
                    fragment.bounding_box
                )));
            }
            if Some(fragment.document_id) != owner {
                return Err(GroundingError::InvalidInput(format!(
                    "fragment {position}: belongs to document {}, expected {}",
                    fragment.document_id,
                    owner.unwrap_or_default()
                )));
            }
            if fragment.has_text() {
                out.push((position, fragment));
            }
        }

        Ok(out)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::BoundingBox;
    use uuid::Uuid;

    pub(crate) fn fragment(doc: Uuid, page: u32, text: &str, y: f64) -> Fragment {
        Fragment {
            document_id: doc,
            document_name: "clinical-note.png".into(),
            page,
            text: text.into(),
            bounding_box: BoundingBox::new(80.0, y, 720.0, y + 40.0),
        }
    }

    #[test]
    fn load_preserves_order() {
        let doc = Uuid::new_v4();
        let store = FragmentStore::load(vec![
            fragment(doc, 1, "first", 0.0),
            fragment(doc, 1, "second", 50.0),
            fragment(doc, 2, "third", 0.0),
        ]);
        let texts: Vec<_> = store.fragments().iter().map(|f| f.text.as_str()).collect();
        assert_eq!(texts, ["first", "second", "third"]);
        assert_eq!(store.document_id(), Some(doc));
    }

    #[test]
    fn full_text_joins_lines() {
        let doc = Uuid::new_v4();
        let store = FragmentStore::load(vec![
            fragment(doc, 1, "Diagnosis: Hypertension", 0.0),
            fragment(doc, 1, "Follow-up in 3 months.", 50.0),
        ]);
        assert_eq!(store.full_text(), "Diagnosis: Hypertension\nFollow-up in 3 months.");
    }

    #[test]
    fn indexable_skips_blank_fragments_and_keeps_positions() {
        let doc = Uuid::new_v4();
        let store = FragmentStore::load(vec![
            fragment(doc, 1, "", 0.0),
            fragment(doc, 1, "Hypertension", 50.0),
            fragment(doc, 1, "   ", 100.0),
        ]);
        let indexable = store.indexable().unwrap();
        assert_eq!(indexable.len(), 1);
        assert_eq!(indexable[0].0, 1);
    }

    #[test]
    fn page_zero_is_invalid() {
        let doc = Uuid::new_v4();
        let store = FragmentStore::load(vec![fragment(doc, 0, "text", 0.0)]);
        assert!(matches!(store.indexable(), Err(GroundingError::InvalidInput(_))));
    }

    #[test]
    fn inverted_box_is_invalid() {
        let doc = Uuid::new_v4();
        let mut bad = fragment(doc, 1, "text", 0.0);
        bad.bounding_box = BoundingBox::new(720.0, 0.0, 80.0, 40.0);
        let store = FragmentStore::load(vec![bad]);
        assert!(matches!(store.indexable(), Err(GroundingError::InvalidInput(_))));
    }

    #[test]
    fn mixed_documents_are_invalid() {
        let store = FragmentStore::load(vec![
            fragment(Uuid::new_v4(), 1, "one", 0.0),
            fragment(Uuid::new_v4(), 1, "two", 50.0),
        ]);
        assert!(matches!(store.indexable(), Err(GroundingError::InvalidInput(_))));
    }

    #[test]
    fn empty_store_indexes_nothing() {
        let store = FragmentStore::default();
        assert!(store.is_empty());
        assert!(store.indexable().unwrap().is_empty());
        assert_eq!(store.document_id(), None);
    }
}
