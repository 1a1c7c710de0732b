//! Document-keyed cache of built similarity indexes.
//!
//! Fragments are immutable once loaded, so an index built for a document stays
//! valid for the life of that document record. Each entry is filled at most
//! once: the first caller builds while holding the entry's lock, later and
//! concurrent callers wait on that lock and receive the same `Arc`.
//! A failed build leaves the entry empty so the next caller retries. Callers
//! that can tell a stale entry apart use `get_or_rebuild`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use super::types::SimilarityIndex;
use super::GroundingError;
use crate::models::DocumentId;

type Slot = Arc<Mutex<Option<Arc<dyn SimilarityIndex>>>>;

#[derive(Default)]
pub struct IndexCache {
    slots: Mutex<HashMap<DocumentId, Slot>>,
}

impl IndexCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached index for `document_id`, building it with `build` on
    /// first use.
    pub fn get_or_build<F>(
        &self,
        document_id: DocumentId,
        build: F,
    ) -> Result<Arc<dyn SimilarityIndex>, GroundingError>
    where
        F: FnOnce() -> Result<Arc<dyn SimilarityIndex>, GroundingError>,
    {
        self.get_or_rebuild(document_id, |_| true, build)
    }

    /// Like [`get_or_build`](Self::get_or_build), but a cached index that
    /// `is_current` rejects is dropped and rebuilt under the same lock.
    pub fn get_or_rebuild<V, F>(
        &self,
        document_id: DocumentId,
        is_current: V,
        build: F,
    ) -> Result<Arc<dyn SimilarityIndex>, GroundingError>
    where
        V: FnOnce(&dyn SimilarityIndex) -> bool,
        F: FnOnce() -> Result<Arc<dyn SimilarityIndex>, GroundingError>,
    {
        let slot = self.slot(document_id);

        let mut entry = lock(&slot);

        if let Some(index) = entry.as_ref().map(Arc::clone) {
            if is_current(index.as_ref()) {
                tracing::debug!(document_id = %document_id, "Index cache hit");
                return Ok(index);
            }
            tracing::debug!(document_id = %document_id, "Cached index is stale, rebuilding");
            *entry = None;
        }

        let index = build()?;
        tracing::debug!(
            document_id = %document_id,
            indexed = index.len(),
            backend = index.backend().as_str(),
            "Index cached"
        );
        *entry = Some(Arc::clone(&index));
        Ok(index)
    }

    /// Drop the cached index for `document_id`. Returns whether one existed.
    pub fn invalidate(&self, document_id: &DocumentId) -> bool {
        let removed = lock(&self.slots).remove(document_id).is_some();
        if removed {
            tracing::debug!(document_id = %document_id, "Index cache entry invalidated");
        }
        removed
    }

    /// Whether a completed index is cached for `document_id`.
    pub fn contains(&self, document_id: &DocumentId) -> bool {
        let Some(slot) = lock(&self.slots).get(document_id).cloned() else {
            return false;
        };
        let filled = lock(&slot).is_some();
        filled
    }

    /// Number of completed indexes.
    pub fn len(&self) -> usize {
        let slots: Vec<Slot> = lock(&self.slots).values().cloned().collect();
        slots.iter().filter(|s| lock(s).is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The map lock is held only long enough to fetch or insert the slot, so
    /// a slow build for one document never blocks another.
    fn slot(&self, document_id: DocumentId) -> Slot {
        Arc::clone(lock(&self.slots).entry(document_id).or_default())
    }
}

/// A panic inside a build leaves the slot empty, never half-written, so a
/// poisoned lock is safe to reuse.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grounding_config::LexicalOrdering;
    use crate::pipeline::grounding::lexical::LexicalIndex;
    use crate::pipeline::grounding::store::tests::fragment;
    use crate::pipeline::grounding::store::FragmentStore;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::thread;
    use uuid::Uuid;

    fn build_for(doc: Uuid) -> Result<Arc<dyn SimilarityIndex>, GroundingError> {
        let store = FragmentStore::load(vec![fragment(doc, 1, "Diagnosis: Hypertension", 0.0)]);
        Ok(Arc::new(LexicalIndex::build(&store, LexicalOrdering::SharedTokens)?))
    }

    #[test]
    fn second_lookup_reuses_index() {
        let cache = IndexCache::new();
        let doc = Uuid::new_v4();
        let builds = AtomicUsize::new(0);

        let first = cache
            .get_or_build(doc, || {
                builds.fetch_add(1, Ordering::SeqCst);
                build_for(doc)
            })
            .unwrap();
        let second = cache
            .get_or_build(doc, || {
                builds.fetch_add(1, Ordering::SeqCst);
                build_for(doc)
            })
            .unwrap();

        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&first, &second));
        assert!(cache.contains(&doc));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn documents_get_separate_entries() {
        let cache = IndexCache::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let ia = cache.get_or_build(a, || build_for(a)).unwrap();
        let ib = cache.get_or_build(b, || build_for(b)).unwrap();
        assert!(!Arc::ptr_eq(&ia, &ib));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn failed_build_is_not_cached() {
        let cache = IndexCache::new();
        let doc = Uuid::new_v4();

        let result = cache.get_or_build(doc, || {
            Err(GroundingError::InvalidInput("bad fragment".into()))
        });
        assert!(result.is_err());
        assert!(!cache.contains(&doc));
        assert!(cache.is_empty());

        cache.get_or_build(doc, || build_for(doc)).unwrap();
        assert!(cache.contains(&doc));
    }

    #[test]
    fn invalidate_forces_rebuild() {
        let cache = IndexCache::new();
        let doc = Uuid::new_v4();
        let first = cache.get_or_build(doc, || build_for(doc)).unwrap();

        assert!(cache.invalidate(&doc));
        assert!(!cache.invalidate(&doc));
        assert!(!cache.contains(&doc));

        let second = cache.get_or_build(doc, || build_for(doc)).unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn stale_entry_is_rebuilt() {
        let cache = IndexCache::new();
        let doc = Uuid::new_v4();
        let first = cache.get_or_build(doc, || build_for(doc)).unwrap();

        let kept = cache.get_or_rebuild(doc, |index| index.len() == 1, || build_for(doc)).unwrap();
        assert!(Arc::ptr_eq(&first, &kept));

        let rebuilt = cache.get_or_rebuild(doc, |index| index.len() == 2, || build_for(doc)).unwrap();
        assert!(!Arc::ptr_eq(&first, &rebuilt));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn failed_rebuild_leaves_entry_empty() {
        let cache = IndexCache::new();
        let doc = Uuid::new_v4();
        cache.get_or_build(doc, || build_for(doc)).unwrap();

        let result = cache.get_or_rebuild(
            doc,
            |_| false,
            || Err(GroundingError::InvalidInput("bad fragment".into())),
        );
        assert!(result.is_err());
        assert!(!cache.contains(&doc));
    }

    #[test]
    fn concurrent_first_use_builds_once() {
        const THREADS: usize = 8;
        let cache = Arc::new(IndexCache::new());
        let builds = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(THREADS));
        let doc = Uuid::new_v4();

        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let builds = Arc::clone(&builds);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    cache
                        .get_or_build(doc, || {
                            builds.fetch_add(1, Ordering::SeqCst);
                            thread::sleep(std::time::Duration::from_millis(20));
                            build_for(doc)
                        })
                        .unwrap()
                })
            })
            .collect();

        let indexes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(builds.load(Ordering::SeqCst), 1);
        for index in &indexes[1..] {
            assert!(Arc::ptr_eq(&indexes[0], index));
        }
        assert_eq!(indexes[0].len(), 1);
    }
}
