use crate::cache::Cache;
use crate::ptr::PagePtr;
use std::sync::Arc;

/// One session of work against the cache.
///
/// A session owns a fixed range of hazard slots in the process-wide
/// table and a scratch buffer reused for hazard snapshots during
/// eviction.
pub struct Session {
    cache: Arc<Cache>,
    id: usize,
    snapshot: Vec<usize>,
}

impl Session {
    #[inline]
    pub(crate) fn new(cache: Arc<Cache>, id: usize) -> Self {
        Session {
            cache,
            id,
            snapshot: Vec::new(),
        }
    }

    #[inline]
    pub fn id(&self) -> usize {
        self.id
    }

    #[inline]
    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    /// Publish a hazard reference in one of this session's slots.
    ///
    /// This is the read path's promise that the page must not be freed;
    /// the publisher re-checks the parent reference state after the
    /// slot is visible.
    #[inline]
    pub fn hazard_set(&self, idx: usize, page: PagePtr) {
        self.cache.hazard_slot(self.id, idx).set(page);
    }

    /// Retract a hazard reference.
    #[inline]
    pub fn hazard_clear(&self, idx: usize) {
        self.cache.hazard_slot(self.id, idx).clear();
    }

    /// Build a compacted, sorted copy of every non-empty hazard slot in
    /// the session scratch buffer. Stale reads are tolerated: a hazard
    /// published after this scan cannot name a page we are about to
    /// free, because its publisher re-checks the reference state after
    /// our Locked store.
    #[inline]
    pub(crate) fn hazard_snapshot(&mut self) {
        self.snapshot.clear();
        for slot in self.cache.hazard_slots() {
            let ident = slot.load_ident();
            if ident != 0 {
                self.snapshot.push(ident);
            }
        }
        self.snapshot.sort_unstable();
    }

    /// Membership test against the last snapshot.
    #[inline]
    pub(crate) fn hazard_contains(&self, page: PagePtr) -> bool {
        self.snapshot.binary_search(&page.ident()).is_ok()
    }
}

impl Drop for Session {
    #[inline]
    fn drop(&mut self) {
        self.cache.release_session(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheConfig;
    use crate::page::{free_subtree, Page, PageType};

    #[test]
    fn test_hazard_snapshot_contains() {
        let cache = CacheConfig::default().sessions(4).build().unwrap();
        let reader = cache.new_session().unwrap();
        let mut evictor = cache.new_session().unwrap();

        let p1 = Page::into_ptr(Page::new_leaf(PageType::RowLeaf));
        let p2 = Page::into_ptr(Page::new_leaf(PageType::RowLeaf));
        let p3 = Page::into_ptr(Page::new_leaf(PageType::ColLeaf));

        reader.hazard_set(0, p2);
        reader.hazard_set(3, p1);

        evictor.hazard_snapshot();
        assert!(evictor.hazard_contains(p1));
        assert!(evictor.hazard_contains(p2));
        assert!(!evictor.hazard_contains(p3));

        // retraction is only observed by a fresh snapshot.
        reader.hazard_clear(0);
        assert!(evictor.hazard_contains(p2));
        evictor.hazard_snapshot();
        assert!(!evictor.hazard_contains(p2));

        unsafe {
            free_subtree(p1);
            free_subtree(p2);
            free_subtree(p3);
        }
    }
}
