use crate::error::{Error, Result};
use crate::page::Page;
use crate::ptr::PagePtr;
use crate::session::Session;
use crossbeam_utils::CachePadded;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicPtr, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

const DEFAULT_SESSIONS: usize = 32;
const DEFAULT_HAZARD_PER_SESSION: usize = 16;

/// One hazard slot. When non-null it names a page some reader relies on
/// not being freed. Single writer (the owning session), many readers.
pub(crate) struct HazardSlot {
    page: CachePadded<AtomicPtr<Page>>,
}

impl HazardSlot {
    #[inline]
    fn new() -> Self {
        HazardSlot {
            page: CachePadded::new(AtomicPtr::new(std::ptr::null_mut())),
        }
    }

    /// Publish the page this slot protects.
    ///
    /// SeqCst pairs with the Locked store on the eviction side, see
    /// [`crate::page::PageRef::lock`].
    #[inline]
    pub(crate) fn set(&self, page: PagePtr) {
        self.page.store(page.0, Ordering::SeqCst);
    }

    #[inline]
    pub(crate) fn clear(&self) {
        self.page.store(std::ptr::null_mut(), Ordering::SeqCst);
    }

    #[inline]
    pub(crate) fn load_ident(&self) -> usize {
        self.page.load(Ordering::SeqCst) as usize
    }
}

/// Eviction counters.
#[derive(Default)]
pub struct CacheStats {
    evict_unmodified: AtomicUsize,
    evict_modified: AtomicUsize,
    rec_hazard: AtomicUsize,
}

impl CacheStats {
    #[inline]
    pub fn evict_unmodified(&self) -> usize {
        self.evict_unmodified.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn evict_modified(&self) -> usize {
        self.evict_modified.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn rec_hazard(&self) -> usize {
        self.rec_hazard.load(Ordering::Relaxed)
    }

    #[inline]
    pub(crate) fn inc_evict_unmodified(&self) {
        self.evict_unmodified.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn inc_evict_modified(&self) {
        self.evict_modified.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn inc_rec_hazard(&self) {
        self.rec_hazard.fetch_add(1, Ordering::Relaxed);
    }
}

/// Process-wide cache state shared by all sessions: the hazard slot
/// table, the read generation and the eviction counters.
pub struct Cache {
    hazard: Box<[HazardSlot]>,
    hazard_per_session: usize,
    read_gen: AtomicU64,
    free_sessions: Mutex<Vec<usize>>,
    stats: CacheStats,
}

impl Cache {
    /// Hand out a session slot. Fails when all configured sessions are
    /// in use.
    #[inline]
    pub fn new_session(self: &Arc<Cache>) -> Result<Session> {
        let id = {
            let mut g = self.free_sessions.lock();
            g.pop().ok_or(Error::SessionLimitExceeded)?
        };
        Ok(Session::new(Arc::clone(self), id))
    }

    /// Monotonic read generation, bumped on every call.
    #[inline]
    pub fn read_gen(&self) -> u64 {
        self.read_gen.fetch_add(1, Ordering::AcqRel) + 1
    }

    #[inline]
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Number of hazard slots each session owns.
    #[inline]
    pub fn hazard_per_session(&self) -> usize {
        self.hazard_per_session
    }

    #[inline]
    pub(crate) fn hazard_slot(&self, session_id: usize, idx: usize) -> &HazardSlot {
        assert!(idx < self.hazard_per_session);
        &self.hazard[session_id * self.hazard_per_session + idx]
    }

    #[inline]
    pub(crate) fn hazard_slots(&self) -> impl Iterator<Item = &HazardSlot> {
        self.hazard.iter()
    }

    #[inline]
    pub(crate) fn release_session(&self, session_id: usize) {
        for idx in 0..self.hazard_per_session {
            self.hazard_slot(session_id, idx).clear();
        }
        let mut g = self.free_sessions.lock();
        debug_assert!(!g.contains(&session_id));
        g.push(session_id);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    sessions: usize,
    hazard_per_session: usize,
}

impl Default for CacheConfig {
    #[inline]
    fn default() -> Self {
        CacheConfig {
            sessions: DEFAULT_SESSIONS,
            hazard_per_session: DEFAULT_HAZARD_PER_SESSION,
        }
    }
}

impl CacheConfig {
    #[inline]
    pub fn sessions(mut self, sessions: usize) -> Self {
        self.sessions = sessions;
        self
    }

    #[inline]
    pub fn hazard_per_session(mut self, hazard_per_session: usize) -> Self {
        self.hazard_per_session = hazard_per_session;
        self
    }

    #[inline]
    pub fn build(self) -> Result<Arc<Cache>> {
        if self.sessions == 0 || self.hazard_per_session == 0 {
            return Err(Error::InvalidArgument);
        }
        let slots = self.sessions * self.hazard_per_session;
        let hazard: Vec<HazardSlot> = (0..slots).map(|_| HazardSlot::new()).collect();
        Ok(Arc::new(Cache {
            hazard: hazard.into_boxed_slice(),
            hazard_per_session: self.hazard_per_session,
            read_gen: AtomicU64::new(0),
            free_sessions: Mutex::new((0..self.sessions).rev().collect()),
            stats: CacheStats::default(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::{Page, PageType};

    #[test]
    fn test_config_validation() {
        assert!(CacheConfig::default().sessions(0).build().is_err());
        assert!(CacheConfig::default().hazard_per_session(0).build().is_err());
        assert!(CacheConfig::default().build().is_ok());
    }

    #[test]
    fn test_session_slots() {
        let cache = CacheConfig::default().sessions(2).build().unwrap();
        let s1 = cache.new_session().unwrap();
        let s2 = cache.new_session().unwrap();
        assert!(cache.new_session().is_err());
        drop(s1);
        let s3 = cache.new_session().unwrap();
        assert_ne!(s2.id(), s3.id());
    }

    #[test]
    fn test_read_gen_monotonic() {
        let cache = CacheConfig::default().build().unwrap();
        let a = cache.read_gen();
        let b = cache.read_gen();
        let c = cache.read_gen();
        assert!(a < b && b < c);
    }

    #[test]
    fn test_session_drop_clears_hazards() {
        let cache = CacheConfig::default().sessions(1).build().unwrap();
        let page = Page::into_ptr(Page::new_leaf(PageType::RowLeaf));
        {
            let session = cache.new_session().unwrap();
            session.hazard_set(0, page);
            assert_eq!(cache.hazard_slot(session.id(), 0).load_ident(), page.ident());
        }
        assert_eq!(cache.hazard_slot(0, 0).load_ident(), 0);
        unsafe { crate::page::free_subtree(page) };
    }
}
