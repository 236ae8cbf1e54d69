mod commit;
mod discard;
mod review;

use crate::error::Result;
use crate::page::{RecOutcome, RefState};
use crate::ptr::PagePtr;
use crate::rec::Reconciler;
use crate::session::Session;
use crate::tree::Tree;
use bitflags::bitflags;
use tracing::debug;

bitflags! {
    /// Flags controlling one eviction attempt.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct EvictFlags: u32 {
        /// Caller already holds a tree-wide lock; skip all hazard and
        /// lock work.
        const SINGLE_THREADED = 1;
        /// Spin until exclusive access is obtained instead of returning
        /// a conflict.
        const WAIT = 1 << 1;
    }
}

/// Reconciliation plus eviction.
///
/// Takes a candidate page selected by the eviction policy, locks it
/// together with the foldable part of its subtree, writes it if dirty
/// and commits the parent reference for the outcome. A conflict
/// ([`crate::error::Error::EvictConflict`]) leaves every reference
/// exactly as it was.
pub fn evict<R: Reconciler + ?Sized>(
    session: &mut Session,
    tree: &Tree,
    rec: &R,
    page: PagePtr,
    flags: EvictFlags,
) -> Result<()> {
    let mut flags = flags;
    let page_type = unsafe { page.as_ref() }.page_type();
    debug!(page = ?page, page_type = page_type.as_str(), "evict page");

    // A merge-split page is only evicted through its parent: evicting it
    // directly would lose the merge and permanently deepen the tree.
    // Ignore the request, but put the page back into use and bump the
    // read generation so it is not selected again right away.
    if matches!(
        unsafe { page.as_ref() }.rec_outcome(),
        Some(RecOutcome::SplitMerge)
    ) {
        let read_gen = session.cache().read_gen();
        let p = unsafe { page.as_mut() };
        p.read_gen = read_gen;
        p.parent_ref().publish(RefState::InMemory);
        return Ok(());
    }

    // A forced eviction waits for the page to become available instead
    // of giving up.
    {
        let p = unsafe { page.as_ref() };
        if p.is_force_evict() {
            flags |= EvictFlags::WAIT;
            p.force_evict_clear();
        }
    }

    // Get exclusive access to the page and review its subtree for
    // conditions that block eviction. The check runs for clean pages
    // too: nothing stops the policy from choosing an internal page with
    // in-memory children.
    review::review(session, page, flags)?;

    // If the page is dirty, write it.
    if unsafe { page.as_ref() }.is_modified() {
        if let Err(e) = rec.reconcile(session, page) {
            review::unwind(page, None, flags);
            return Err(e);
        }
    }

    // Update the parent and discard the page.
    if unsafe { page.as_ref() }.rec_outcome().is_none() {
        session.cache().stats().inc_evict_unmodified();
        commit::parent_clean_update(session, rec, page)?;
    } else {
        session.cache().stats().inc_evict_modified();
        commit::parent_dirty_update(session, tree, rec, page, flags)?;
    }
    Ok(())
}
