use crate::error::Result;
use crate::evict::discard::{discard_page, sub_discard};
use crate::evict::review::unwind;
use crate::evict::EvictFlags;
use crate::page::{PageRef, RecOutcome, RefState, ADDR_INVALID};
use crate::ptr::PagePtr;
use crate::rec::Reconciler;
use crate::session::Session;
use crate::tree::Tree;
use tracing::debug;

/// Update the parent reference for an evicted, clean page.
pub(crate) fn parent_clean_update<R: Reconciler + ?Sized>(
    session: &mut Session,
    rec: &R,
    page: PagePtr,
) -> Result<()> {
    let p = unsafe { page.as_ref() };
    // A clean page folds nothing: the review only admits children that
    // carry an outcome, and an outcome would have made this page take
    // the dirty path.
    debug_assert!(p.child_refs().all(|r| r.state() == RefState::OnDisk));
    let parent = p.parent_ref();
    parent.store_page(PagePtr::null());
    parent.publish(RefState::OnDisk);
    discard_page(session, rec, page)
}

/// Update the parent reference for an evicted, dirty page, dispatching
/// on the reconciliation outcome.
///
/// Returns false when the page was intentionally kept in memory (empty
/// non-root): it will be folded into its parent on the parent's own
/// eviction.
pub(crate) fn parent_dirty_update<R: Reconciler + ?Sized>(
    session: &mut Session,
    tree: &Tree,
    rec: &R,
    page: PagePtr,
    flags: EvictFlags,
) -> Result<bool> {
    let (outcome, is_root) = {
        let p = unsafe { page.as_ref() };
        (p.rec_outcome(), tree.is_root(p))
    };
    let parent = unsafe { page.as_ref() }.parent_ref();
    match outcome {
        Some(RecOutcome::Empty) => {
            if !is_root {
                // Not evicted after all: release the page and everything
                // locked below it back into use, the merge happens when
                // the parent is evicted.
                unwind(page, None, flags);
                return Ok(false);
            }
            // An empty root resets the tree's root address.
            parent.store_addr(ADDR_INVALID, 0);
            parent.store_page(PagePtr::null());
            parent.publish(RefState::OnDisk);
        }
        Some(RecOutcome::Replace(off)) => {
            parent.store_addr(off.addr, off.size);
            parent.store_page(PagePtr::null());
            parent.publish(RefState::OnDisk);
        }
        Some(RecOutcome::Split(split)) => {
            if is_root {
                debug!(page = ?page, split = ?split, "root page split");
                root_split(session, tree, rec, split)?;
                parent.publish(RefState::OnDisk);
            } else {
                // The new internal page takes over this page's reference
                // cell. It carries the merge-split marker and folds on
                // the parent's own eventual eviction.
                unsafe {
                    split.as_mut().parent_ref = parent as *const PageRef as *mut PageRef;
                }
                parent.store_page(split);
                parent.publish(RefState::InMemory);
            }
        }
        outcome => panic!("illegal reconciliation outcome {:?} on commit", outcome),
    }

    // Discard the pages merged into this page during reconciliation,
    // then the page itself.
    sub_discard(session, rec, page)?;
    discard_page(session, rec, page)?;
    Ok(true)
}

/// A newly split root has no parent to defer the merge to, so it is
/// written immediately. The write can split again; keep reconciling
/// until a simple replacement installs the tree's root address. Multiple
/// rounds only show up after bulk-loading something huge, when the index
/// page referencing all of the new leaves is itself evicted.
fn root_split<R: Reconciler + ?Sized>(
    session: &mut Session,
    tree: &Tree,
    rec: &R,
    first: PagePtr,
) -> Result<()> {
    let mut page = first;
    while !page.is_null() {
        {
            let p = unsafe { page.as_mut() };
            p.parent_ref = tree.root_ref() as *const PageRef as *mut PageRef;
            p.set_modified();
            p.clear_rec_outcome();
        }
        rec.reconcile(session, page)?;
        let next = match unsafe { page.as_ref() }.rec_outcome() {
            Some(RecOutcome::Replace(off)) => {
                let root = tree.root_ref();
                root.store_addr(off.addr, off.size);
                root.store_page(PagePtr::null());
                PagePtr::null()
            }
            Some(RecOutcome::Split(split)) => split,
            outcome => panic!("illegal reconciliation outcome {:?} on root split", outcome),
        };
        debug!(page = ?page, next = ?next, "root split iteration");
        discard_page(session, rec, page)?;
        page = next;
    }
    Ok(())
}
