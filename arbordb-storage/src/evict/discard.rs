use crate::error::Result;
use crate::page::{page_out, RefState};
use crate::ptr::PagePtr;
use crate::rec::Reconciler;
use crate::session::Session;
use tracing::warn;

/// Discard the pages folded into an evicted page during reconciliation:
/// every child whose reference is not on disk, depth-first so
/// descendants go before their parent.
pub(crate) fn sub_discard<R: Reconciler + ?Sized>(
    session: &mut Session,
    rec: &R,
    page: PagePtr,
) -> Result<()> {
    let p = unsafe { page.as_ref() };
    for r in p.child_refs() {
        if r.state() == RefState::OnDisk {
            continue;
        }
        let child = r.page();
        if unsafe { child.as_ref() }.is_internal() {
            sub_discard(session, rec, child)?;
        }
        discard_page(session, rec, child)?;
    }
    Ok(())
}

/// Resolve the page's tracked objects, then return its memory.
pub(crate) fn discard_page<R: Reconciler + ?Sized>(
    session: &mut Session,
    rec: &R,
    page: PagePtr,
) -> Result<()> {
    if unsafe { page.as_ref() }.has_modify() {
        if let Err(e) = rec.tracked_discard(session, page, true) {
            // The parent no longer references this page; there is no
            // clean rollback from here.
            warn!(page = ?page, err = %e, "tracked object discard failed for committed page");
            return Err(e);
        }
    }
    // SAFETY: the caller committed the parent reference away from this
    // page and holds the whole subtree exclusively, so no hazard can
    // name it.
    unsafe {
        page_out(page);
    }
    Ok(())
}
