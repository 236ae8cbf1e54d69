use crate::error::Result;
use crate::ptr::PagePtr;
use crate::session::Session;

/// Seam to the reconciliation subsystem.
///
/// The eviction core never interprets page contents; it hands dirty
/// pages to the reconciler and commits whatever outcome the reconciler
/// attaches.
pub trait Reconciler {
    /// Materialize an in-memory page (folding any merge-split
    /// descendants) into on-disk form. On success exactly one
    /// reconciliation outcome is attached to the page.
    fn reconcile(&self, session: &mut Session, page: PagePtr) -> Result<()>;

    /// Resolve deferred frees recorded against a modified page. Called
    /// with `final_pass` when the page itself is being discarded.
    fn tracked_discard(
        &self,
        _session: &mut Session,
        _page: PagePtr,
        _final_pass: bool,
    ) -> Result<()> {
        Ok(())
    }
}
