use crate::error::{Error, Result};
use crate::evict::EvictFlags;
use crate::page::{PageRef, RecOutcome, RefState};
use crate::ptr::PagePtr;
use crate::session::Session;
use tracing::trace;

/// Request exclusive access to a reference.
///
/// The reference must already be InMemory or Locked by this session.
/// Readers publish their hazard slot before re-checking the reference
/// state; we store Locked before scanning the slots. One side always
/// observes the other, so a page is never discarded while a hazard
/// names it.
pub(crate) fn hazard_exclusive(session: &mut Session, r: &PageRef, force: bool) -> Result<()> {
    debug_assert!(matches!(
        r.state(),
        RefState::InMemory | RefState::Locked
    ));
    r.lock();
    loop {
        // Fresh copy of the hazard array on every pass.
        session.hazard_snapshot();
        if !session.hazard_contains(r.page()) {
            return Ok(());
        }
        session.cache().stats().inc_rec_hazard();
        if !force {
            trace!(page = ?r.page(), "hazard request failed");
            // Return the page to use.
            r.publish(RefState::InMemory);
            return Err(Error::EvictConflict);
        }
        std::thread::yield_now();
    }
}

/// Get exclusive access to the page and review its subtree for
/// conditions that block eviction.
///
/// On rejection every lock taken here has been released; rejection is a
/// normal outcome, the page was simply a poor eviction choice.
pub(crate) fn review(session: &mut Session, page: PagePtr, flags: EvictFlags) -> Result<()> {
    let mut high_water = page;
    if !flags.contains(EvictFlags::SINGLE_THREADED) {
        let parent = unsafe { page.as_ref() }.parent_ref();
        hazard_exclusive(session, parent, flags.contains(EvictFlags::WAIT))?;
    }
    if unsafe { page.as_ref() }.is_internal() {
        if let Err(e) = subtree_lock(session, page, flags, &mut high_water) {
            unwind(page, Some(high_water), flags);
            return Err(e);
        }
    }
    Ok(())
}

/// Walk the in-memory children of an internal page, locking each one
/// that can be folded into the evicted page.
///
/// The work stack replays the recursive descent: pushing the child
/// frame after re-pushing the parent frame yields a pre-order,
/// key-ordered traversal the unwinder can mirror exactly.
fn subtree_lock(
    session: &mut Session,
    root: PagePtr,
    flags: EvictFlags,
    high_water: &mut PagePtr,
) -> Result<()> {
    let mut stack: Vec<(PagePtr, usize)> = vec![(root, 0)];
    while let Some((page, idx)) = stack.pop() {
        let p = unsafe { page.as_ref() };
        if idx >= p.child_count() {
            continue;
        }
        stack.push((page, idx + 1));
        let r = p.child_ref(idx);
        match r.state() {
            RefState::OnDisk => continue,
            RefState::Locked | RefState::Reading => {
                // Some other actor owns the slot.
                debug_assert!(
                    !flags.contains(EvictFlags::SINGLE_THREADED),
                    "busy child ref under single-threaded eviction"
                );
                return Err(Error::EvictConflict);
            }
            RefState::InMemory => {}
        }
        let child = r.page();
        child_lock(session, r, child, flags, high_water)?;
        if unsafe { child.as_ref() }.is_internal() {
            stack.push((child, 0));
        }
    }
    Ok(())
}

/// Acquire exclusive access to one in-memory child and decide whether
/// it can be folded into the evicted page.
fn child_lock(
    session: &mut Session,
    r: &PageRef,
    child: PagePtr,
    flags: EvictFlags,
    high_water: &mut PagePtr,
) -> Result<()> {
    let p = unsafe { child.as_ref() };
    // Cheap test first: without at least a chance of a merge, the
    // candidate page cannot be evicted.
    if !p.has_merge_chance() {
        return Err(Error::EvictConflict);
    }
    if !flags.contains(EvictFlags::SINGLE_THREADED) {
        hazard_exclusive(session, r, flags.contains(EvictFlags::WAIT))?;
        // The lock is held from here on: the unwinder must cover this
        // child even if the careful test below rejects it.
        *high_water = child;
    }
    // Careful test under the lock: merge-split pages fold whether clean
    // or dirty; split or empty pages fold only once clean, a dirty one
    // must be written first so the parent knows its on-disk shape.
    match p.rec_outcome() {
        Some(RecOutcome::SplitMerge) => Ok(()),
        Some(RecOutcome::Split(_)) | Some(RecOutcome::Empty) if !p.is_modified() => Ok(()),
        _ => Err(Error::EvictConflict),
    }
}

/// Release exclusive access taken while reviewing a subtree, in the
/// exact order it was acquired, stopping after the high-water page.
/// `None` releases the whole locked subtree.
pub(crate) fn unwind(page: PagePtr, high_water: Option<PagePtr>, flags: EvictFlags) {
    if flags.contains(EvictFlags::SINGLE_THREADED) {
        return;
    }
    let p = unsafe { page.as_ref() };
    assert_eq!(p.parent_ref().state(), RefState::Locked);
    p.parent_ref().publish(RefState::InMemory);
    if high_water == Some(page) {
        return;
    }
    let mut stack: Vec<(PagePtr, usize)> = vec![(page, 0)];
    while let Some((pg, idx)) = stack.pop() {
        let p = unsafe { pg.as_ref() };
        if idx >= p.child_count() {
            continue;
        }
        stack.push((pg, idx + 1));
        let r = p.child_ref(idx);
        match r.state() {
            // Never locked, never touched.
            RefState::OnDisk => continue,
            RefState::Locked => {}
            s => panic!("ref state {:?} on unwind, expected locked", s),
        }
        let child = r.page();
        r.publish(RefState::InMemory);
        if high_water == Some(child) {
            return;
        }
        if unsafe { child.as_ref() }.is_internal() {
            stack.push((child, 0));
        }
    }
}
