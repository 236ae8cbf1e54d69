use crate::ptr::PagePtr;
use std::sync::atomic::{AtomicBool, AtomicPtr, AtomicU32, AtomicU64, AtomicU8, Ordering};

/// On-disk address of a page.
pub type PageAddr = u64;
pub const ADDR_INVALID: PageAddr = !0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PageType {
    ColInternal = 0,
    ColLeaf = 1,
    RowInternal = 2,
    RowLeaf = 3,
}

impl PageType {
    #[inline]
    pub fn is_internal(self) -> bool {
        matches!(self, PageType::ColInternal | PageType::RowInternal)
    }

    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            PageType::ColInternal => "col_internal",
            PageType::ColLeaf => "col_leaf",
            PageType::RowInternal => "row_internal",
            PageType::RowLeaf => "row_leaf",
        }
    }
}

/// State of a parent-to-child reference.
///
/// Readers descend through a reference only when they observe InMemory
/// with acquire semantics; the eviction path owns all other transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RefState {
    /// Child is on disk, (addr, size) are valid.
    OnDisk = 0,
    /// Child is being read into memory.
    Reading = 1,
    /// Child is in memory, page pointer is valid.
    InMemory = 2,
    /// One session holds the child exclusively for eviction.
    Locked = 3,
}

impl From<u8> for RefState {
    #[inline]
    fn from(value: u8) -> Self {
        match value {
            0 => RefState::OnDisk,
            1 => RefState::Reading,
            2 => RefState::InMemory,
            3 => RefState::Locked,
            _ => unreachable!("invalid ref state"),
        }
    }
}

/// The edge from a parent page to a child.
///
/// The state word is the single point of linearization: all other fields
/// are stored relaxed and published by a release store of the state, so
/// an observer that acquires the state sees internally consistent
/// (addr, size, page) values.
pub struct PageRef {
    state: AtomicU8,
    addr: AtomicU64,
    size: AtomicU32,
    page: AtomicPtr<Page>,
}

impl PageRef {
    /// New reference owning an in-memory child.
    #[inline]
    pub fn new_mem(page: Box<Page>) -> Self {
        PageRef {
            state: AtomicU8::new(RefState::InMemory as u8),
            addr: AtomicU64::new(ADDR_INVALID),
            size: AtomicU32::new(0),
            page: AtomicPtr::new(Box::into_raw(page)),
        }
    }

    /// New reference to an on-disk child.
    #[inline]
    pub fn new_disk(addr: PageAddr, size: u32) -> Self {
        PageRef {
            state: AtomicU8::new(RefState::OnDisk as u8),
            addr: AtomicU64::new(addr),
            size: AtomicU32::new(size),
            page: AtomicPtr::new(std::ptr::null_mut()),
        }
    }

    #[inline]
    pub fn state(&self) -> RefState {
        RefState::from(self.state.load(Ordering::Acquire))
    }

    #[inline]
    pub fn addr(&self) -> PageAddr {
        self.addr.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn size(&self) -> u32 {
        self.size.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn page(&self) -> PagePtr {
        PagePtr(self.page.load(Ordering::Acquire))
    }

    /// Transition to Locked.
    ///
    /// SeqCst pairs with the hazard slot publication on the read path:
    /// readers publish their slot before re-checking the state, this side
    /// stores Locked before scanning the slots. One of the two must see
    /// the other's write.
    #[inline]
    pub(crate) fn lock(&self) {
        self.state.store(RefState::Locked as u8, Ordering::SeqCst);
    }

    /// Store (addr, size) without publishing.
    #[inline]
    pub(crate) fn store_addr(&self, addr: PageAddr, size: u32) {
        self.addr.store(addr, Ordering::Relaxed);
        self.size.store(size, Ordering::Relaxed);
    }

    /// Store the page pointer without publishing.
    #[inline]
    pub(crate) fn store_page(&self, page: PagePtr) {
        self.page.store(page.0, Ordering::Relaxed);
    }

    /// Publish the reference to other sessions. All field stores made by
    /// this session happen-before the state becomes visible.
    #[inline]
    pub(crate) fn publish(&self, state: RefState) {
        self.state.store(state as u8, Ordering::Release);
    }
}

/// Write offset produced by a one-for-one page replacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOff {
    pub addr: PageAddr,
    pub size: u32,
}

/// Result of the most recent reconciliation of a page.
///
/// At most one outcome is attached to a page; a clean page that has
/// never been reconciled carries none.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecOutcome {
    /// Reconciled to a single on-disk page.
    Replace(WriteOff),
    /// Reconciled to a freshly built internal page referencing the split
    /// result. The handle owns the page until a commit consumes it.
    Split(PagePtr),
    /// Reconciled to nothing, all entries deleted.
    Empty,
    /// Produced by a split of another page. Never written standalone,
    /// only folded into the parent during the parent's reconciliation.
    SplitMerge,
}

/// Deferred free recorded against a modified page, resolved by the
/// reconciliation tracker when the page is discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackedAddr {
    pub addr: PageAddr,
    pub size: u32,
}

/// Modification record of a page.
pub struct PageMod {
    dirty: bool,
    outcome: Option<RecOutcome>,
    tracked: Vec<TrackedAddr>,
}

impl PageMod {
    #[inline]
    fn new() -> Self {
        PageMod {
            dirty: false,
            outcome: None,
            tracked: Vec::new(),
        }
    }
}

/// Child reference of a column-store internal page, ordered by starting
/// record number.
pub struct ColRef {
    pub recno: u64,
    pub r: PageRef,
}

/// Child reference of a row-store internal page, ordered by key.
pub struct RowRef {
    pub key: Box<[u8]>,
    pub r: PageRef,
}

pub enum PageChildren {
    ColInternal(Box<[ColRef]>),
    RowInternal(Box<[RowRef]>),
    Leaf,
}

/// Initial child of a newly built internal page.
pub enum Child {
    Disk { addr: PageAddr, size: u32 },
    Mem(Box<Page>),
}

impl Child {
    #[inline]
    fn into_ref(self) -> PageRef {
        match self {
            Child::Disk { addr, size } => PageRef::new_disk(addr, size),
            Child::Mem(page) => PageRef::new_mem(page),
        }
    }
}

/// A node of the B-tree while resident in memory.
///
/// A page is owned by exactly one PageRef; the parent back-link is a
/// non-owning convenience for the eviction path. The body is only
/// mutated by the session holding the parent reference in Locked state,
/// which is what makes the Send/Sync impls below sound.
pub struct Page {
    page_type: PageType,
    pub(crate) parent_ref: *mut PageRef,
    pub(crate) read_gen: u64,
    force_evict: AtomicBool,
    modify: Option<Box<PageMod>>,
    children: PageChildren,
}

impl Page {
    #[inline]
    pub fn new_leaf(page_type: PageType) -> Box<Page> {
        assert!(!page_type.is_internal());
        Box::new(Page {
            page_type,
            parent_ref: std::ptr::null_mut(),
            read_gen: 0,
            force_evict: AtomicBool::new(false),
            modify: None,
            children: PageChildren::Leaf,
        })
    }

    pub fn new_col_internal(children: Vec<(u64, Child)>) -> Box<Page> {
        let refs: Vec<ColRef> = children
            .into_iter()
            .map(|(recno, child)| ColRef {
                recno,
                r: child.into_ref(),
            })
            .collect();
        let page = Box::new(Page {
            page_type: PageType::ColInternal,
            parent_ref: std::ptr::null_mut(),
            read_gen: 0,
            force_evict: AtomicBool::new(false),
            modify: None,
            children: PageChildren::ColInternal(refs.into_boxed_slice()),
        });
        page.link_children();
        page
    }

    pub fn new_row_internal(children: Vec<(Vec<u8>, Child)>) -> Box<Page> {
        let refs: Vec<RowRef> = children
            .into_iter()
            .map(|(key, child)| RowRef {
                key: key.into_boxed_slice(),
                r: child.into_ref(),
            })
            .collect();
        let page = Box::new(Page {
            page_type: PageType::RowInternal,
            parent_ref: std::ptr::null_mut(),
            read_gen: 0,
            force_evict: AtomicBool::new(false),
            modify: None,
            children: PageChildren::RowInternal(refs.into_boxed_slice()),
        });
        page.link_children();
        page
    }

    /// Point in-memory children back at their owning reference cells.
    /// The cells live in the boxed child slice, whose address is stable
    /// for the lifetime of the page.
    fn link_children(&self) {
        for i in 0..self.child_count() {
            let r = self.child_ref(i);
            let child = r.page();
            if !child.is_null() {
                // SAFETY: the child was just moved in via Child::Mem and
                // is not yet reachable by any other session.
                unsafe {
                    child.as_mut().parent_ref = r as *const PageRef as *mut PageRef;
                }
            }
        }
    }

    #[inline]
    pub fn page_type(&self) -> PageType {
        self.page_type
    }

    #[inline]
    pub fn is_internal(&self) -> bool {
        self.page_type.is_internal()
    }

    #[inline]
    pub fn read_gen(&self) -> u64 {
        self.read_gen
    }

    /// The parent reference cell owning this page.
    #[inline]
    pub fn parent_ref(&self) -> &PageRef {
        debug_assert!(!self.parent_ref.is_null());
        // SAFETY: the back-link is wired at construction and points into
        // the parent's child slice or the tree root cell, both of which
        // outlive any in-memory child.
        unsafe { &*self.parent_ref }
    }

    #[inline]
    pub fn child_count(&self) -> usize {
        match &self.children {
            PageChildren::ColInternal(refs) => refs.len(),
            PageChildren::RowInternal(refs) => refs.len(),
            PageChildren::Leaf => 0,
        }
    }

    /// Child reference by position. Children are kept in natural key
    /// order, so index order is traversal order.
    #[inline]
    pub fn child_ref(&self, i: usize) -> &PageRef {
        match &self.children {
            PageChildren::ColInternal(refs) => &refs[i].r,
            PageChildren::RowInternal(refs) => &refs[i].r,
            PageChildren::Leaf => panic!("child ref on leaf page"),
        }
    }

    #[inline]
    pub fn child_refs(&self) -> ChildRefs<'_> {
        ChildRefs { page: self, idx: 0 }
    }

    #[inline]
    pub fn is_modified(&self) -> bool {
        self.modify.as_ref().is_some_and(|m| m.dirty)
    }

    /// Toggle the dirty bit, installing a modification record if the
    /// page has never been modified.
    #[inline]
    pub fn set_modified(&mut self) {
        self.modify.get_or_insert_with(|| Box::new(PageMod::new())).dirty = true;
    }

    /// Mark the page clean. The modification record stays, it carries
    /// the reconciliation outcome.
    #[inline]
    pub fn set_clean(&mut self) {
        if let Some(m) = self.modify.as_mut() {
            m.dirty = false;
        }
    }

    #[inline]
    pub fn rec_outcome(&self) -> Option<RecOutcome> {
        self.modify.as_ref().and_then(|m| m.outcome)
    }

    #[inline]
    pub fn set_rec_outcome(&mut self, outcome: RecOutcome) {
        self.modify.get_or_insert_with(|| Box::new(PageMod::new())).outcome = Some(outcome);
    }

    #[inline]
    pub fn clear_rec_outcome(&mut self) {
        if let Some(m) = self.modify.as_mut() {
            m.outcome = None;
        }
    }

    /// A page only has a chance of being folded into its parent if it
    /// reconciled to empty, a split, or is a merge-split page.
    #[inline]
    pub(crate) fn has_merge_chance(&self) -> bool {
        matches!(
            self.rec_outcome(),
            Some(RecOutcome::Empty) | Some(RecOutcome::Split(_)) | Some(RecOutcome::SplitMerge)
        )
    }

    #[inline]
    pub fn has_modify(&self) -> bool {
        self.modify.is_some()
    }

    #[inline]
    pub fn tracked_push(&mut self, tracked: TrackedAddr) {
        self.modify
            .get_or_insert_with(|| Box::new(PageMod::new()))
            .tracked
            .push(tracked);
    }

    #[inline]
    pub fn take_tracked(&mut self) -> Vec<TrackedAddr> {
        match self.modify.as_mut() {
            Some(m) => std::mem::take(&mut m.tracked),
            None => Vec::new(),
        }
    }

    #[inline]
    pub fn set_force_evict(&self) {
        self.force_evict.store(true, Ordering::Release);
    }

    #[inline]
    pub fn is_force_evict(&self) -> bool {
        self.force_evict.load(Ordering::Acquire)
    }

    #[inline]
    pub fn force_evict_clear(&self) {
        self.force_evict.store(false, Ordering::Release);
    }

    #[inline]
    pub fn into_ptr(page: Box<Page>) -> PagePtr {
        PagePtr(Box::into_raw(page))
    }
}

unsafe impl Send for Page {}

unsafe impl Sync for Page {}

/// Return a page's memory to the allocator.
///
/// # Safety
///
/// The page must no longer be reachable: its parent reference has been
/// committed away from it and no hazard names it.
#[inline]
pub(crate) unsafe fn page_out(page: PagePtr) {
    debug_assert!(!page.is_null());
    unsafe {
        drop(Box::from_raw(page.0));
    }
}

/// Free a page and every in-memory descendant, including an uncommitted
/// split page parked in the modification record. Teardown only, never
/// part of the eviction path.
///
/// # Safety
///
/// No session may access any page of the subtree concurrently.
pub(crate) unsafe fn free_subtree(page: PagePtr) {
    unsafe {
        let p = page.as_ref();
        for r in p.child_refs() {
            let child = r.page();
            if !child.is_null() {
                free_subtree(child);
            }
        }
        if let Some(RecOutcome::Split(split)) = p.rec_outcome() {
            if !split.is_null() {
                free_subtree(split);
            }
        }
        page_out(page);
    }
}

pub struct ChildRefs<'a> {
    page: &'a Page,
    idx: usize,
}

impl<'a> Iterator for ChildRefs<'a> {
    type Item = &'a PageRef;

    #[inline]
    fn next(&mut self) -> Option<&'a PageRef> {
        if self.idx >= self.page.child_count() {
            return None;
        }
        let r = self.page.child_ref(self.idx);
        self.idx += 1;
        Some(r)
    }
}
