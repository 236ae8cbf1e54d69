use crate::page::Page;

/// Raw page handle that can be sent across threads.
///
/// The eviction protocol guarantees single-threaded access to the page
/// body: a page is only dereferenced by the session that holds its
/// parent reference in Locked state, or by a caller owning a tree-wide
/// lock. Other sessions only ever compare the handle's identity against
/// their hazard slots.
pub struct PagePtr(pub(crate) *mut Page);

impl PagePtr {
    #[inline]
    pub fn null() -> Self {
        PagePtr(std::ptr::null_mut())
    }

    #[inline]
    pub fn is_null(self) -> bool {
        self.0.is_null()
    }

    /// Stable identity of the page, used for hazard membership tests.
    #[inline]
    pub fn ident(self) -> usize {
        self.0 as usize
    }

    /// # Safety
    ///
    /// Caller must hold the page's parent reference in Locked state, or
    /// otherwise guarantee no concurrent mutation of the page body.
    #[inline]
    pub(crate) unsafe fn as_ref<'a>(self) -> &'a Page {
        debug_assert!(!self.0.is_null());
        unsafe { &*self.0 }
    }

    /// # Safety
    ///
    /// Same contract as [`PagePtr::as_ref`], plus exclusive access to the
    /// page body.
    #[inline]
    pub(crate) unsafe fn as_mut<'a>(self) -> &'a mut Page {
        debug_assert!(!self.0.is_null());
        unsafe { &mut *self.0 }
    }
}

impl Clone for PagePtr {
    #[inline]
    fn clone(&self) -> Self {
        PagePtr(self.0)
    }
}

impl Copy for PagePtr {}

impl PartialEq for PagePtr {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.0, other.0)
    }
}

impl Eq for PagePtr {}

impl std::fmt::Debug for PagePtr {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#x}", self.0 as usize)
    }
}

unsafe impl Send for PagePtr {}

unsafe impl Sync for PagePtr {}
