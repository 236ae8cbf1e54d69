use crate::page::{free_subtree, Page, PageAddr, PageRef, RefState, ADDR_INVALID};

/// Handle of one B-tree.
///
/// The root reference is the distinguished parent cell of the root
/// page: it is the only reference whose (addr, size) are the tree's
/// persisted root location, updated exclusively by root eviction.
pub struct Tree {
    root: PageRef,
}

impl Tree {
    /// Build a tree around an in-memory root page.
    #[inline]
    pub fn new(root_page: Box<Page>) -> Box<Tree> {
        let tree = Box::new(Tree {
            root: PageRef::new_mem(root_page),
        });
        let page = tree.root.page();
        // SAFETY: the root page was just moved in and is not yet visible
        // to any other session; the root cell address is stable because
        // the tree is boxed.
        unsafe {
            page.as_mut().parent_ref = &tree.root as *const PageRef as *mut PageRef;
        }
        tree
    }

    #[inline]
    pub fn root_ref(&self) -> &PageRef {
        &self.root
    }

    /// Whether the page is the tree root, by parent-cell identity.
    #[inline]
    pub fn is_root(&self, page: &Page) -> bool {
        std::ptr::eq(page.parent_ref, &self.root)
    }

    /// Persisted root location, once the root has been evicted. The
    /// invalid sentinel means the tree reconciled to nothing.
    #[inline]
    pub fn root_addr(&self) -> Option<(PageAddr, u32)> {
        if self.root.state() != RefState::OnDisk {
            return None;
        }
        let addr = self.root.addr();
        if addr == ADDR_INVALID {
            return None;
        }
        Some((addr, self.root.size()))
    }
}

impl Drop for Tree {
    #[inline]
    fn drop(&mut self) {
        let page = self.root.page();
        if !page.is_null() {
            // SAFETY: dropping the tree is the owner's assertion that no
            // session still works below the root.
            unsafe {
                free_subtree(page);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::{Child, PageType};

    #[test]
    fn test_root_identity() {
        let tree = Tree::new(Page::new_row_internal(vec![(
            b"k".to_vec(),
            Child::Mem(Page::new_leaf(PageType::RowLeaf)),
        )]));
        let root = tree.root_ref().page();
        let root_page = unsafe { root.as_ref() };
        assert!(tree.is_root(root_page));
        assert_eq!(tree.root_ref().state(), RefState::InMemory);
        assert!(tree.root_addr().is_none());

        let child = root_page.child_ref(0).page();
        assert!(!tree.is_root(unsafe { child.as_ref() }));
    }
}
