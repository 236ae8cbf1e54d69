pub mod cache;
pub mod error;
pub mod evict;
pub mod page;
pub mod ptr;
pub mod rec;
pub mod session;
pub mod tree;

pub mod prelude {
    pub use crate::cache::{Cache, CacheConfig, CacheStats};
    pub use crate::error::*;
    pub use crate::evict::{evict, EvictFlags};
    pub use crate::page::*;
    pub use crate::ptr::PagePtr;
    pub use crate::rec::Reconciler;
    pub use crate::session::Session;
    pub use crate::tree::Tree;
}
