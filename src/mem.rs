//! Implementation of the physical page allocator.

pub mod buddy;
pub mod cache;
pub mod linked_list;
pub mod page;
pub mod stats;

pub use buddy::{BuddySystem, DEFAULT_MAX_ORDER};
pub use cache::Watermarks;
pub use linked_list::FrameList;
pub use page::{Frame, PageDescriptor, PageFlags, PageFrame, PageState};
pub use stats::AllocStats;

use displaydoc_lite::displaydoc;

/// The size of a single memory page is 4KiB,
/// this is also the size of order-0 in the buddy
/// allocator.
pub const PAGE_SIZE: usize = 4 * crate::unit::KIB;

/// Result for every operation of the page allocator.
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Calculates the number of pages inside a block of the given `order`.
pub const fn pages_for_order(order: usize) -> usize {
    1 << order
}

/// Calculates the size in bytes for the given order.
pub const fn size_for_order(order: usize) -> usize {
    pages_for_order(order) * PAGE_SIZE
}

/// Calculates the first order where `count` pages would fit in.
///
/// This function may return an order that is larger than any
/// order an allocator is able to serve.
pub fn order_for_pages(count: usize) -> usize {
    match count.checked_next_power_of_two() {
        Some(pages) => pages.trailing_zeros() as usize,
        None => usize::BITS as usize,
    }
}

displaydoc! {
    /// Any error that can happen while operating on a buddy system.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Error {
        /// the requested order exceeds the maximum order
        OrderTooLarge,
        /// a buddy system requires a non-empty name
        EmptyName,
        /// a buddy system must manage at least one page
        ZeroPages,
        /// the managed region does not fit into the given descriptors
        RegionOutOfBounds,
        /// the number of pages is not a multiple of the largest block
        UnalignedRegion,
        /// the frame is outside of the managed region
        FrameOutOfRange,
        /// the low watermark must not be above the high watermark
        InvalidWatermarks,
        /// the buffer is too small for the formatted output
        BufferTooSmall,
        /// there is no free block that is large enough
        NoMemoryAvailable,
        /// tried to free a block that is already free
        DoubleFree,
        /// tried to free a frame that is not the first frame of a block
        NotRootPage,
        /// tried to free a page that is owned by the page cache
        PageIsCached,
        /// the page cache only accepts allocated single pages
        NotCachedPage,
        /// a free list contains a page that is not a free block of that order
        CorruptedFreeList,
        /// a page inside a free block was found in an invalid state
        CorruptedBuddy,
        /// the free block counters do not match the page states
        CountMismatch,
    }
}

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The caller passed an argument that can never succeed.
    InvalidArgument,
    /// The request was valid, but there is not enough free memory.
    Exhausted,
    /// The internal bookkeeping, or the caller, violated an invariant.
    Corruption,
}

impl Error {
    /// Return the kind of this error.
    pub fn kind(self) -> ErrorKind {
        match self {
            Error::OrderTooLarge
            | Error::EmptyName
            | Error::ZeroPages
            | Error::RegionOutOfBounds
            | Error::UnalignedRegion
            | Error::FrameOutOfRange
            | Error::InvalidWatermarks
            | Error::BufferTooSmall => ErrorKind::InvalidArgument,
            Error::NoMemoryAvailable => ErrorKind::Exhausted,
            Error::DoubleFree
            | Error::NotRootPage
            | Error::PageIsCached
            | Error::NotCachedPage
            | Error::CorruptedFreeList
            | Error::CorruptedBuddy
            | Error::CountMismatch => ErrorKind::Corruption,
        }
    }

    /// Returns whether the caller may recover from this error,
    /// e.g. by reclaiming memory or falling back to another zone.
    pub fn is_recoverable(self) -> bool {
        self.kind() == ErrorKind::Exhausted
    }
}
