//! Per-frame metadata of the page allocator.

use super::linked_list::Link;
use core::fmt;

/// Index of a page frame inside the region managed by a buddy system.
///
/// Frame `0` is the first managed descriptor, which is not necessarily
/// the first element of the descriptor slice the system was created with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Frame(usize);

impl Frame {
    /// Create a frame from a raw index.
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Returns the raw index of this frame.
    pub const fn index(self) -> usize {
        self.0
    }

    /// Returns the byte offset of this frame from the start of the region.
    pub const fn offset(self) -> usize {
        self.0 * super::PAGE_SIZE
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The state of a single page frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageState {
    /// First frame of an allocated block of the given order.
    Allocated(usize),
    /// First frame of a free block that is linked into the free list of the given order.
    FreeRoot(usize),
    /// Any frame that is not the first frame of a block.
    FreeInterior,
    /// An allocated single page that is owned by the page cache.
    Cached,
}

impl PageState {
    /// Returns the order of the block this page is the root of.
    pub fn order(self) -> Option<usize> {
        match self {
            PageState::Allocated(order) | PageState::FreeRoot(order) => Some(order),
            PageState::Cached => Some(0),
            PageState::FreeInterior => None,
        }
    }

    /// Returns the flag representation of this state.
    pub fn flags(self) -> PageFlags {
        match self {
            PageState::Allocated(_) => PageFlags::ROOT,
            PageState::FreeRoot(_) => PageFlags::FREE | PageFlags::ROOT,
            PageState::FreeInterior => PageFlags::FREE,
            PageState::Cached => PageFlags::ROOT | PageFlags::CACHED,
        }
    }
}

bitflags::bitflags! {
    /// Flag view of a [`PageState`].
    pub struct PageFlags: u8 {
        /// The page is not allocated.
        const FREE = 1 << 0;
        /// The page is the first frame of an undivided block.
        const ROOT = 1 << 1;
        /// The page is resident in the page cache.
        const CACHED = 1 << 2;
    }
}

/// The buddy system metadata of a single page frame.
#[derive(Clone)]
pub struct PageDescriptor {
    pub(super) state: PageState,
    pub(super) link: Link,
}

impl PageDescriptor {
    /// An unmanaged descriptor.
    ///
    /// Every descriptor is reset once its region is handed to a buddy system.
    pub const INIT: Self = Self {
        state: PageState::FreeInterior,
        link: Link::UNLINKED,
    };

    /// Create a new, unmanaged descriptor.
    pub const fn new() -> Self {
        Self::INIT
    }

    /// Returns the current state of this page.
    pub fn state(&self) -> PageState {
        self.state
    }

    /// Returns the order of the block this page is the root of.
    pub fn order(&self) -> Option<usize> {
        self.state.order()
    }

    /// Returns the flag view of this page's state.
    pub fn flags(&self) -> PageFlags {
        self.state.flags()
    }

    /// Returns whether this page is currently linked into any list.
    pub fn is_linked(&self) -> bool {
        self.link.is_linked()
    }
}

impl Default for PageDescriptor {
    fn default() -> Self {
        Self::INIT
    }
}

impl fmt::Debug for PageDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageDescriptor")
            .field("state", &self.state)
            .field("flags", &self.flags())
            .finish()
    }
}

/// Types that embed a [`PageDescriptor`].
///
/// The kernel usually keeps a single array of per-frame structures, and the
/// buddy system metadata is only one part of them. This trait is used to
/// reach the descriptor inside such a structure.
pub trait PageFrame {
    /// Returns a reference to the embedded descriptor.
    fn descriptor(&self) -> &PageDescriptor;

    /// Returns a mutable reference to the embedded descriptor.
    fn descriptor_mut(&mut self) -> &mut PageDescriptor;
}

impl PageFrame for PageDescriptor {
    fn descriptor(&self) -> &PageDescriptor {
        self
    }

    fn descriptor_mut(&mut self) -> &mut PageDescriptor {
        self
    }
}
