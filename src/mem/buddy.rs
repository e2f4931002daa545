//! Implementation of the buddy system that is responsible for allocating
//! physical page frames, that will then be used by either the page cache
//! or directly by the kernel.

use super::{
    cache::{PageCache, Watermarks},
    order_for_pages, pages_for_order, Error, Frame, FrameList, PageDescriptor, PageFrame,
    PageState, Result,
};
use core::cmp;

/// The default number of orders of a buddy system.
///
/// Linux uses `11` as the number of orders, so just use it too.
/// The largest block is `2^(DEFAULT_MAX_ORDER - 1)` pages.
pub const DEFAULT_MAX_ORDER: usize = 11;

/// The central structure that is responsible for allocating page frames
/// using the buddy algorithm.
///
/// `MAX_ORDER` is the number of orders, meaning the valid orders
/// are `0..MAX_ORDER`.
pub struct BuddySystem<'a, P, const MAX_ORDER: usize = DEFAULT_MAX_ORDER> {
    pub(super) name: &'static str,
    pub(super) pages: &'a mut [P],
    pub(super) free_area: [FrameList; MAX_ORDER],
    pub(super) cache: PageCache,
}

impl<'a, P: PageFrame, const MAX_ORDER: usize> BuddySystem<'a, P, MAX_ORDER> {
    /// The largest order this buddy system can allocate.
    pub const TOP_ORDER: usize = MAX_ORDER - 1;

    /// The number of pages inside a block of the largest order.
    pub const MAX_BLOCK_PAGES: usize = pages_for_order(Self::TOP_ORDER);

    /// Create a buddy system that manages `count` page frames, starting at the
    /// descriptor `pages[offset]`.
    ///
    /// Every managed descriptor is reset, and the whole region is split into free
    /// blocks of the largest order. `count` must be a multiple of
    /// [`MAX_BLOCK_PAGES`](Self::MAX_BLOCK_PAGES), otherwise the remaining frames
    /// could never be allocated.
    ///
    /// The page cache is configured with the default [`Watermarks`].
    pub fn new(
        name: &'static str,
        pages: &'a mut [P],
        offset: usize,
        count: usize,
    ) -> Result<Self> {
        if name.is_empty() {
            log::error!("buddy system initialization failed: name is empty");
            return Err(Error::EmptyName);
        }

        if count == 0 {
            log::error!("{}: initialization failed: page count is zero", name);
            return Err(Error::ZeroPages);
        }

        if count % Self::MAX_BLOCK_PAGES != 0 {
            log::error!(
                "{}: initialization failed: {} pages are not a multiple of the block size {}",
                name,
                count,
                Self::MAX_BLOCK_PAGES
            );
            return Err(Error::UnalignedRegion);
        }

        let available = pages.len();
        let region = match offset.checked_add(count) {
            Some(end) => pages.get_mut(offset..end),
            None => None,
        };
        let pages: &'a mut [P] = match region {
            Some(pages) => pages,
            None => {
                log::error!(
                    "{}: initialization failed: {} pages at offset {} exceed the {} available descriptors",
                    name,
                    count,
                    offset,
                    available
                );
                return Err(Error::RegionOutOfBounds);
            }
        };

        pages
            .iter_mut()
            .for_each(|page| *page.descriptor_mut() = PageDescriptor::INIT);

        // initially, all the memory is divided into blocks of the largest order
        let mut free_area = [FrameList::EMPTY; MAX_ORDER];
        for block in (0..count).step_by(Self::MAX_BLOCK_PAGES) {
            pages[block].descriptor_mut().state = PageState::FreeRoot(Self::TOP_ORDER);
            free_area[Self::TOP_ORDER].push_back(pages, block);
        }

        log::debug!(
            "{}: managing {} pages as {} blocks of order {}",
            name,
            count,
            free_area[Self::TOP_ORDER].len(),
            Self::TOP_ORDER
        );

        Ok(Self {
            name,
            pages,
            free_area,
            cache: PageCache::new(Watermarks::DEFAULT),
        })
    }

    /// Create a buddy system like [`new`](Self::new), but configure the page
    /// cache with the given watermarks.
    pub fn with_watermarks(
        name: &'static str,
        pages: &'a mut [P],
        offset: usize,
        count: usize,
        watermarks: Watermarks,
    ) -> Result<Self> {
        let mut system = Self::new(name, pages, offset, count)?;
        system.cache = PageCache::new(watermarks);
        Ok(system)
    }

    /// Returns the diagnostic name of this buddy system.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the number of page frames managed by this buddy system.
    pub fn total_pages(&self) -> usize {
        self.pages.len()
    }

    /// Returns the state of the given frame, or `None` if the frame is not managed
    /// by this buddy system.
    pub fn state(&self, frame: Frame) -> Option<PageState> {
        self.pages
            .get(frame.index())
            .map(|page| page.descriptor().state)
    }

    /// Returns the per-frame structure of the given frame.
    pub fn page(&self, frame: Frame) -> Option<&P> {
        self.pages.get(frame.index())
    }

    /// Returns the number of free blocks of the given order.
    pub fn free_count(&self, order: usize) -> usize {
        self.free_area.get(order).map_or(0, FrameList::len)
    }

    /// Returns an iterator over the free blocks of the given order, in the order
    /// they will be handed out.
    pub fn free_blocks(&self, order: usize) -> impl Iterator<Item = Frame> + '_ {
        let list = self.free_area.get(order).copied().unwrap_or_default();
        list.iter(&*self.pages)
    }

    /// Allocates a block of `2^order` contiguous page frames.
    ///
    /// The smallest free block that is large enough will be used, and if it is
    /// larger than requested, it is split and the upper halves are made
    /// available again.
    pub fn alloc(&mut self, order: usize) -> Result<Frame> {
        if order >= MAX_ORDER {
            log::error!(
                "{}: requested order {} exceeds the maximum order {}",
                self.name,
                order,
                Self::TOP_ORDER
            );
            return Err(Error::OrderTooLarge);
        }

        let current = match (order..MAX_ORDER).find(|&order| !self.free_area[order].is_empty()) {
            Some(current) => current,
            None => {
                log::info!("{}: no free blocks available for order {}", self.name, order);
                return Err(Error::NoMemoryAvailable);
            }
        };

        let block = match self.free_area[current].front() {
            Some(block) => block.index(),
            None => return Err(Error::CorruptedFreeList),
        };
        self.check_free_block(block, current)?;

        // all upper halves that will be split off must be untouched pages
        // inside the found block
        if let Some(buddy) = (order..current)
            .map(|split| block + pages_for_order(split))
            .find(|&buddy| self.pages[buddy].descriptor().state != PageState::FreeInterior)
        {
            log::error!(
                "{}: page #{} inside free block #{} of order {} is in state {:?}",
                self.name,
                buddy,
                block,
                current,
                self.pages[buddy].descriptor().state
            );
            return Err(Error::CorruptedBuddy);
        }

        self.free_area[current].pop_front(self.pages);

        // +-- `block`
        // v
        // +---------------------------------+
        // |    block       |    buddy       |
        // +---------------------------------+
        //                  ^
        //                  +--- `block + 2^split`, becomes a free block of order `split`
        for split in (order..current).rev() {
            let buddy = block + pages_for_order(split);
            self.pages[buddy].descriptor_mut().state = PageState::FreeRoot(split);
            self.free_area[split].push_front(self.pages, buddy);

            log::trace!("{}: split off #{} with order {}", self.name, buddy, split);
        }

        self.pages[block].descriptor_mut().state = PageState::Allocated(order);
        Ok(Frame::new(block))
    }

    /// Allocates the smallest block that holds at least `count` pages.
    pub fn alloc_pages(&mut self, count: usize) -> Result<Frame> {
        if count == 0 {
            log::error!("{}: tried to allocate zero pages", self.name);
            return Err(Error::ZeroPages);
        }

        self.alloc(order_for_pages(count))
    }

    /// Returns a block that was allocated using [`alloc`](Self::alloc)
    /// back to this buddy system.
    ///
    /// The block is merged with its buddy as long as the buddy is free and has
    /// the same order. Freeing a frame that is not the first frame of an
    /// allocated block fails without changing anything.
    ///
    /// If a buddy claims to be free but is not linked into its free list,
    /// merging stops there, the block merged so far is released and
    /// [`Error::CorruptedBuddy`] is returned.
    pub fn free(&mut self, frame: Frame) -> Result<()> {
        let mut index = frame.index();
        let state = match self.pages.get(index) {
            Some(page) => page.descriptor().state,
            None => {
                log::error!(
                    "{}: frame {} is out of range (total pages: {})",
                    self.name,
                    frame,
                    self.pages.len()
                );
                return Err(Error::FrameOutOfRange);
            }
        };

        let mut order = match state {
            PageState::Allocated(order) => order,
            PageState::FreeRoot(order) => {
                log::error!(
                    "{}: attempted to free frame {} that is already free (order {})",
                    self.name,
                    frame,
                    order
                );
                return Err(Error::DoubleFree);
            }
            PageState::FreeInterior => {
                log::error!("{}: attempted to free non-root frame {}", self.name, frame);
                return Err(Error::NotRootPage);
            }
            PageState::Cached => {
                log::error!(
                    "{}: attempted to free frame {} which is owned by the page cache",
                    self.name,
                    frame
                );
                return Err(Error::PageIsCached);
            }
        };

        let mut result = Ok(());
        while order < Self::TOP_ORDER {
            // the addresses of two buddies only differ in the bit of their order
            let buddy = index ^ pages_for_order(order);
            if !self.is_buddy(buddy, order) {
                log::trace!(
                    "{}: #{} can not be merged with #{} at order {}",
                    self.name,
                    index,
                    buddy,
                    order
                );
                break;
            }

            if !self.free_area[order].remove(self.pages, buddy) {
                log::error!(
                    "{}: buddy #{} of #{} is free with order {}, but not in its free list",
                    self.name,
                    buddy,
                    index,
                    order
                );
                result = Err(Error::CorruptedBuddy);
                break;
            }

            // the block at the higher address is absorbed into the lower one
            let absorbed = cmp::max(index, buddy);
            self.pages[absorbed].descriptor_mut().state = PageState::FreeInterior;

            index &= buddy;
            order += 1;
        }

        self.pages[index].descriptor_mut().state = PageState::FreeRoot(order);
        self.free_area[order].push_front(self.pages, index);
        result
    }

    /// Checks if the page is the root of a free block with the given order.
    fn is_buddy(&self, index: usize, order: usize) -> bool {
        match self.pages.get(index) {
            Some(page) => page.descriptor().state == PageState::FreeRoot(order),
            None => false,
        }
    }

    /// Checks that `block` is a valid free block of the given order.
    pub(super) fn check_free_block(&self, block: usize, order: usize) -> Result<()> {
        let size = pages_for_order(order);
        let state = self.pages.get(block).map(|page| page.descriptor().state);

        if state != Some(PageState::FreeRoot(order))
            || block % size != 0
            || block + size > self.pages.len()
        {
            log::error!(
                "{}: free list of order {} contains #{} in state {:?}",
                self.name,
                order,
                block,
                state
            );
            return Err(Error::CorruptedFreeList);
        }

        Ok(())
    }
}
