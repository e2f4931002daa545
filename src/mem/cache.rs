//! Cache of single pages that sits in front of the buddy system.
//!
//! Order-0 allocations are the most frequent ones, so instead of splitting
//! and merging blocks for every single page, a number of pages is kept
//! around. The cache is refilled up to the mid watermark once it drops below
//! the low watermark, and drained down to the mid watermark once it grows
//! above the high watermark.

use super::{BuddySystem, Error, Frame, FrameList, PageFrame, PageState, Result};

/// The thresholds that control when the page cache is refilled or drained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Watermarks {
    low: usize,
    high: usize,
}

impl Watermarks {
    /// The watermarks that are used if nothing else is configured.
    pub const DEFAULT: Self = Self { low: 10, high: 70 };

    /// Create a new set of watermarks.
    ///
    /// `low` must not be larger than `high`.
    pub fn new(low: usize, high: usize) -> Result<Self> {
        if low > high {
            log::error!(
                "low watermark {} is above the high watermark {}",
                low,
                high
            );
            return Err(Error::InvalidWatermarks);
        }

        Ok(Self { low, high })
    }

    /// Below this number of pages, the cache is refilled.
    pub fn low(&self) -> usize {
        self.low
    }

    /// Above this number of pages, the cache is drained.
    pub fn high(&self) -> usize {
        self.high
    }

    /// The number of pages the cache is refilled or drained to.
    pub fn mid(&self) -> usize {
        self.low + (self.high - self.low) / 2
    }
}

impl Default for Watermarks {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// The list of cached pages of a single buddy system.
pub(crate) struct PageCache {
    pub(super) list: FrameList,
    pub(super) watermarks: Watermarks,
}

impl PageCache {
    pub(crate) const fn new(watermarks: Watermarks) -> Self {
        Self {
            list: FrameList::EMPTY,
            watermarks,
        }
    }
}

impl<'a, P: PageFrame, const MAX_ORDER: usize> BuddySystem<'a, P, MAX_ORDER> {
    /// Returns the watermarks of the page cache.
    pub fn watermarks(&self) -> Watermarks {
        self.cache.watermarks
    }

    /// Replace the watermarks of the page cache.
    ///
    /// Pages that are already cached stay in the cache, the new watermarks
    /// take effect on the next cached allocation or deallocation.
    pub fn set_watermarks(&mut self, watermarks: Watermarks) {
        self.cache.watermarks = watermarks;
    }

    /// Returns the number of pages inside the page cache.
    pub fn cache_size(&self) -> usize {
        self.cache.list.len()
    }

    /// Allocates a single page through the page cache.
    pub fn alloc_cached(&mut self) -> Result<Frame> {
        let size = self.cache.list.len();
        let watermarks = self.cache.watermarks;
        if size < watermarks.low() {
            self.extend_cache(watermarks.mid() - size);
        }

        let frame = match self.cache.list.pop_front(self.pages) {
            Some(frame) => frame,
            None => {
                log::info!("{}: page cache is empty", self.name);
                return Err(Error::NoMemoryAvailable);
            }
        };

        self.pages[frame].descriptor_mut().state = PageState::Allocated(0);
        Ok(Frame::new(frame))
    }

    /// Returns a single page to the page cache.
    ///
    /// The page must be an allocated block of order `0`, either from
    /// [`alloc_cached`](Self::alloc_cached) or from [`alloc`](Self::alloc).
    pub fn free_cached(&mut self, frame: Frame) -> Result<()> {
        match self.state(frame) {
            Some(PageState::Allocated(0)) => {}
            Some(state @ PageState::Cached) | Some(state @ PageState::FreeRoot(_)) => {
                log::error!(
                    "{}: attempted to cache frame {} that is already free ({:?})",
                    self.name,
                    frame,
                    state
                );
                return Err(Error::DoubleFree);
            }
            Some(state) => {
                log::error!(
                    "{}: attempted to cache frame {} in state {:?}",
                    self.name,
                    frame,
                    state
                );
                return Err(Error::NotCachedPage);
            }
            None => {
                log::error!("{}: frame {} is out of range", self.name, frame);
                return Err(Error::FrameOutOfRange);
            }
        }

        let index = frame.index();
        self.pages[index].descriptor_mut().state = PageState::Cached;
        self.cache.list.push_front(self.pages, index);

        let size = self.cache.list.len();
        let watermarks = self.cache.watermarks;
        if size > watermarks.high() {
            self.shrink_cache(size - watermarks.mid())?;
        }

        Ok(())
    }

    /// Returns all cached pages to the buddy system.
    ///
    /// Returns the number of pages that were released.
    pub fn drain_cache(&mut self) -> Result<usize> {
        let count = self.cache.list.len();
        self.shrink_cache(count)?;
        Ok(count)
    }

    /// Moves up to `count` single pages from the buddy system into the cache.
    fn extend_cache(&mut self, count: usize) {
        for added in 0..count {
            let frame = match self.alloc(0) {
                Ok(frame) => frame.index(),
                Err(_) => {
                    log::debug!(
                        "{}: page cache extended by {} of {} pages",
                        self.name,
                        added,
                        count
                    );
                    return;
                }
            };

            self.pages[frame].descriptor_mut().state = PageState::Cached;
            self.cache.list.push_front(self.pages, frame);
        }

        log::debug!("{}: page cache extended by {} pages", self.name, count);
    }

    /// Returns up to `count` cached pages back to the buddy system.
    fn shrink_cache(&mut self, count: usize) -> Result<()> {
        for _ in 0..count {
            let frame = match self.cache.list.pop_front(self.pages) {
                Some(frame) => frame,
                None => break,
            };

            self.pages[frame].descriptor_mut().state = PageState::Allocated(0);
            self.free(Frame::new(frame))?;
        }

        log::debug!("{}: page cache shrunk by {} pages", self.name, count);
        Ok(())
    }
}
