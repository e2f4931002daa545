//! Read-only queries over the state of a buddy system.

use super::{
    pages_for_order, BuddySystem, Error, FrameList, PageFrame, PageState, Result, PAGE_SIZE,
};
use crate::unit;
use core::fmt::{self, Write};

/// Statistics of a buddy system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocStats {
    /// The name of the allocator these stats belong to.
    pub name: &'static str,
    /// The number of bytes that are handed out to users.
    pub allocated: usize,
    /// The number of bytes that are kept inside the page cache.
    pub cached: usize,
    /// The number of bytes that are left for allocation.
    pub free: usize,
    /// The total number of bytes that this allocator manages.
    pub total: usize,
}

impl AllocStats {
    /// Create a new [`AllocStats`] instance for the given allocator name.
    pub const fn with_name(name: &'static str) -> Self {
        Self {
            name,
            allocated: 0,
            cached: 0,
            free: 0,
            total: 0,
        }
    }
}

impl fmt::Display for AllocStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.name)?;
        self.name.chars().try_for_each(|_| write!(f, "~"))?;
        writeln!(f, "\nAllocated: {}", unit::bytes(self.allocated))?;
        writeln!(f, "Cached: {}", unit::bytes(self.cached))?;
        writeln!(f, "Free: {}", unit::bytes(self.free))?;
        writeln!(f, "Total: {}", unit::bytes(self.total))?;
        self.name.chars().try_for_each(|_| write!(f, "~"))?;
        writeln!(f)?;
        Ok(())
    }
}

/// One line summary of a buddy system, see [`BuddySystem::summary`].
pub struct Summary<'s, 'a, P, const MAX_ORDER: usize> {
    system: &'s BuddySystem<'a, P, MAX_ORDER>,
}

impl<P: PageFrame, const MAX_ORDER: usize> fmt::Display for Summary<'_, '_, P, MAX_ORDER> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:<8} ", self.system.name)?;
        self.system
            .free_area
            .iter()
            .try_for_each(|list| write!(f, "{:>2} ", list.len()))?;
        write!(f, ": {}", unit::bytes(self.system.free_space()))
    }
}

/// [`fmt::Write`] implementation for a fixed byte buffer.
struct SliceWriter<'buf> {
    buf: &'buf mut [u8],
    pos: usize,
}

impl fmt::Write for SliceWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let end = self.pos.checked_add(s.len()).ok_or(fmt::Error)?;
        let target = self.buf.get_mut(self.pos..end).ok_or(fmt::Error)?;
        target.copy_from_slice(s.as_bytes());
        self.pos = end;
        Ok(())
    }
}

impl<'a, P: PageFrame, const MAX_ORDER: usize> BuddySystem<'a, P, MAX_ORDER> {
    /// Returns the number of bytes managed by this buddy system.
    pub fn total_space(&self) -> usize {
        self.pages.len() * PAGE_SIZE
    }

    /// Returns the number of bytes inside free blocks.
    ///
    /// Pages inside the page cache are not counted.
    pub fn free_space(&self) -> usize {
        self.free_area
            .iter()
            .enumerate()
            .map(|(order, list)| list.len() * pages_for_order(order))
            .sum::<usize>()
            * PAGE_SIZE
    }

    /// Returns the number of bytes inside the page cache.
    pub fn cached_space(&self) -> usize {
        self.cache.list.len() * PAGE_SIZE
    }

    /// Return the current statistics for this buddy system.
    pub fn stats(&self) -> AllocStats {
        let total = self.total_space();
        let free = self.free_space();
        let cached = self.cached_space();

        AllocStats {
            allocated: total.saturating_sub(free + cached),
            cached,
            free,
            total,
            ..AllocStats::with_name(self.name)
        }
    }

    /// Returns a one line summary containing the name, the number of free
    /// blocks for every order, and the free space.
    ///
    /// ```text
    /// normal    0  0  1  1  0 : 48.00 KiB
    /// ```
    pub fn summary(&self) -> Summary<'_, 'a, P, MAX_ORDER> {
        Summary { system: self }
    }

    /// Writes the [`summary`](Self::summary) into `buf`.
    ///
    /// Returns the number of bytes that were written. If the summary does not
    /// fit, `buf` is left zeroed.
    pub fn write_summary(&self, buf: &mut [u8]) -> Result<usize> {
        let mut writer = SliceWriter { buf, pos: 0 };
        if write!(writer, "{}", self.summary()).is_err() {
            writer.buf[..writer.pos].fill(0);
            log::error!(
                "{}: summary does not fit into {} bytes",
                self.name,
                writer.buf.len()
            );
            return Err(Error::BufferTooSmall);
        }

        Ok(writer.pos)
    }

    /// Verifies the complete bookkeeping of this buddy system.
    ///
    /// Every block inside a free list has to be a free root of the list's order,
    /// the list lengths have to match the page states, and the cache may only
    /// contain cached pages.
    pub fn check(&self) -> Result<()> {
        let mut free_pages = 0;
        for (order, list) in self.free_area.iter().enumerate() {
            let mut walked = 0;
            for block in list.iter(&*self.pages) {
                self.check_free_block(block.index(), order)?;
                walked += 1;
            }

            if walked != list.len() {
                log::error!(
                    "{}: free list of order {} has {} entries, but counts {}",
                    self.name,
                    order,
                    walked,
                    list.len()
                );
                return Err(Error::CountMismatch);
            }

            free_pages += list.len() * pages_for_order(order);
        }

        let mut cached = 0;
        for frame in self.cache.list.iter(&*self.pages) {
            let state = self.pages[frame.index()].descriptor().state;
            if state != PageState::Cached {
                log::error!(
                    "{}: page cache contains frame {} in state {:?}",
                    self.name,
                    frame,
                    state
                );
                return Err(Error::CorruptedFreeList);
            }
            cached += 1;
        }

        let (roots, cached_pages) = self.pages.iter().fold((0, 0), |(roots, cached), page| {
            match page.descriptor().state {
                PageState::FreeRoot(_) => (roots + 1, cached),
                PageState::Cached => (roots, cached + 1),
                _ => (roots, cached),
            }
        });
        let listed = self.free_area.iter().map(FrameList::len).sum::<usize>();

        if roots != listed || cached != self.cache.list.len() || cached_pages != cached {
            log::error!(
                "{}: {} free roots and {} cached pages, but {} listed blocks and {} listed pages",
                self.name,
                roots,
                cached_pages,
                listed,
                cached
            );
            return Err(Error::CountMismatch);
        }

        if free_pages + cached > self.pages.len() {
            log::error!(
                "{}: {} free and {} cached pages exceed the {} managed pages",
                self.name,
                free_pages,
                cached,
                self.pages.len()
            );
            return Err(Error::CountMismatch);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::mem::{BuddySystem, Error, PageDescriptor, PageState, PAGE_SIZE};

    type Buddy<'a> = BuddySystem<'a, PageDescriptor, 5>;

    #[test]
    fn space_queries() {
        let mut pages = vec![PageDescriptor::new(); 32];
        let mut system = Buddy::new("normal", &mut pages, 0, 32).unwrap();
        assert_eq!(system.total_space(), 32 * PAGE_SIZE);
        assert_eq!(system.free_space(), 32 * PAGE_SIZE);
        assert_eq!(system.cached_space(), 0);

        system.alloc(2).unwrap();
        system.alloc_cached().unwrap();
        assert_eq!(system.cache_size(), 27);
        assert_eq!(system.free_space(), 0);
        assert_eq!(system.cached_space(), 27 * PAGE_SIZE);

        let stats = system.stats();
        assert_eq!(stats.name, "normal");
        assert_eq!(stats.allocated, 5 * PAGE_SIZE);
        assert_eq!(stats.cached, 27 * PAGE_SIZE);
        assert_eq!(stats.total, 32 * PAGE_SIZE);
        assert!(stats.to_string().contains("Allocated: 20.00 KiB"));
        system.check().unwrap();
    }

    #[test]
    fn summary_lists_free_blocks() {
        let mut pages = vec![PageDescriptor::new(); 16];
        let mut system = Buddy::new("normal", &mut pages, 0, 16).unwrap();
        assert_eq!(
            system.summary().to_string(),
            "normal    0  0  0  0  1 : 64.00 KiB"
        );

        system.alloc(2).unwrap();
        let mut buf = [0u8; 64];
        let len = system.write_summary(&mut buf).unwrap();
        assert_eq!(&buf[..len], b"normal    0  0  1  1  0 : 48.00 KiB");

        let mut small = [0u8; 16];
        assert_eq!(system.write_summary(&mut small), Err(Error::BufferTooSmall));
        assert!(small.iter().all(|&byte| byte == 0));
    }

    #[test]
    fn check_detects_corruption() {
        let mut pages = vec![PageDescriptor::new(); 16];
        {
            let mut system = Buddy::new("normal", &mut pages, 0, 16).unwrap();
            system.alloc(2).unwrap();
            system.check().unwrap();
        }

        // a free root that is not linked into any list
        pages[12].state = PageState::FreeRoot(2);
        let system = BuddySystem::<PageDescriptor, 5> {
            name: "normal",
            pages: &mut pages,
            free_area: Default::default(),
            cache: crate::mem::cache::PageCache::new(Default::default()),
        };
        assert_eq!(system.check(), Err(Error::CountMismatch));
    }
}
