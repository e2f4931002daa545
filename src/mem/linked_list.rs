//! Intrusive linked list of page frames.
//!
//! The list nodes live inside the [`PageDescriptor`](super::PageDescriptor)s
//! and refer to each other by frame index, so a list is only meaningful
//! together with the descriptor slice it was built on.

use super::{Frame, PageFrame};
use core::marker::PhantomData;

/// The list node that is embedded into every page descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Link {
    prev: Option<usize>,
    next: Option<usize>,
    linked: bool,
}

impl Link {
    pub(crate) const UNLINKED: Self = Self {
        prev: None,
        next: None,
        linked: false,
    };

    pub(crate) fn is_linked(&self) -> bool {
        self.linked
    }
}

fn link<P: PageFrame>(pages: &[P], frame: usize) -> &Link {
    &pages[frame].descriptor().link
}

fn link_mut<P: PageFrame>(pages: &mut [P], frame: usize) -> &mut Link {
    &mut pages[frame].descriptor_mut().link
}

/// Doubly linked list of frames, threaded through the descriptors.
///
/// A descriptor only has a single link, so a frame can be part of
/// at most one list at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameList {
    head: Option<usize>,
    tail: Option<usize>,
    len: usize,
}

impl FrameList {
    /// An empty list.
    pub const EMPTY: Self = Self {
        head: None,
        tail: None,
        len: 0,
    };

    /// Create a new, empty `FrameList`.
    pub const fn new() -> Self {
        Self::EMPTY
    }

    /// Returns whether this list is empty.
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Returns the number of frames inside this list.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns the first frame of this list without removing it.
    pub fn front(&self) -> Option<Frame> {
        self.head.map(Frame::new)
    }

    /// Insert `frame` as the first element of this list.
    ///
    /// `frame` must not be part of any list.
    pub(crate) fn push_front<P: PageFrame>(&mut self, pages: &mut [P], frame: usize) {
        debug_assert!(!link(pages, frame).is_linked(), "frame is already linked");

        let next = self.head;
        *link_mut(pages, frame) = Link {
            prev: None,
            next,
            linked: true,
        };

        match next {
            Some(next) => link_mut(pages, next).prev = Some(frame),
            None => self.tail = Some(frame),
        }

        self.head = Some(frame);
        self.len += 1;
    }

    /// Insert `frame` as the last element of this list.
    ///
    /// `frame` must not be part of any list.
    pub(crate) fn push_back<P: PageFrame>(&mut self, pages: &mut [P], frame: usize) {
        debug_assert!(!link(pages, frame).is_linked(), "frame is already linked");

        let prev = self.tail;
        *link_mut(pages, frame) = Link {
            prev,
            next: None,
            linked: true,
        };

        match prev {
            Some(prev) => link_mut(pages, prev).next = Some(frame),
            None => self.head = Some(frame),
        }

        self.tail = Some(frame);
        self.len += 1;
    }

    /// Removes the first frame from this list.
    pub(crate) fn pop_front<P: PageFrame>(&mut self, pages: &mut [P]) -> Option<usize> {
        let head = self.head?;
        self.unlink(pages, head);
        Some(head)
    }

    /// Removes `frame` from this list.
    ///
    /// Returns `false` if the frame was not linked at all. The caller must
    /// guarantee that a linked `frame` is part of `self` and not of another list.
    pub(crate) fn remove<P: PageFrame>(&mut self, pages: &mut [P], frame: usize) -> bool {
        if !link(pages, frame).is_linked() {
            return false;
        }

        self.unlink(pages, frame);
        true
    }

    fn unlink<P: PageFrame>(&mut self, pages: &mut [P], frame: usize) {
        let Link { prev, next, .. } = *link(pages, frame);

        match prev {
            Some(prev) => link_mut(pages, prev).next = next,
            None => self.head = next,
        }

        match next {
            Some(next) => link_mut(pages, next).prev = prev,
            None => self.tail = prev,
        }

        *link_mut(pages, frame) = Link::UNLINKED;
        self.len -= 1;
    }

    /// Returns an iterator over the frames of this list, from front to back.
    ///
    /// The iterator yields at most `pages.len()` items, even if the links
    /// were corrupted into a cycle.
    pub fn iter<'list, P: PageFrame>(&self, pages: &'list [P]) -> Iter<'list, P> {
        Iter {
            pages,
            head: self.head,
            remaining: pages.len(),
            _list: PhantomData,
        }
    }
}

impl Default for FrameList {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// Iterator over the frames of a [`FrameList`].
pub struct Iter<'list, P> {
    pages: &'list [P],
    head: Option<usize>,
    remaining: usize,
    _list: PhantomData<&'list FrameList>,
}

impl<P: PageFrame> Iterator for Iter<'_, P> {
    type Item = Frame;

    fn next(&mut self) -> Option<Self::Item> {
        let head = self.head?;
        if self.remaining == 0 || head >= self.pages.len() {
            self.head = None;
            return None;
        }

        self.remaining -= 1;
        self.head = link(self.pages, head).next;
        Some(Frame::new(head))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mem::PageDescriptor;

    fn collect(list: &FrameList, pages: &[PageDescriptor]) -> Vec<usize> {
        list.iter(pages).map(Frame::index).collect()
    }

    #[test]
    fn push_and_pop_keep_order() {
        let mut pages = vec![PageDescriptor::new(); 8];
        let mut list = FrameList::new();

        list.push_back(&mut pages, 2);
        list.push_back(&mut pages, 4);
        list.push_front(&mut pages, 6);

        assert_eq!(collect(&list, &pages), [6, 2, 4]);
        assert_eq!(list.len(), 3);
        assert_eq!(list.front(), Some(Frame::new(6)));

        assert_eq!(list.pop_front(&mut pages), Some(6));
        assert_eq!(list.pop_front(&mut pages), Some(2));
        assert_eq!(list.pop_front(&mut pages), Some(4));
        assert_eq!(list.pop_front(&mut pages), None);
        assert!(list.is_empty());
        assert!(pages.iter().all(|page| !page.is_linked()));
    }

    #[test]
    fn remove_from_any_position() {
        let mut pages = vec![PageDescriptor::new(); 8];
        let mut list = FrameList::new();
        for frame in 0..5 {
            list.push_back(&mut pages, frame);
        }

        assert!(list.remove(&mut pages, 2));
        assert!(list.remove(&mut pages, 0));
        assert!(list.remove(&mut pages, 4));
        assert_eq!(collect(&list, &pages), [1, 3]);
        assert_eq!(list.len(), 2);

        // not linked anymore
        assert!(!list.remove(&mut pages, 2));
        assert_eq!(list.len(), 2);

        list.push_back(&mut pages, 7);
        assert_eq!(collect(&list, &pages), [1, 3, 7]);
    }
}
