//! Physical page allocator for the Windy kernel.
//!
//! A [`BuddySystem`] manages a contiguous span of page frames, described by an
//! arena of [`PageDescriptor`]s, and hands out power-of-two blocks of frames.
//! Single pages can be routed through a small watermarked cache that sits in
//! front of the buddy algorithm.
//!
//! The allocator itself contains no locking. Shared instances should be
//! wrapped into a [`LockedBuddySystem`].
#![deny(rust_2018_idioms, rustdoc::broken_intra_doc_links)]
#![warn(missing_docs)]
#![cfg_attr(not(test), no_std)]

pub mod logger;
pub mod mem;
pub mod sync;
pub mod unit;

#[cfg(test)]
mod tests;

pub use mem::{
    AllocStats, BuddySystem, Error, ErrorKind, Frame, PageDescriptor, PageFlags, PageFrame,
    PageState, Result, Watermarks, DEFAULT_MAX_ORDER, PAGE_SIZE,
};
pub use sync::LockedBuddySystem;
