//! Utilities for working with raw byte units.

use core::fmt;

/// `1 KiB`
pub const KIB: usize = 1 << 10;
/// `1 MiB`
pub const MIB: usize = 1 << 20;
/// `1 GiB`
pub const GIB: usize = 1 << 30;
/// `1 TiB`
pub const TIB: u64 = 1 << 40;

/// Wrapper around raw bytes that pretty-prints
/// them using the [`Display`](core::fmt::Display)
/// implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteUnit(pub usize);

/// Wrap the given number of bytes into a [`ByteUnit`].
pub fn bytes(count: usize) -> ByteUnit {
    ByteUnit(count)
}

impl fmt::Display for ByteUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bytes = self.0 as u64;
        let count = bytes as f64;

        if bytes < KIB as u64 {
            write!(f, "{} B", bytes)
        } else if bytes < MIB as u64 {
            write!(f, "{:.2} KiB", count / KIB as f64)
        } else if bytes < GIB as u64 {
            write!(f, "{:.2} MiB", count / MIB as f64)
        } else if bytes < TIB {
            write!(f, "{:.2} GiB", count / GIB as f64)
        } else {
            write!(f, "{:.2} TiB", count / TIB as f64)
        }
    }
}
