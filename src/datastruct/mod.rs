//! Data Structures Module
//!
//! Value containers stored under keys:
//! - [`LinkedList`]: doubly linked sequence behind list commands
//! - [`SortedSet`]: score-ordered set backed by a skip list

pub mod list;
pub mod sortedset;

pub use list::LinkedList;
pub use sortedset::{Element, ScoreBorder, SkipList, SortedSet};

/// Turn inclusive, possibly negative `[start, stop]` indices into a half-open
/// `[start, stop)` range over `size` elements.
///
/// Negative indices count from the end, out-of-range indices clamp, and an
/// empty range comes back as `None`.
pub fn normalize_range(start: i64, stop: i64, size: usize) -> Option<(usize, usize)> {
    let size = i64::try_from(size).ok()?;
    let start = if start < -size {
        0
    } else if start < 0 {
        size + start
    } else if start >= size {
        return None;
    } else {
        start
    };
    let stop = if stop < -size {
        0
    } else if stop < 0 {
        size + stop + 1
    } else if stop < size {
        stop + 1
    } else {
        size
    };
    if stop <= start {
        return None;
    }
    Some((start as usize, stop as usize))
}
