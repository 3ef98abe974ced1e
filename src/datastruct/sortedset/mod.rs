//! Sorted set
//!
//! A member -> score map kept in lockstep with a [`SkipList`] over the same
//! members. The map answers score lookups in O(1); the skip list answers rank
//! and score-range queries in O(log n).

mod border;
mod skiplist;

use std::collections::HashMap;

use bytes::Bytes;

pub use border::ScoreBorder;
pub use skiplist::{Element, SkipList, MAX_LEVEL};

use crate::error::{KvError, Result};

#[derive(Debug, Clone, Default)]
pub struct SortedSet {
    dict: HashMap<Bytes, f64>,
    skiplist: SkipList,
}

impl SortedSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.skiplist.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Add or re-score a member. Returns true only for a new member.
    pub fn add(&mut self, member: impl AsRef<[u8]>, score: f64) -> bool {
        let member = member.as_ref();
        if let Some((stored, old)) = self.dict.get_key_value(member) {
            let (stored, old) = (stored.clone(), *old);
            if old != score {
                self.skiplist.remove(member, old);
                self.skiplist.insert(stored.clone(), score);
                self.dict.insert(stored, score);
            }
            return false;
        }
        let member = Bytes::copy_from_slice(member);
        self.dict.insert(member.clone(), score);
        self.skiplist.insert(member, score);
        true
    }

    /// Score of `member`
    pub fn get(&self, member: impl AsRef<[u8]>) -> Option<f64> {
        self.dict.get(member.as_ref()).copied()
    }

    pub fn contains(&self, member: impl AsRef<[u8]>) -> bool {
        self.dict.contains_key(member.as_ref())
    }

    pub fn remove(&mut self, member: impl AsRef<[u8]>) -> bool {
        let member = member.as_ref();
        match self.dict.remove(member) {
            Some(score) => {
                self.skiplist.remove(member, score);
                true
            }
            None => false,
        }
    }

    /// 0-based rank, ascending unless `desc`
    pub fn get_rank(&self, member: impl AsRef<[u8]>, desc: bool) -> Option<usize> {
        let member = member.as_ref();
        let score = self.get(member)?;
        let rank = self.skiplist.get_rank(member, score)?;
        Some(if desc { self.len() - rank } else { rank - 1 })
    }

    // =========================================================================
    // Rank ranges
    // =========================================================================

    /// Visit ranks `[start, stop)` until `consumer` returns false.
    /// Bounds are not clamped.
    pub fn for_each(
        &self,
        start: usize,
        stop: usize,
        desc: bool,
        mut consumer: impl FnMut(&Element) -> bool,
    ) -> Result<()> {
        let size = self.len();
        if start > stop || stop > size {
            return Err(KvError::OutOfRange(format!(
                "rank range [{}, {}) on sorted set of size {}",
                start, stop, size
            )));
        }
        if start == stop {
            return Ok(());
        }
        let mut cursor = if desc {
            self.skiplist.get_by_rank(size - start)
        } else {
            self.skiplist.get_by_rank(start + 1)
        };
        for _ in start..stop {
            let Some(current) = cursor else { break };
            if !consumer(self.skiplist.element(current)) {
                break;
            }
            cursor = if desc {
                self.skiplist.prev(current)
            } else {
                self.skiplist.next(current)
            };
        }
        Ok(())
    }

    /// Elements at ranks `[start, stop)`
    pub fn range(&self, start: usize, stop: usize, desc: bool) -> Result<Vec<Element>> {
        let mut elements = Vec::with_capacity(stop.saturating_sub(start));
        self.for_each(start, stop, desc, |element| {
            elements.push(element.clone());
            true
        })?;
        Ok(elements)
    }

    /// Every element, ascending
    pub fn iter(&self) -> impl Iterator<Item = &Element> + '_ {
        std::iter::successors(self.skiplist.first(), move |&index| self.skiplist.next(index))
            .map(move |index| self.skiplist.element(index))
    }

    // =========================================================================
    // Score ranges
    // =========================================================================

    /// Number of members inside the borders
    pub fn count(&self, min: &ScoreBorder, max: &ScoreBorder) -> usize {
        let (Some(first), Some(last)) = (
            self.skiplist.first_in_range(min, max),
            self.skiplist.last_in_range(min, max),
        ) else {
            return 0;
        };
        let rank_of = |index: usize| {
            let element = self.skiplist.element(index);
            self.skiplist.get_rank(&element.member, element.score)
        };
        match (rank_of(first), rank_of(last)) {
            (Some(low), Some(high)) if high >= low => high - low + 1,
            _ => 0,
        }
    }

    /// Visit members inside the borders, skipping `offset` matches and
    /// visiting at most `limit` (`limit < 0` = unbounded)
    pub fn for_each_by_score(
        &self,
        min: &ScoreBorder,
        max: &ScoreBorder,
        offset: usize,
        limit: i64,
        desc: bool,
        mut consumer: impl FnMut(&Element) -> bool,
    ) {
        let step = |index: usize| {
            if desc {
                self.skiplist.prev(index)
            } else {
                self.skiplist.next(index)
            }
        };
        let mut cursor = if desc {
            self.skiplist.last_in_range(min, max)
        } else {
            self.skiplist.first_in_range(min, max)
        };
        let mut skip = offset;
        while skip > 0 {
            let Some(current) = cursor else { break };
            cursor = step(current);
            skip -= 1;
        }

        let mut visited: i64 = 0;
        while let Some(current) = cursor {
            if limit >= 0 && visited >= limit {
                break;
            }
            let element = self.skiplist.element(current);
            if !min.admits_above(element.score) || !max.admits_below(element.score) {
                break;
            }
            if !consumer(element) {
                break;
            }
            visited += 1;
            cursor = step(current);
        }
    }

    pub fn range_by_score(
        &self,
        min: &ScoreBorder,
        max: &ScoreBorder,
        offset: usize,
        limit: i64,
        desc: bool,
    ) -> Vec<Element> {
        let mut elements = Vec::new();
        if limit == 0 {
            return elements;
        }
        self.for_each_by_score(min, max, offset, limit, desc, |element| {
            elements.push(element.clone());
            true
        });
        elements
    }

    // =========================================================================
    // Bulk removal
    // =========================================================================

    /// Remove members inside the borders, returning how many went
    pub fn remove_by_score(&mut self, min: &ScoreBorder, max: &ScoreBorder) -> usize {
        let removed = self.skiplist.remove_range_by_score(min, max, 0);
        self.forget(&removed);
        removed.len()
    }

    /// Remove 0-based ranks `[start, stop)`
    pub fn remove_by_rank(&mut self, start: usize, stop: usize) -> usize {
        let removed = self.skiplist.remove_range_by_rank(start + 1, stop + 1);
        self.forget(&removed);
        removed.len()
    }

    /// Remove and return up to `count` lowest members, lowest first
    pub fn pop_min(&mut self, count: usize) -> Vec<Element> {
        if count == 0 {
            return Vec::new();
        }
        let Some(first) = self.skiplist.first() else {
            return Vec::new();
        };
        let border = ScoreBorder::inclusive(self.skiplist.element(first).score);
        let removed = self
            .skiplist
            .remove_range_by_score(&border, &ScoreBorder::POS_INF, count);
        self.forget(&removed);
        removed
    }

    /// Remove and return up to `count` highest members, highest first
    pub fn pop_max(&mut self, count: usize) -> Vec<Element> {
        let size = self.len();
        if count == 0 || size == 0 {
            return Vec::new();
        }
        let start = size.saturating_sub(count) + 1;
        let mut removed = self.skiplist.remove_range_by_rank(start, size + 1);
        self.forget(&removed);
        removed.reverse();
        removed
    }

    fn forget(&mut self, removed: &[Element]) {
        for element in removed {
            self.dict.remove(element.member.as_ref());
        }
    }
}
