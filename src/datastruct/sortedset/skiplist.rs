//! Skip list with spans
//!
//! Nodes are ordered by `(score, member)`. Every forward link records the
//! number of level-0 nodes it jumps over, which turns rank lookups into a
//! single top-down descent.
//!
//! ```text
//! L2  HDR ───────────3──────────► c
//! L1  HDR ──1──► a ──────2──────► c ──1──► d
//! L0  HDR ──1──► a ──1──► b ──1──► c ──1──► d
//! ```
//!
//! Nodes sit in a slab addressed by index; slot 0 is the header.

use bytes::Bytes;
use rand::Rng;

use super::border::ScoreBorder;

pub const MAX_LEVEL: usize = 16;

const HEADER: usize = 0;

/// A member and its score. Members compare bytewise.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub member: Bytes,
    pub score: f64,
}

impl Element {
    /// Strict `(score, member)` ordering
    fn precedes(&self, score: f64, member: &[u8]) -> bool {
        self.score < score || (self.score == score && self.member.as_ref() < member)
    }

    fn is(&self, score: f64, member: &[u8]) -> bool {
        self.score == score && self.member.as_ref() == member
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Level {
    forward: Option<usize>,
    span: usize,
}

#[derive(Debug, Clone)]
struct Node {
    element: Element,
    backward: Option<usize>,
    levels: Vec<Level>,
}

#[derive(Debug, Clone)]
pub struct SkipList {
    nodes: Vec<Option<Node>>,
    free: Vec<usize>,
    tail: Option<usize>,
    length: usize,
    level: usize,
}

impl Default for SkipList {
    fn default() -> Self {
        Self::new()
    }
}

fn random_level() -> usize {
    let mut rng = rand::thread_rng();
    let mut level = 1;
    while level < MAX_LEVEL && rng.gen_bool(0.5) {
        level += 1;
    }
    level
}

impl SkipList {
    pub fn new() -> Self {
        let header = Node {
            element: Element {
                member: Bytes::new(),
                score: 0.0,
            },
            backward: None,
            levels: vec![Level::default(); MAX_LEVEL],
        };
        Self {
            nodes: vec![Some(header)],
            free: Vec::new(),
            tail: None,
            length: 0,
            level: 1,
        }
    }

    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    // =========================================================================
    // Slab plumbing
    // =========================================================================

    fn node(&self, index: usize) -> &Node {
        match &self.nodes[index] {
            Some(node) => node,
            None => unreachable!("skip list link {} points at a free slot", index),
        }
    }

    fn node_mut(&mut self, index: usize) -> &mut Node {
        match &mut self.nodes[index] {
            Some(node) => node,
            None => unreachable!("skip list link {} points at a free slot", index),
        }
    }

    fn forward(&self, index: usize, level: usize) -> Option<usize> {
        self.node(index).levels[level].forward
    }

    fn alloc(&mut self, node: Node) -> usize {
        match self.free.pop() {
            Some(slot) => {
                self.nodes[slot] = Some(node);
                slot
            }
            None => {
                self.nodes.push(Some(node));
                self.nodes.len() - 1
            }
        }
    }

    // =========================================================================
    // Navigation (used by SortedSet)
    // =========================================================================

    pub(super) fn element(&self, index: usize) -> &Element {
        &self.node(index).element
    }

    pub(super) fn first(&self) -> Option<usize> {
        self.forward(HEADER, 0)
    }

    pub(super) fn last(&self) -> Option<usize> {
        self.tail
    }

    pub(super) fn next(&self, index: usize) -> Option<usize> {
        self.forward(index, 0)
    }

    pub(super) fn prev(&self, index: usize) -> Option<usize> {
        self.node(index).backward
    }

    // =========================================================================
    // Mutation
    // =========================================================================

    /// Insert a member that is not yet present
    pub fn insert(&mut self, member: Bytes, score: f64) {
        let mut update = [HEADER; MAX_LEVEL];
        let mut rank = [0usize; MAX_LEVEL];

        let mut x = HEADER;
        for i in (0..self.level).rev() {
            rank[i] = if i == self.level - 1 { 0 } else { rank[i + 1] };
            while let Some(next) = self.forward(x, i) {
                if !self.node(next).element.precedes(score, &member) {
                    break;
                }
                rank[i] += self.node(x).levels[i].span;
                x = next;
            }
            update[i] = x;
        }

        let level = random_level();
        if level > self.level {
            for i in self.level..level {
                rank[i] = 0;
                update[i] = HEADER;
                self.node_mut(HEADER).levels[i].span = self.length;
            }
            self.level = level;
        }

        let new = self.alloc(Node {
            element: Element { member, score },
            backward: None,
            levels: vec![Level::default(); level],
        });

        for i in 0..level {
            let before = self.node(update[i]).levels[i];
            let skipped = rank[0] - rank[i];
            self.node_mut(new).levels[i] = Level {
                forward: before.forward,
                span: before.span - skipped,
            };
            self.node_mut(update[i]).levels[i] = Level {
                forward: Some(new),
                span: skipped + 1,
            };
        }
        for i in level..self.level {
            self.node_mut(update[i]).levels[i].span += 1;
        }

        self.node_mut(new).backward = (update[0] != HEADER).then_some(update[0]);
        match self.forward(new, 0) {
            Some(next) => self.node_mut(next).backward = Some(new),
            None => self.tail = Some(new),
        }
        self.length += 1;
    }

    fn remove_node(&mut self, target: usize, update: &[usize; MAX_LEVEL]) -> Element {
        for i in 0..self.level {
            let before = update[i];
            if self.forward(before, i) == Some(target) {
                let removed = self.node(target).levels[i];
                let level = &mut self.node_mut(before).levels[i];
                level.span += removed.span;
                level.span -= 1;
                level.forward = removed.forward;
            } else {
                self.node_mut(before).levels[i].span -= 1;
            }
        }

        let backward = self.node(target).backward;
        match self.forward(target, 0) {
            Some(next) => self.node_mut(next).backward = backward,
            None => self.tail = backward,
        }
        while self.level > 1 && self.forward(HEADER, self.level - 1).is_none() {
            self.level -= 1;
        }
        self.length -= 1;

        let node = match self.nodes[target].take() {
            Some(node) => node,
            None => unreachable!("removing free slot {}", target),
        };
        self.free.push(target);
        if self.length == 0 {
            self.reset();
        }
        node.element
    }

    fn reset(&mut self) {
        self.nodes.truncate(1);
        self.free.clear();
        for level in self.node_mut(HEADER).levels.iter_mut() {
            *level = Level::default();
        }
        self.tail = None;
        self.level = 1;
    }

    /// Remove `(member, score)`. Returns false when absent.
    pub fn remove(&mut self, member: &[u8], score: f64) -> bool {
        let mut update = [HEADER; MAX_LEVEL];
        let mut x = HEADER;
        for i in (0..self.level).rev() {
            while let Some(next) = self.forward(x, i) {
                if !self.node(next).element.precedes(score, member) {
                    break;
                }
                x = next;
            }
            update[i] = x;
        }
        match self.forward(x, 0) {
            Some(found) if self.node(found).element.is(score, member) => {
                self.remove_node(found, &update);
                true
            }
            _ => false,
        }
    }

    /// Remove members inside the borders, lowest first, stopping after
    /// `limit` removals (`0` = no limit)
    pub fn remove_range_by_score(
        &mut self,
        min: &ScoreBorder,
        max: &ScoreBorder,
        limit: usize,
    ) -> Vec<Element> {
        let mut update = [HEADER; MAX_LEVEL];
        let mut x = HEADER;
        for i in (0..self.level).rev() {
            while let Some(next) = self.forward(x, i) {
                if min.admits_above(self.node(next).element.score) {
                    break;
                }
                x = next;
            }
            update[i] = x;
        }

        let mut removed = Vec::new();
        let mut cursor = self.forward(x, 0);
        while let Some(current) = cursor {
            if !max.admits_below(self.node(current).element.score) {
                break;
            }
            let next = self.forward(current, 0);
            removed.push(self.remove_node(current, &update));
            if limit > 0 && removed.len() == limit {
                break;
            }
            cursor = next;
        }
        removed
    }

    /// Remove members with 1-based rank in `[start, stop)`
    pub fn remove_range_by_rank(&mut self, start: usize, stop: usize) -> Vec<Element> {
        let mut update = [HEADER; MAX_LEVEL];
        let mut traversed = 0;
        let mut x = HEADER;
        for i in (0..self.level).rev() {
            while let Some(next) = self.forward(x, i) {
                let span = self.node(x).levels[i].span;
                if traversed + span >= start {
                    break;
                }
                traversed += span;
                x = next;
            }
            update[i] = x;
        }

        let mut removed = Vec::new();
        let mut rank = traversed + 1;
        let mut cursor = self.forward(x, 0);
        while let Some(current) = cursor {
            if rank >= stop {
                break;
            }
            let next = self.forward(current, 0);
            removed.push(self.remove_node(current, &update));
            cursor = next;
            rank += 1;
        }
        removed
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// 1-based rank of `(member, score)`
    pub fn get_rank(&self, member: &[u8], score: f64) -> Option<usize> {
        let mut rank = 0;
        let mut x = HEADER;
        for i in (0..self.level).rev() {
            while let Some(next) = self.forward(x, i) {
                let element = &self.node(next).element;
                let at_or_before = element.precedes(score, member) || element.is(score, member);
                if !at_or_before {
                    break;
                }
                rank += self.node(x).levels[i].span;
                x = next;
            }
            if x != HEADER && self.node(x).element.member.as_ref() == member {
                return Some(rank);
            }
        }
        None
    }

    /// Node at 1-based `rank`
    pub(super) fn get_by_rank(&self, rank: usize) -> Option<usize> {
        let mut traversed = 0;
        let mut x = HEADER;
        for i in (0..self.level).rev() {
            while let Some(next) = self.forward(x, i) {
                let span = self.node(x).levels[i].span;
                if traversed + span > rank {
                    break;
                }
                traversed += span;
                x = next;
            }
            if traversed == rank {
                return (x != HEADER).then_some(x);
            }
        }
        None
    }

    /// True when at least one member lies inside the borders
    pub fn has_in_range(&self, min: &ScoreBorder, max: &ScoreBorder) -> bool {
        if ScoreBorder::is_empty_range(min, max) {
            return false;
        }
        match (self.first(), self.tail) {
            (Some(first), Some(last)) => {
                min.admits_above(self.node(last).element.score)
                    && max.admits_below(self.node(first).element.score)
            }
            _ => false,
        }
    }

    /// Lowest node inside the borders
    pub(super) fn first_in_range(&self, min: &ScoreBorder, max: &ScoreBorder) -> Option<usize> {
        if !self.has_in_range(min, max) {
            return None;
        }
        let mut x = HEADER;
        for i in (0..self.level).rev() {
            while let Some(next) = self.forward(x, i) {
                if min.admits_above(self.node(next).element.score) {
                    break;
                }
                x = next;
            }
        }
        let first = self.forward(x, 0)?;
        max.admits_below(self.node(first).element.score).then_some(first)
    }

    /// Highest node inside the borders
    pub(super) fn last_in_range(&self, min: &ScoreBorder, max: &ScoreBorder) -> Option<usize> {
        if !self.has_in_range(min, max) {
            return None;
        }
        let mut x = HEADER;
        for i in (0..self.level).rev() {
            while let Some(next) = self.forward(x, i) {
                if !max.admits_below(self.node(next).element.score) {
                    break;
                }
                x = next;
            }
        }
        (x != HEADER && min.admits_above(self.node(x).element.score)).then_some(x)
    }
}
