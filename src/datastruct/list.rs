//! Doubly linked list
//!
//! Nodes live in a slab (`Vec<Option<Node>>`) and link to each other by index,
//! with freed slots recycled. Index lookups walk from whichever end is closer.

use crate::error::{KvError, Result};

#[derive(Debug, Clone)]
struct Node<T> {
    value: T,
    prev: Option<usize>,
    next: Option<usize>,
}

/// Ordered sequence with O(1) operations at both ends
#[derive(Debug, Clone)]
pub struct LinkedList<T> {
    nodes: Vec<Option<Node<T>>>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    len: usize,
}

impl<T> Default for LinkedList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> LinkedList<T> {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    // =========================================================================
    // Slab plumbing
    // =========================================================================

    fn node(&self, index: usize) -> &Node<T> {
        match &self.nodes[index] {
            Some(node) => node,
            None => unreachable!("linked index {} points at a free slot", index),
        }
    }

    fn node_mut(&mut self, index: usize) -> &mut Node<T> {
        match &mut self.nodes[index] {
            Some(node) => node,
            None => unreachable!("linked index {} points at a free slot", index),
        }
    }

    fn alloc(&mut self, node: Node<T>) -> usize {
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

    fn unlink(&mut self, index: usize) -> T {
        let node = match self.nodes[index].take() {
            Some(node) => node,
            None => unreachable!("unlinking free slot {}", index),
        };
        match node.prev {
            Some(prev) => self.node_mut(prev).next = node.next,
            None => self.head = node.next,
        }
        match node.next {
            Some(next) => self.node_mut(next).prev = node.prev,
            None => self.tail = node.prev,
        }
        self.free.push(index);
        self.len -= 1;
        if self.len == 0 {
            self.nodes.clear();
            self.free.clear();
        }
        node.value
    }

    /// Slot of the node at `index`, walking from the nearer end
    fn find(&self, index: usize) -> Result<usize> {
        if index >= self.len {
            return Err(KvError::OutOfRange(format!(
                "index {} on list of length {}",
                index, self.len
            )));
        }
        let mut cursor;
        if index < self.len / 2 {
            cursor = self.head;
            for _ in 0..index {
                cursor = cursor.and_then(|slot| self.node(slot).next);
            }
        } else {
            cursor = self.tail;
            for _ in index + 1..self.len {
                cursor = cursor.and_then(|slot| self.node(slot).prev);
            }
        }
        cursor.ok_or_else(|| KvError::OutOfRange(format!("index {}", index)))
    }

    // =========================================================================
    // End operations
    // =========================================================================

    /// Append at the tail
    pub fn push_back(&mut self, value: T) {
        let slot = self.alloc(Node {
            value,
            prev: self.tail,
            next: None,
        });
        match self.tail {
            Some(tail) => self.node_mut(tail).next = Some(slot),
            None => self.head = Some(slot),
        }
        self.tail = Some(slot);
        self.len += 1;
    }

    /// Prepend at the head
    pub fn push_front(&mut self, value: T) {
        let slot = self.alloc(Node {
            value,
            prev: None,
            next: self.head,
        });
        match self.head {
            Some(head) => self.node_mut(head).prev = Some(slot),
            None => self.tail = Some(slot),
        }
        self.head = Some(slot);
        self.len += 1;
    }

    pub fn remove_first(&mut self) -> Option<T> {
        self.head.map(|slot| self.unlink(slot))
    }

    pub fn remove_last(&mut self) -> Option<T> {
        self.tail.map(|slot| self.unlink(slot))
    }

    pub fn first(&self) -> Option<&T> {
        self.head.map(|slot| &self.node(slot).value)
    }

    pub fn last(&self) -> Option<&T> {
        self.tail.map(|slot| &self.node(slot).value)
    }

    // =========================================================================
    // Index operations
    // =========================================================================

    pub fn get(&self, index: usize) -> Result<&T> {
        let slot = self.find(index)?;
        Ok(&self.node(slot).value)
    }

    /// Replace the value at `index`, returning the old one
    pub fn set(&mut self, index: usize, value: T) -> Result<T> {
        let slot = self.find(index)?;
        Ok(std::mem::replace(&mut self.node_mut(slot).value, value))
    }

    /// Insert before the element at `index`; `index == len` appends
    pub fn insert(&mut self, index: usize, value: T) -> Result<()> {
        if index == self.len {
            self.push_back(value);
            return Ok(());
        }
        let next = self.find(index)?;
        let prev = self.node(next).prev;
        let slot = self.alloc(Node {
            value,
            prev,
            next: Some(next),
        });
        match prev {
            Some(prev) => self.node_mut(prev).next = Some(slot),
            None => self.head = Some(slot),
        }
        self.node_mut(next).prev = Some(slot);
        self.len += 1;
        Ok(())
    }

    pub fn remove(&mut self, index: usize) -> Result<T> {
        let slot = self.find(index)?;
        Ok(self.unlink(slot))
    }

    // =========================================================================
    // Value operations
    // =========================================================================

    /// Remove every element matching `expected`
    pub fn remove_all_by_val(&mut self, expected: impl Fn(&T) -> bool) -> usize {
        self.remove_by_val(expected, 0)
    }

    /// Remove up to `count` matches scanning from the head (0 = no limit)
    pub fn remove_by_val(&mut self, expected: impl Fn(&T) -> bool, count: usize) -> usize {
        let mut removed = 0;
        let mut cursor = self.head;
        while let Some(slot) = cursor {
            cursor = self.node(slot).next;
            if expected(&self.node(slot).value) {
                self.unlink(slot);
                removed += 1;
                if removed == count {
                    break;
                }
            }
        }
        removed
    }

    /// Remove up to `count` matches scanning from the tail (0 = no limit)
    pub fn reverse_remove_by_val(&mut self, expected: impl Fn(&T) -> bool, count: usize) -> usize {
        let mut removed = 0;
        let mut cursor = self.tail;
        while let Some(slot) = cursor {
            cursor = self.node(slot).prev;
            if expected(&self.node(slot).value) {
                self.unlink(slot);
                removed += 1;
                if removed == count {
                    break;
                }
            }
        }
        removed
    }

    pub fn contains(&self, expected: impl Fn(&T) -> bool) -> bool {
        self.iter().any(expected)
    }

    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            list: self,
            front: self.head,
            back: self.tail,
            remaining: self.len,
        }
    }
}

impl<T: Clone> LinkedList<T> {
    /// Elements in `[start, stop)`. Bounds are not clamped.
    pub fn range(&self, start: usize, stop: usize) -> Result<Vec<T>> {
        if start > stop || stop > self.len {
            return Err(KvError::OutOfRange(format!(
                "range [{}, {}) on list of length {}",
                start, stop, self.len
            )));
        }
        Ok(self
            .iter()
            .skip(start)
            .take(stop - start)
            .cloned()
            .collect())
    }
}

impl<T> FromIterator<T> for LinkedList<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut list = LinkedList::new();
        for value in iter {
            list.push_back(value);
        }
        list
    }
}

/// Borrowing iterator, head to tail
pub struct Iter<'a, T> {
    list: &'a LinkedList<T>,
    front: Option<usize>,
    back: Option<usize>,
    remaining: usize,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let node = self.list.node(self.front?);
        self.front = node.next;
        self.remaining -= 1;
        Some(&node.value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T> DoubleEndedIterator for Iter<'_, T> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let node = self.list.node(self.back?);
        self.back = node.prev;
        self.remaining -= 1;
        Some(&node.value)
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}
