use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

use crate::error::HeapError;

/// An indexed binary max-heap ordered by value and addressed by a composite key.
///
/// Keys and values live in two parallel arrays, and a key-to-position index
/// allows O(log n) removal and value update of arbitrary entries. A composite
/// key is any hashable tuple, e.g. `(NodeId, NodeId)`.
///
/// Keys must be unique: pushing a key that is already resident corrupts the
/// index. Entries with equal values are ordered by their position in the
/// array, so the result of a tie depends on the push/update history.
#[derive(Debug, Clone)]
pub struct CompositeKeyMaxHeap<K, V> {
    keys: Vec<K>,
    values: Vec<V>,
    positions: HashMap<K, usize>,
}

impl<K, V> Default for CompositeKeyMaxHeap<K, V> {
    fn default() -> Self {
        CompositeKeyMaxHeap {
            keys: Vec::new(),
            values: Vec::new(),
            positions: HashMap::new(),
        }
    }
}

impl<K, V> CompositeKeyMaxHeap<K, V>
where
    K: Copy + Eq + Hash + Debug,
    V: Copy + PartialOrd + Debug,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        CompositeKeyMaxHeap {
            keys: Vec::with_capacity(capacity),
            values: Vec::with_capacity(capacity),
            positions: HashMap::with_capacity(capacity),
        }
    }

    /// Insert a new entry. The key must not be resident already.
    pub fn push(&mut self, key: K, value: V) {
        debug_assert!(!self.positions.contains_key(&key), "duplicate heap key {:?}", key);
        self.keys.push(key);
        self.values.push(value);
        let last = self.values.len() - 1;
        self.sift_up(0, last, key, value);
    }

    /// The maximum entry, without removing it.
    pub fn top(&self) -> Result<(K, V), HeapError> {
        self.peek().ok_or(HeapError::EmptyHeap)
    }

    pub fn top_key(&self) -> Result<K, HeapError> {
        self.keys.first().copied().ok_or(HeapError::EmptyHeap)
    }

    pub fn top_value(&self) -> Result<V, HeapError> {
        self.values.first().copied().ok_or(HeapError::EmptyHeap)
    }

    /// Like `top`, for callers where an empty heap is a normal case.
    pub fn peek(&self) -> Option<(K, V)> {
        match (self.keys.first(), self.values.first()) {
            (Some(key), Some(value)) => Some((*key, *value)),
            _ => None,
        }
    }

    /// Remove and return the maximum entry.
    pub fn pop(&mut self) -> Result<(K, V), HeapError> {
        let (key, value) = self.top()?;
        self.positions.remove(&key);
        // Move the last entry into the root and repair downwards.
        if let Some((last_key, last_value)) = self.take_last() {
            if !self.values.is_empty() {
                let end = self.values.len();
                self.sift_down(0, end, last_key, last_value);
            }
        }
        Ok((key, value))
    }

    /// Remove an arbitrary entry and return its value.
    pub fn remove(&mut self, key: &K) -> Result<V, HeapError> {
        let position = self.position_of(key)?;
        let removed = self.values[position];
        self.positions.remove(key);

        let (last_key, last_value) = match self.take_last() {
            Some(last) => last,
            None => return Ok(removed),
        };
        if position == self.values.len() {
            // The removed entry was the last one, nothing to repair.
            return Ok(removed);
        }

        // The moved entry may belong above or below the vacated slot.
        if position > 0 && last_value > self.values[(position - 1) >> 1] {
            self.sift_up(0, position, last_key, last_value);
        } else {
            let end = self.values.len();
            self.sift_down(position, end, last_key, last_value);
        }
        Ok(removed)
    }

    /// Replace the value of a resident entry and restore the heap order.
    pub fn update_value(&mut self, key: &K, new_value: V) -> Result<(), HeapError> {
        let position = self.position_of(key)?;
        let old_value = self.values[position];
        self.values[position] = new_value;

        if new_value > old_value {
            self.sift_up(0, position, *key, new_value);
        } else {
            let end = self.values.len();
            self.sift_down(position, end, *key, new_value);
        }
        Ok(())
    }

    pub fn size(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.positions.contains_key(key)
    }

    /// The value stored under `key`, if resident.
    pub fn get(&self, key: &K) -> Option<V> {
        self.positions.get(key).map(|position| self.values[*position])
    }

    /// Resident entries in array order (root first, otherwise unordered).
    pub fn iter(&self) -> impl Iterator<Item = (K, V)> + '_ {
        self.keys.iter().copied().zip(self.values.iter().copied())
    }

    pub fn describe(&self) -> String {
        format!("CompositeKeyMaxHeap({} heap elements)", self.values.len())
    }

    pub fn describe_entry(&self, position: usize) -> Option<String> {
        let key = self.keys.get(position)?;
        let value = self.values.get(position)?;
        Some(format!(
            "CompositeKeyMaxHeapElement@{}(key {:?} and a value of {:?})",
            position, key, value
        ))
    }

    /// Check heap order and the key index against each other.
    pub fn is_consistent(&self) -> bool {
        if self.keys.len() != self.values.len() || self.positions.len() != self.keys.len() {
            return false;
        }
        for (position, key) in self.keys.iter().enumerate() {
            if self.positions.get(key) != Some(&position) {
                return false;
            }
            if position > 0 && self.values[position] > self.values[(position - 1) >> 1] {
                return false;
            }
        }
        true
    }

    fn position_of(&self, key: &K) -> Result<usize, HeapError> {
        self.positions.get(key).copied().ok_or_else(|| HeapError::NotFound {
            key: format!("{:?}", key),
        })
    }

    fn take_last(&mut self) -> Option<(K, V)> {
        match (self.keys.pop(), self.values.pop()) {
            (Some(key), Some(value)) => Some((key, value)),
            _ => None,
        }
    }

    /// Copy the entry at `source` into `target` and re-index it.
    fn shift(&mut self, target: usize, source: usize) {
        self.keys[target] = self.keys[source];
        self.values[target] = self.values[source];
        self.positions.insert(self.keys[target], target);
    }

    fn place(&mut self, position: usize, key: K, value: V) {
        self.keys[position] = key;
        self.values[position] = value;
        self.positions.insert(key, position);
    }

    /// Move the entry towards the root while it is strictly larger than its
    /// parent, never above `start`.
    fn sift_up(&mut self, start: usize, mut position: usize, key: K, value: V) {
        while position > start {
            let parent = (position - 1) >> 1;
            if value > self.values[parent] {
                self.shift(position, parent);
                position = parent;
            } else {
                break;
            }
        }
        self.place(position, key, value);
    }

    /// Pull the larger child up until a leaf is reached, then settle the entry
    /// from that leaf back towards `position`.
    fn sift_down(&mut self, mut position: usize, end: usize, key: K, value: V) {
        let start = position;
        let mut child = 2 * position + 1;
        while child < end {
            let right = child + 1;
            if right < end && !(self.values[child] > self.values[right]) {
                child = right;
            }
            self.shift(position, child);
            position = child;
            child = 2 * position + 1;
        }
        self.sift_up(start, position, key, value);
    }
}
