//! Deadline-ordered queue shared by the isolated worker and the simulated hosts.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

struct Entry<K, T> {
    due: K,
    seq: u64,
    item: T,
}

impl<K: Ord, T> PartialEq for Entry<K, T> {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl<K: Ord, T> Eq for Entry<K, T> {}

impl<K: Ord, T> PartialOrd for Entry<K, T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<K: Ord, T> Ord for Entry<K, T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.due
            .cmp(&other.due)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

/// Min-queue by deadline; equal deadlines pop in insertion order
pub struct TimedQueue<K: Ord + Copy, T> {
    heap: BinaryHeap<Reverse<Entry<K, T>>>,
    next_seq: u64,
}

impl<K: Ord + Copy, T> TimedQueue<K, T> {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            next_seq: 0,
        }
    }

    pub fn push(&mut self, due: K, item: T) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Reverse(Entry { due, seq, item }));
    }

    /// Earliest deadline
    pub fn next_due(&self) -> Option<K> {
        self.heap.peek().map(|Reverse(entry)| entry.due)
    }

    /// Pop the earliest item if it is due at `now`
    pub fn pop_due(&mut self, now: K) -> Option<T> {
        if self.next_due()? > now {
            return None;
        }
        self.heap.pop().map(|Reverse(entry)| entry.item)
    }

    /// Deadlines of everything queued, earliest first
    pub fn deadlines(&self) -> Vec<K> {
        let mut due: Vec<K> = self.heap.iter().map(|Reverse(entry)| entry.due).collect();
        due.sort();
        due
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn clear(&mut self) {
        self.heap.clear();
    }
}

impl<K: Ord + Copy, T> Default for TimedQueue<K, T> {
    fn default() -> Self {
        Self::new()
    }
}
