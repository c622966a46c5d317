//! Bounded best-of-K selection
//!
//! Keeps the `limit` highest-scoring items seen so far in a min-heap, so the
//! weakest kept item is evicted in O(log K) when a better one arrives.
//! Among equal scores the earlier pushed item ranks higher, which makes
//! results deterministic within one run.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

struct Ranked<T> {
    score: f64,
    seq: usize,
    item: T,
}

impl<T> PartialEq for Ranked<T> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<T> Eq for Ranked<T> {}

impl<T> PartialOrd for Ranked<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Ranked<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            // Earlier push wins ties
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Keeps the `limit` best items by score
pub struct TopK<T> {
    limit: usize,
    seq: usize,
    heap: BinaryHeap<Reverse<Ranked<T>>>,
}

impl<T> TopK<T> {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            seq: 0,
            heap: BinaryHeap::with_capacity(limit.saturating_add(1).min(1024)),
        }
    }

    pub fn push(&mut self, item: T, score: f64) {
        if self.limit == 0 {
            return;
        }
        self.heap.push(Reverse(Ranked {
            score,
            seq: self.seq,
            item,
        }));
        self.seq += 1;
        if self.heap.len() > self.limit {
            self.heap.pop();
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.heap.len()
    }

    #[cfg(test)]
    fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Kept items, best first
    pub fn into_sorted_vec(self) -> Vec<(T, f64)> {
        // Ascending order of Reverse<_> is descending order of score
        self.heap
            .into_sorted_vec()
            .into_iter()
            .map(|Reverse(ranked)| (ranked.item, ranked.score))
            .collect()
    }
}
