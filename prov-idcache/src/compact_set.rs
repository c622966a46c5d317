//! Adaptive small set
//!
//! Most index entries hold between zero and three members, so a `HashSet`
//! per entry would dominate memory. `CompactSet` starts as a fixed array of
//! two slots, doubles while inserting past capacity, and switches to a
//! `HashSet` once the array would grow beyond `INLINE_CEILING` slots. When
//! removals bring a hashed set back to `INLINE_CEILING` members or fewer it
//! is packed into an array again.
//!
//! Array invariant: live members occupy a contiguous prefix of the slots,
//! empty slots only trail. Iteration order is unspecified in both
//! representations.

use std::collections::{hash_set, HashSet};
use std::fmt;
use std::hash::Hash;

/// Largest array capacity before switching to a `HashSet`
pub const INLINE_CEILING: usize = 8;

/// Array capacity allocated on first insert
const INITIAL_CAPACITY: usize = 2;

enum Repr<T> {
    Empty,
    Inline(Box<[Option<T>]>),
    Hashed(HashSet<T>),
}

/// Set container that trades hashing overhead for linear scans while small
pub struct CompactSet<T> {
    repr: Repr<T>,
}

fn empty_slots<T>(capacity: usize) -> Box<[Option<T>]> {
    std::iter::repeat_with(|| None).take(capacity).collect()
}

impl<T: Eq + Hash> CompactSet<T> {
    /// Create an empty set (no storage allocated)
    pub fn new() -> Self {
        Self { repr: Repr::Empty }
    }

    /// Insert `item`; returns `false` if an equal item was already present
    pub fn insert(&mut self, item: T) -> bool {
        match &mut self.repr {
            Repr::Empty => {
                let mut slots = empty_slots(INITIAL_CAPACITY);
                slots[0] = Some(item);
                self.repr = Repr::Inline(slots);
                true
            }
            Repr::Inline(slots) => {
                let mut free = None;
                for (i, slot) in slots.iter().enumerate() {
                    match slot {
                        Some(existing) if *existing == item => return false,
                        Some(_) => {}
                        None => {
                            free = Some(i);
                            break;
                        }
                    }
                }

                if let Some(i) = free {
                    slots[i] = Some(item);
                    return true;
                }

                // Full: grow the array or migrate to a hash set
                let capacity = slots.len() * 2;
                let members = slots.iter_mut().filter_map(Option::take);
                if capacity <= INLINE_CEILING {
                    let mut grown = empty_slots(capacity);
                    let mut len = 0;
                    for (slot, member) in grown.iter_mut().zip(members) {
                        *slot = Some(member);
                        len += 1;
                    }
                    grown[len] = Some(item);
                    self.repr = Repr::Inline(grown);
                } else {
                    let mut set = HashSet::with_capacity(capacity);
                    set.extend(members);
                    set.insert(item);
                    self.repr = Repr::Hashed(set);
                }
                true
            }
            Repr::Hashed(set) => set.insert(item),
        }
    }

    /// Remove `item`; returns `true` if it was present
    pub fn remove(&mut self, item: &T) -> bool {
        match &mut self.repr {
            Repr::Empty => false,
            Repr::Inline(slots) => {
                let Some(pos) = slots
                    .iter()
                    .position(|slot| slot.as_ref() == Some(item))
                else {
                    return false;
                };

                // Shift the tail left to keep members in a contiguous prefix
                for i in pos..slots.len() - 1 {
                    slots[i] = slots[i + 1].take();
                }
                let last = slots.len() - 1;
                slots[last] = None;

                if slots[0].is_none() {
                    self.repr = Repr::Empty;
                }
                true
            }
            Repr::Hashed(set) => {
                if !set.remove(item) {
                    return false;
                }
                if set.len() <= INLINE_CEILING {
                    let capacity = set.len().next_power_of_two().max(INITIAL_CAPACITY);
                    let mut slots = empty_slots(capacity);
                    for (slot, member) in slots.iter_mut().zip(set.drain()) {
                        *slot = Some(member);
                    }
                    self.repr = if slots[0].is_none() {
                        Repr::Empty
                    } else {
                        Repr::Inline(slots)
                    };
                }
                true
            }
        }
    }

    pub fn contains(&self, item: &T) -> bool {
        match &self.repr {
            Repr::Empty => false,
            Repr::Inline(slots) => slots
                .iter()
                .map_while(Option::as_ref)
                .any(|member| member == item),
            Repr::Hashed(set) => set.contains(item),
        }
    }
}

impl<T> CompactSet<T> {
    pub fn len(&self) -> usize {
        match &self.repr {
            Repr::Empty => 0,
            Repr::Inline(slots) => slots.iter().take_while(|slot| slot.is_some()).count(),
            Repr::Hashed(set) => set.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match &self.repr {
            Repr::Empty => true,
            Repr::Inline(slots) => slots[0].is_none(),
            Repr::Hashed(set) => set.is_empty(),
        }
    }

    /// Drop all members and release storage
    pub fn clear(&mut self) {
        self.repr = Repr::Empty;
    }

    /// Iterate members; a fresh call restarts from the beginning
    pub fn iter(&self) -> Iter<'_, T> {
        let inner = match &self.repr {
            Repr::Empty => IterInner::Empty,
            Repr::Inline(slots) => IterInner::Inline(slots.iter()),
            Repr::Hashed(set) => IterInner::Hashed(set.iter()),
        };
        Iter { inner }
    }

    /// `true` while backed by a `HashSet`
    #[cfg(test)]
    pub(crate) fn is_hashed(&self) -> bool {
        matches!(self.repr, Repr::Hashed(_))
    }

    /// Slot capacity of the array representation, `None` when hashed or empty
    #[cfg(test)]
    pub(crate) fn inline_capacity(&self) -> Option<usize> {
        match &self.repr {
            Repr::Inline(slots) => Some(slots.len()),
            _ => None,
        }
    }
}

impl<T> Default for CompactSet<T> {
    fn default() -> Self {
        Self { repr: Repr::Empty }
    }
}

impl<T: Clone> Clone for CompactSet<T> {
    fn clone(&self) -> Self {
        let repr = match &self.repr {
            Repr::Empty => Repr::Empty,
            Repr::Inline(slots) => Repr::Inline(slots.clone()),
            Repr::Hashed(set) => Repr::Hashed(set.clone()),
        };
        Self { repr }
    }
}

impl<T: fmt::Debug> fmt::Debug for CompactSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

/// Set equality, independent of representation
impl<T: Eq + Hash> PartialEq for CompactSet<T> {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|member| other.contains(member))
    }
}

impl<T: Eq + Hash> Eq for CompactSet<T> {}

impl<T: Eq + Hash> FromIterator<T> for CompactSet<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}

impl<T: Eq + Hash> Extend<T> for CompactSet<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for item in iter {
            self.insert(item);
        }
    }
}

impl<'a, T> IntoIterator for &'a CompactSet<T> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Borrowing iterator over a [`CompactSet`]
pub struct Iter<'a, T> {
    inner: IterInner<'a, T>,
}

enum IterInner<'a, T> {
    Empty,
    Inline(std::slice::Iter<'a, Option<T>>),
    Hashed(hash_set::Iter<'a, T>),
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.inner {
            IterInner::Empty => None,
            // Members form a prefix, so the first empty slot ends iteration
            IterInner::Inline(slots) => slots.next().and_then(Option::as_ref),
            IterInner::Hashed(members) => members.next(),
        }
    }
}
