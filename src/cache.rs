//! # 2Q Page Cache Queues
//!
//! This module implements the three replacement queues composed into the page
//! cache: a FIFO admission queue, a FIFO of "ghost" keys, and an LRU main
//! store. Together they form the 2Q policy (Johnson & Shasha, VLDB '94).
//!
//! ## Why 2Q Instead of Plain LRU?
//!
//! Plain LRU has a well-known failure mode for databases: one sequential scan
//! of a large table evicts the entire cache, because every scanned page
//! becomes "most recently used" exactly once. 2Q fixes this at near-FIFO
//! cost:
//!
//! - New pages are admitted into a small FIFO (`in`). One-shot scan pages
//!   flow through it and fall out without ever touching the main store.
//! - Keys evicted from `in` are remembered (key only, no data) in a ghost
//!   FIFO (`out`).
//! - A page that misses the cache but hits `out` has been seen twice in a
//!   short window. That page is worth keeping: it is admitted straight into
//!   the LRU main store (`main`).
//!
//! ## Capacity Split
//!
//! [`TwoQ::new(n)`](TwoQ::new) sizes the queues as `in = n/4`, `out = n/2`,
//! `main = n - n/4`. For `n < 4` some sub-queues get capacity zero; a
//! zero-capacity queue rejects every admission by handing the incoming entry
//! straight back as the eviction victim, so the composition keeps working
//! (a size-1 cache simply never retains anything in `main`).
//!
//! ## Storage
//!
//! Each queue is a dense pre-reserved `Vec` of `(key, value)` pairs scanned
//! linearly. The queues are small and the pairs are plain-old-data, so a
//! linear scan beats pointer-chasing containers here.
//!
//! ## Contract
//!
//! `push` never checks for duplicates: the caller must have verified absence
//! via `find` first. The page cache always does: a `push` only follows a
//! missed `find`.

/// FIFO queue with a circular overwrite cursor.
///
/// Entries keep their insertion order while the queue fills. Once full, the
/// oldest entry (under the cursor) is overwritten and returned as evicted.
#[derive(Debug)]
pub struct Fifo<K, V> {
    capacity: usize,
    items: Vec<(K, V)>,
    /// Slot to overwrite next; `items.len()` means "append end".
    next: usize,
}

impl<K: Copy + PartialEq, V: Copy> Fifo<K, V> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            items: Vec::with_capacity(capacity),
            next: 0,
        }
    }

    /// Linear scan; non-mutating.
    pub fn find(&self, key: K) -> Option<V> {
        self.items.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
    }

    /// Inserts `(key, value)`, returning the evicted pair when the queue was
    /// already full. The caller has verified via [`find`](Self::find) that
    /// `key` is absent.
    pub fn push(&mut self, key: K, value: V) -> Option<(K, V)> {
        if self.capacity == 0 {
            return Some((key, value));
        }

        if self.items.len() < self.capacity {
            self.items.push((key, value));
            self.next = self.items.len();
            return None;
        }

        if self.next == self.items.len() {
            self.next = 0;
        }

        let evicted = self.items[self.next];
        self.items[self.next] = (key, value);
        self.next += 1;

        Some(evicted)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.next = 0;
    }
}

/// LRU queue backed by the same dense `Vec`: front is oldest, back is newest.
#[derive(Debug)]
pub struct Lru<K, V> {
    capacity: usize,
    items: Vec<(K, V)>,
}

impl<K: Copy + PartialEq, V: Copy> Lru<K, V> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            items: Vec::with_capacity(capacity),
        }
    }

    /// Linear scan; a hit moves the entry to the back (most recent).
    pub fn find(&mut self, key: K) -> Option<V> {
        let pos = self.items.iter().position(|(k, _)| *k == key)?;

        let entry = self.items.remove(pos);
        self.items.push(entry);

        Some(entry.1)
    }

    /// Inserts `(key, value)`, evicting the least recently used pair when
    /// full. The caller has verified that `key` is absent.
    pub fn push(&mut self, key: K, value: V) -> Option<(K, V)> {
        if self.capacity == 0 {
            return Some((key, value));
        }

        let evicted = if self.items.len() < self.capacity {
            None
        } else {
            Some(self.items.remove(0))
        };

        self.items.push((key, value));
        evicted
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

/// The composed 2Q cache.
#[derive(Debug)]
pub struct TwoQ<K, V> {
    r#in: Fifo<K, V>,
    out: Fifo<K, ()>,
    main: Lru<K, V>,
}

impl<K: Copy + PartialEq, V: Copy> TwoQ<K, V> {
    /// Capacity is the total entry count across `in` and `main`.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity >= 1, "cache capacity must be at least 1");

        Self {
            r#in: Fifo::new(capacity / 4),
            out: Fifo::new(capacity / 2),
            main: Lru::new(capacity - capacity / 4),
        }
    }

    /// Probes `main` first, then `in`. A hit in `in` does not promote the
    /// entry; promotion happens only through the ghost queue on re-admission.
    pub fn find(&mut self, key: K) -> Option<V> {
        self.main.find(key).or_else(|| self.r#in.find(key))
    }

    /// Admits `(key, value)`, returning whatever entry lost its place.
    ///
    /// A key remembered in the ghost queue goes straight to `main`; anything
    /// else enters through `in`, and the key of whatever `in` evicts is
    /// recorded in the ghost queue (ghost-of-ghost evictions are discarded).
    pub fn push(&mut self, key: K, value: V) -> Option<(K, V)> {
        if self.out.find(key).is_some() {
            return self.main.push(key, value);
        }

        let evicted = self.r#in.push(key, value);

        if let Some((evicted_key, _)) = evicted {
            self.out.push(evicted_key, ());
        }

        evicted
    }

    /// Number of entries holding data (`in` + `main`; ghost keys not counted).
    pub fn len(&self) -> usize {
        self.r#in.len() + self.main.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.r#in.clear();
        self.out.clear();
        self.main.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_overwrites_oldest_in_insertion_order() {
        let mut q = Fifo::new(2);

        assert_eq!(q.push(1, 10), None);
        assert_eq!(q.push(2, 20), None);
        assert_eq!(q.find(1), Some(10));

        // Full: 3 overwrites the slot under the cursor (the oldest, 1).
        assert_eq!(q.push(3, 30), Some((1, 10)));
        assert_eq!(q.find(1), None);
        assert_eq!(q.find(2), Some(20));
        assert_eq!(q.find(3), Some(30));

        // Cursor advances cyclically: next victim is 2.
        assert_eq!(q.push(4, 40), Some((2, 20)));
    }

    #[test]
    fn fifo_find_does_not_mutate_order() {
        let mut q = Fifo::new(2);
        q.push(1, 10);
        q.push(2, 20);

        q.find(2);
        q.find(2);

        assert_eq!(q.push(3, 30), Some((1, 10)));
    }

    #[test]
    fn fifo_with_zero_capacity_rejects_everything() {
        let mut q: Fifo<u32, u32> = Fifo::new(0);

        assert_eq!(q.push(1, 10), Some((1, 10)));
        assert_eq!(q.find(1), None);
    }

    #[test]
    fn fifo_clear_resets_cursor() {
        let mut q = Fifo::new(2);
        q.push(1, 10);
        q.push(2, 20);
        q.push(3, 30);

        q.clear();

        assert_eq!(q.find(3), None);
        assert_eq!(q.push(4, 40), None);
        assert_eq!(q.push(5, 50), None);
        assert_eq!(q.push(6, 60), Some((4, 40)));
    }

    #[test]
    fn lru_evicts_least_recently_used() {
        let mut q = Lru::new(2);

        q.push(1, 10);
        q.push(2, 20);

        // Touch 1: now 2 is the least recently used.
        assert_eq!(q.find(1), Some(10));
        assert_eq!(q.push(3, 30), Some((2, 20)));

        assert_eq!(q.find(1), Some(10));
        assert_eq!(q.find(3), Some(30));
    }

    #[test]
    fn two_q_admission_path() {
        // n = 8: in = 2, out = 4, main = 6.
        let mut q = TwoQ::new(8);

        // First sight: lands in `in`.
        assert_eq!(q.push(1, 100), None);
        assert_eq!(q.find(1), Some(100));

        // A hit in `in` does not promote; two more pushes flush 1 out of `in`
        // and its key into the ghost queue.
        q.push(2, 200);
        let evicted = q.push(3, 300);
        assert_eq!(evicted, Some((1, 100)));
        assert_eq!(q.find(1), None);

        // Second sight of a ghost key: admitted straight into `main`.
        assert_eq!(q.push(1, 101), None);
        assert_eq!(q.find(1), Some(101));

        // Flushing `in` twice over does not displace the promoted entry.
        for k in 10..18 {
            q.push(k, k as i32);
        }
        assert_eq!(q.find(1), Some(101));
    }

    #[test]
    fn two_q_scan_does_not_pollute_main() {
        let mut q = TwoQ::new(8);

        // One-shot keys flow through `in` and never reach `main`.
        for k in 0..100 {
            assert!(q.find(k).is_none());
            q.push(k, k as i32);
        }

        // Only the last two (in = 8/4 = 2) survive anywhere.
        let retained: Vec<i32> = (0..100).filter(|&k| q.find(k).is_some()).collect();
        assert_eq!(retained, vec![98, 99]);
    }

    #[test]
    fn two_q_size_one_retains_nothing() {
        // n = 1: in = 0, out = 0, main = 1. Every admission bounces straight
        // off the zero-capacity `in`, and the ghost queue cannot remember it.
        let mut q = TwoQ::new(1);

        assert_eq!(q.push(7, 70), Some((7, 70)));
        assert_eq!(q.find(7), None);
        assert_eq!(q.push(7, 70), Some((7, 70)));
        assert_eq!(q.find(7), None);
    }

    #[test]
    fn two_q_size_two_promotes_on_second_miss() {
        // n = 2: in = 0, out = 1, main = 2. The first admission bounces but
        // leaves a ghost; the second admission of the same key reaches `main`.
        let mut q = TwoQ::new(2);

        assert_eq!(q.push(7, 70), Some((7, 70)));
        assert_eq!(q.find(7), None);

        assert_eq!(q.push(7, 71), None);
        assert_eq!(q.find(7), Some(71));
    }

    #[test]
    #[should_panic(expected = "capacity")]
    fn two_q_zero_capacity_is_a_programmer_error() {
        let _ = TwoQ::<u32, u32>::new(0);
    }
}
