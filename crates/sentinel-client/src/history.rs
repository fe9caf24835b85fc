//! Bounded history of recent samples.

use std::collections::VecDeque;

/// Fixed-capacity FIFO keeping only the most recent items.
#[derive(Clone, Debug)]
pub struct HistoryBuffer<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> HistoryBuffer<T> {
    /// A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append to the tail, evicting the head if the buffer is full.
    pub fn push(&mut self, item: T) {
        if self.items.len() == self.capacity {
            let _ = self.items.pop_front();
        }
        self.items.push_back(item);
    }

    /// Maximum number of items held.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of items held.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether nothing is held.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Most recently pushed item.
    pub fn latest(&self) -> Option<&T> {
        self.items.back()
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    /// Drop every item.
    pub fn clear(&mut self) {
        self.items.clear();
    }
}

impl<T: Clone> HistoryBuffer<T> {
    /// Current contents in insertion order.
    pub fn snapshot(&self) -> Vec<T> {
        self.items.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overflow_evicts_oldest() {
        let mut buf = HistoryBuffer::new(50);
        for i in 1..=51 {
            buf.push(i);
        }
        assert_eq!(buf.len(), 50);
        let snap = buf.snapshot();
        assert_eq!(snap.first(), Some(&2));
        assert_eq!(snap.last(), Some(&51));
    }

    #[test]
    fn never_exceeds_capacity() {
        let mut buf = HistoryBuffer::new(3);
        for i in 0..100 {
            buf.push(i);
            assert!(buf.len() <= 3);
        }
        assert_eq!(buf.snapshot(), vec![97, 98, 99]);
    }

    #[test]
    fn snapshot_does_not_mutate() {
        let mut buf = HistoryBuffer::new(4);
        buf.push("a");
        buf.push("b");
        let _ = buf.snapshot();
        assert_eq!(buf.snapshot(), vec!["a", "b"]);
        assert_eq!(buf.latest(), Some(&"b"));
    }

    #[test]
    fn zero_capacity_holds_one() {
        let mut buf = HistoryBuffer::new(0);
        buf.push(1);
        buf.push(2);
        assert_eq!(buf.capacity(), 1);
        assert_eq!(buf.snapshot(), vec![2]);
    }
}
