use std::collections::VecDeque;

/// Fixed-capacity FIFO; pushing past capacity evicts the oldest element.
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    capacity: usize,
    items: VecDeque<T>,
}

impl<T> RingBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            items: VecDeque::with_capacity(capacity.min(1024)),
        }
    }

    /// Appends `item`, returning the evicted element if the buffer was full.
    pub fn push(&mut self, item: T) -> Option<T> {
        if self.capacity == 0 {
            return Some(item);
        }
        let evicted = if self.items.len() == self.capacity {
            self.items.pop_front()
        } else {
            None
        };
        self.items.push_back(item);
        evicted
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> {
        self.items.iter()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

impl<T: Clone> RingBuffer<T> {
    pub fn to_vec(&self) -> Vec<T> {
        self.items.iter().cloned().collect()
    }
}

/// A history entry addressable by its sequence number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedSnapshot<T> {
    pub index: u64,
    pub item: T,
}

/// Bounded history whose indices are never reused, even after eviction.
#[derive(Debug, Clone)]
pub struct History<T> {
    entries: RingBuffer<IndexedSnapshot<T>>,
    last_index: u64,
}

impl<T> History<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: RingBuffer::new(capacity),
            last_index: 0,
        }
    }

    /// Records `item` under the next index (starting at 1) and returns it.
    pub fn push(&mut self, item: T) -> u64 {
        self.last_index += 1;
        let index = self.last_index;
        self.entries.push(IndexedSnapshot { index, item });
        index
    }

    /// Linear scan; the buffer is small and bounded.
    pub fn find(&self, index: u64) -> Option<&IndexedSnapshot<T>> {
        self.entries.iter().find(|snapshot| snapshot.index == index)
    }

    pub fn last_index(&self) -> u64 {
        self.last_index
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &IndexedSnapshot<T>> {
        self.entries.iter()
    }

    /// Drops every entry and restarts numbering at 1.
    pub fn reset(&mut self) {
        self.entries.clear();
        self.last_index = 0;
    }
}

impl<T: Clone> History<T> {
    pub fn to_vec(&self) -> Vec<IndexedSnapshot<T>> {
        self.entries.to_vec()
    }
}
