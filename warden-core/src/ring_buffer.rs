//! Fixed-capacity circular buffer.
//!
//! Backs the audit logger's recent-event cache. Inserts are O(1) and overwrite
//! the oldest element once the buffer is full. A single mutex guards the
//! storage; contention is expected to be low.

use parking_lot::Mutex;

/// A thread-safe ring buffer holding at most `capacity` items.
pub struct RingBuffer<T> {
    inner: Mutex<Slots<T>>,
    capacity: usize,
}

struct Slots<T> {
    items: Vec<Option<T>>,
    /// Index the next insert writes to.
    head: usize,
    len: usize,
}

impl<T: Clone> RingBuffer<T> {
    /// Create an empty buffer.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "ring buffer capacity must be at least 1");

        let mut items = Vec::with_capacity(capacity);
        items.resize_with(capacity, || None);

        Self {
            inner: Mutex::new(Slots {
                items,
                head: 0,
                len: 0,
            }),
            capacity,
        }
    }

    /// Insert an item, overwriting the oldest one when full.
    pub fn add(&self, item: T) {
        let mut slots = self.inner.lock();
        let head = slots.head;
        slots.items[head] = Some(item);
        slots.head = (head + 1) % self.capacity;
        if slots.len < self.capacity {
            slots.len += 1;
        }
    }

    /// Return up to `n` of the most recently added items, oldest first.
    pub fn get_last(&self, n: usize) -> Vec<T> {
        let slots = self.inner.lock();
        let count = n.min(slots.len);
        // `head` is one past the newest item; walk back `count` slots.
        let start = (slots.head + self.capacity - count) % self.capacity;

        (0..count)
            .filter_map(|offset| slots.items[(start + offset) % self.capacity].clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop every stored item.
    pub fn clear(&self) {
        let mut slots = self.inner.lock();
        slots.items.iter_mut().for_each(|slot| *slot = None);
        slots.head = 0;
        slots.len = 0;
    }
}
