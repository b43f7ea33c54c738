//! Object reuse for short-lived records.
//!
//! [`ObjectPool`] keeps a bounded stash of reset instances so hot paths can
//! skip an allocation. Pooling is an optimisation only: [`HeapAllocator`]
//! implements the same [`Allocator`] interface with plain allocation, and the
//! two are interchangeable without any observable difference.

use std::marker::PhantomData;

use parking_lot::Mutex;

/// A type that can be returned to a pool and handed out again.
pub trait Poolable: Default + Send + 'static {
    /// Clear every piece of state so the next renter sees a fresh value.
    fn reset(&mut self);
}

/// Source of instances for callers that want to recycle them.
pub trait Allocator<T>: Send + Sync + 'static {
    /// Hand out an instance, reusing one when possible.
    fn rent(&self) -> T;

    /// Give an instance back once the caller is done with it.
    fn release(&self, item: T);
}

/// Bounded, thread-safe pool of reusable instances.
pub struct ObjectPool<T> {
    items: Mutex<Vec<T>>,
    capacity: usize,
}

impl<T: Poolable> ObjectPool<T> {
    /// Create a pool that keeps at most `capacity` idle instances.
    pub fn new(capacity: usize) -> Self {
        Self {
            items: Mutex::new(Vec::with_capacity(capacity)),
            capacity,
        }
    }

    /// Number of idle instances ready to be rented.
    pub fn available(&self) -> usize {
        self.items.lock().len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<T: Poolable> Allocator<T> for ObjectPool<T> {
    fn rent(&self) -> T {
        // Pool exhaustion falls back to a fresh allocation.
        self.items.lock().pop().unwrap_or_default()
    }

    fn release(&self, mut item: T) {
        item.reset();
        let mut items = self.items.lock();
        if items.len() < self.capacity {
            items.push(item);
        }
    }
}

/// Allocator that always builds a new instance and drops returned ones.
pub struct HeapAllocator<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> HeapAllocator<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for HeapAllocator<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Poolable> Allocator<T> for HeapAllocator<T> {
    fn rent(&self) -> T {
        T::default()
    }

    fn release(&self, _item: T) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[derive(Default, Debug, PartialEq)]
    struct Scratch {
        label: String,
        hits: u32,
    }

    impl Poolable for Scratch {
        fn reset(&mut self) {
            self.label.clear();
            self.hits = 0;
        }
    }

    #[test]
    fn test_rent_from_empty_pool_allocates() {
        let pool: ObjectPool<Scratch> = ObjectPool::new(4);
        let item = pool.rent();

        assert_eq!(item, Scratch::default());
        assert_eq!(pool.available(), 0);
    }

    #[test]
    fn test_released_items_are_reset_before_reuse() {
        let pool = ObjectPool::new(4);
        let mut item: Scratch = pool.rent();
        item.label.push_str("alice|10.0.0.1");
        item.hits = 3;
        pool.release(item);

        assert_eq!(pool.available(), 1);
        let reused = pool.rent();
        assert_eq!(reused, Scratch::default());
        assert_eq!(pool.available(), 0);
    }

    #[test]
    fn test_release_beyond_capacity_discards() {
        let pool: ObjectPool<Scratch> = ObjectPool::new(2);
        for _ in 0..5 {
            pool.release(Scratch::default());
        }

        assert_eq!(pool.available(), 2);
        assert_eq!(pool.capacity(), 2);
    }

    #[test]
    fn test_heap_allocator_matches_pool_contract() {
        let heap: HeapAllocator<Scratch> = HeapAllocator::new();
        let mut item = heap.rent();
        item.hits = 9;
        heap.release(item);

        assert_eq!(heap.rent(), Scratch::default());
    }

    #[test]
    fn test_pool_is_shareable_across_threads() {
        let pool: Arc<ObjectPool<Scratch>> = Arc::new(ObjectPool::new(16));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let pool = Arc::clone(&pool);
                thread::spawn(move || {
                    for _ in 0..200 {
                        let mut item = pool.rent();
                        assert_eq!(item.hits, 0);
                        item.hits += 1;
                        pool.release(item);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert!(pool.available() <= 16);
    }
}
