//! Mutex-guarded double-ended queue
//!
//! The single synchronization point between an endpoint's I/O thread and the
//! application threads draining messages. Every operation holds one mutex for
//! its duration; there are no blocking/wait semantics - callers needing them
//! poll `is_empty` (the endpoints' update/drain loops do exactly that).

use parking_lot::Mutex;
use std::collections::VecDeque;

/// Generic thread-safe deque used for both the per-connection outbound
/// buffer and the shared inbound message queue
#[derive(Debug)]
pub struct ConcurrentQueue<T> {
    inner: Mutex<VecDeque<T>>,
}

impl<T> ConcurrentQueue<T> {
    /// Create an empty queue
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(VecDeque::new()),
        }
    }

    /// Add an item to the front of the queue
    pub fn push_front(&self, item: T) {
        self.inner.lock().push_front(item);
    }

    /// Add an item to the back of the queue
    pub fn push_back(&self, item: T) {
        self.inner.lock().push_back(item);
    }

    /// Remove and return the item at the front, `None` when empty
    pub fn pop_front(&self) -> Option<T> {
        self.inner.lock().pop_front()
    }

    /// Remove and return the item at the back, `None` when empty
    pub fn pop_back(&self) -> Option<T> {
        self.inner.lock().pop_back()
    }

    /// True when the queue holds no items
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Number of items currently queued
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Drop every queued item
    pub fn clear(&self) {
        self.inner.lock().clear();
    }
}

impl<T: Clone> ConcurrentQueue<T> {
    /// Copy of the item at the front without removing it
    pub fn front(&self) -> Option<T> {
        self.inner.lock().front().cloned()
    }

    /// Copy of the item at the back without removing it
    pub fn back(&self) -> Option<T> {
        self.inner.lock().back().cloned()
    }
}

impl<T> Default for ConcurrentQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn fifo_through_push_back_pop_front() {
        let queue = ConcurrentQueue::new();
        queue.push_back(1);
        queue.push_back(2);
        queue.push_back(3);

        assert_eq!(queue.len(), 3);
        assert_eq!(queue.front(), Some(1));
        assert_eq!(queue.back(), Some(3));

        assert_eq!(queue.pop_front(), Some(1));
        assert_eq!(queue.pop_front(), Some(2));
        assert_eq!(queue.pop_front(), Some(3));
        assert_eq!(queue.pop_front(), None);
        assert!(queue.is_empty());
    }

    #[test]
    fn both_ends_are_usable() {
        let queue = ConcurrentQueue::new();
        queue.push_front("b");
        queue.push_front("a");
        queue.push_back("c");

        assert_eq!(queue.pop_back(), Some("c"));
        assert_eq!(queue.pop_back(), Some("b"));
        assert_eq!(queue.pop_back(), Some("a"));
        assert_eq!(queue.pop_back(), None);
    }

    #[test]
    fn clear_empties_the_queue() {
        let queue = ConcurrentQueue::new();
        for i in 0..10 {
            queue.push_back(i);
        }
        queue.clear();
        assert!(queue.is_empty());
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn concurrent_pushes_and_pops_preserve_every_item() {
        const PRODUCERS: usize = 4;
        const ITEMS_PER_PRODUCER: usize = 1000;

        let queue = Arc::new(ConcurrentQueue::new());

        let producers: Vec<_> = (0..PRODUCERS)
            .map(|p| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || {
                    for i in 0..ITEMS_PER_PRODUCER {
                        queue.push_back(p * ITEMS_PER_PRODUCER + i);
                    }
                })
            })
            .collect();

        let consumers: Vec<_> = (0..PRODUCERS)
            .map(|_| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || {
                    let mut taken = Vec::new();
                    while taken.len() < ITEMS_PER_PRODUCER {
                        if let Some(item) = queue.pop_front() {
                            taken.push(item);
                        } else {
                            thread::yield_now();
                        }
                    }
                    taken
                })
            })
            .collect();

        for handle in producers {
            handle.join().unwrap();
        }

        let mut all: Vec<usize> = consumers
            .into_iter()
            .flat_map(|handle| handle.join().unwrap())
            .collect();

        // Nothing lost, nothing duplicated
        all.sort_unstable();
        assert_eq!(all, (0..PRODUCERS * ITEMS_PER_PRODUCER).collect::<Vec<_>>());
        assert!(queue.is_empty());
    }
}
