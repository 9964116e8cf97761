use std::collections::VecDeque;
use std::fmt;

/// Fixed-capacity FIFO. Pushing into a full queue evicts the oldest item.
pub struct CircularQueue<T> {
    deque: VecDeque<T>,
    capacity: usize,
}

impl<T: Clone> Clone for CircularQueue<T> {
    fn clone(&self) -> Self {
        Self {
            deque: self.deque.clone(),
            capacity: self.capacity,
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for CircularQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.deque.fmt(f)
    }
}

impl<T> CircularQueue<T> {
    /// A zero capacity is raised to one so a push always retains the newest item.
    #[inline]
    pub fn with_capacity(cap: usize) -> Self {
        let capacity = cap.max(1);

        Self {
            deque: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    #[inline]
    pub fn push(&mut self, item: T) -> Option<T> {
        let evicted = if self.is_full() {
            self.deque.pop_front()
        } else {
            None
        };

        self.deque.push_back(item);

        evicted
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.deque.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.deque.is_empty()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.deque.len() >= self.capacity
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn oldest(&self) -> Option<&T> {
        self.deque.front()
    }

    #[inline]
    pub fn newest(&self) -> Option<&T> {
        self.deque.back()
    }

    /// Oldest to newest.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &'_ T> {
        self.deque.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::CircularQueue;

    #[test]
    fn evicts_oldest_when_full() {
        let mut q = CircularQueue::with_capacity(3);
        assert_eq!(q.push(1), None);
        assert_eq!(q.push(2), None);
        assert_eq!(q.push(3), None);
        assert!(q.is_full());

        assert_eq!(q.push(4), Some(1));
        assert_eq!(q.len(), 3);
        assert_eq!(q.oldest(), Some(&2));
        assert_eq!(q.newest(), Some(&4));
        assert_eq!(q.iter().copied().collect::<Vec<_>>(), vec![2, 3, 4]);
    }

    #[test]
    fn zero_capacity_keeps_newest() {
        let mut q = CircularQueue::with_capacity(0);
        assert_eq!(q.capacity(), 1);
        q.push('a');
        assert_eq!(q.push('b'), Some('a'));
        assert_eq!(q.newest(), Some(&'b'));
        assert_eq!(q.len(), 1);
    }
}
