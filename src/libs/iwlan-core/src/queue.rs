//! Bounded thread-safe queue.
//!
//! The queue is the only channel between workers: producers push commands or
//! events, a single consumer drains them in FIFO order. Push and pop exist in
//! blocking, non-blocking and timed variants, and the queue can be terminated
//! to release every waiter during shutdown.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::time::Duration;

/// Outcome of a queue operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueStatus {
    /// Operation completed.
    Ok,
    /// Non-blocking variant would have blocked.
    Retry,
    /// Timed variant ran out of time.
    TimedOut,
    /// Queue has been terminated.
    Done,
    /// Woken without the condition holding (interrupted).
    Interrupted,
}

struct QueueInner<T> {
    data: VecDeque<T>,
    bounds: usize,
    terminated: bool,
    full_waiters: u32,
    empty_waiters: u32,
}

/// Bounded MPMC queue built on a mutex and two condition variables.
pub struct BoundedQueue<T> {
    inner: Mutex<QueueInner<T>>,
    not_empty: Condvar,
    not_full: Condvar,
}

impl<T> BoundedQueue<T> {
    pub fn new(capacity: usize) -> Self {
        BoundedQueue {
            inner: Mutex::new(QueueInner {
                data: VecDeque::with_capacity(capacity),
                bounds: capacity,
                terminated: false,
                full_waiters: 0,
                empty_waiters: 0,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
        }
    }

    fn push_inner(&self, item: T, timeout: Option<Duration>, block: bool) -> QueueStatus {
        let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());

        if guard.terminated {
            return QueueStatus::Done;
        }

        if guard.data.len() == guard.bounds {
            if !block {
                return QueueStatus::Retry;
            }

            guard.full_waiters += 1;
            match timeout {
                Some(duration) => {
                    let (new_guard, result) = self
                        .not_full
                        .wait_timeout(guard, duration)
                        .unwrap_or_else(|e| e.into_inner());
                    guard = new_guard;
                    guard.full_waiters -= 1;
                    if result.timed_out() {
                        return QueueStatus::TimedOut;
                    }
                }
                None => {
                    guard = self.not_full.wait(guard).unwrap_or_else(|e| e.into_inner());
                    guard.full_waiters -= 1;
                }
            }

            if guard.data.len() == guard.bounds {
                if guard.terminated {
                    return QueueStatus::Done;
                }
                return QueueStatus::Interrupted;
            }
        }

        guard.data.push_back(item);
        if guard.empty_waiters > 0 {
            self.not_empty.notify_one();
        }
        QueueStatus::Ok
    }

    fn pop_inner(&self, timeout: Option<Duration>, block: bool) -> (QueueStatus, Option<T>) {
        let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());

        if guard.terminated && guard.data.is_empty() {
            return (QueueStatus::Done, None);
        }

        if guard.data.is_empty() {
            if !block {
                return (QueueStatus::Retry, None);
            }

            guard.empty_waiters += 1;
            match timeout {
                Some(duration) => {
                    let (new_guard, result) = self
                        .not_empty
                        .wait_timeout(guard, duration)
                        .unwrap_or_else(|e| e.into_inner());
                    guard = new_guard;
                    guard.empty_waiters -= 1;
                    if result.timed_out() {
                        return (QueueStatus::TimedOut, None);
                    }
                }
                None => {
                    guard = self
                        .not_empty
                        .wait(guard)
                        .unwrap_or_else(|e| e.into_inner());
                    guard.empty_waiters -= 1;
                }
            }

            if guard.data.is_empty() {
                if guard.terminated {
                    return (QueueStatus::Done, None);
                }
                return (QueueStatus::Interrupted, None);
            }
        }

        let item = guard.data.pop_front();
        if guard.full_waiters > 0 {
            self.not_full.notify_one();
        }
        (QueueStatus::Ok, item)
    }

    /// Push, blocking until space is available.
    pub fn push(&self, item: T) -> QueueStatus {
        self.push_inner(item, None, true)
    }

    /// Push without blocking.
    pub fn try_push(&self, item: T) -> QueueStatus {
        self.push_inner(item, None, false)
    }

    /// Push, waiting at most `timeout`.
    pub fn timed_push(&self, item: T, timeout: Duration) -> QueueStatus {
        self.push_inner(item, Some(timeout), true)
    }

    /// Pop, blocking until an item arrives.
    pub fn pop(&self) -> (QueueStatus, Option<T>) {
        self.pop_inner(None, true)
    }

    /// Pop without blocking.
    pub fn try_pop(&self) -> (QueueStatus, Option<T>) {
        self.pop_inner(None, false)
    }

    /// Pop, waiting at most `timeout`.
    pub fn timed_pop(&self, timeout: Duration) -> (QueueStatus, Option<T>) {
        self.pop_inner(Some(timeout), true)
    }

    pub fn len(&self) -> usize {
        let guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        guard.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Wake every waiter without changing queue contents.
    pub fn interrupt_all(&self) {
        let _guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    /// Terminate the queue. Pending items are still drained; pushes fail with
    /// `Done` and pops return `Done` once the queue is empty.
    pub fn terminate(&self) {
        {
            let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            guard.terminated = true;
        }
        self.interrupt_all();
    }

    pub fn is_terminated(&self) -> bool {
        let guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        guard.terminated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_push_pop() {
        let queue: BoundedQueue<i32> = BoundedQueue::new(10);

        assert_eq!(queue.push(42), QueueStatus::Ok);
        assert_eq!(queue.len(), 1);

        let (status, item) = queue.pop();
        assert_eq!(status, QueueStatus::Ok);
        assert_eq!(item, Some(42));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_try_variants_respect_bounds() {
        let queue: BoundedQueue<i32> = BoundedQueue::new(2);

        assert_eq!(queue.try_push(1), QueueStatus::Ok);
        assert_eq!(queue.try_push(2), QueueStatus::Ok);
        assert_eq!(queue.try_push(3), QueueStatus::Retry);

        assert_eq!(queue.try_pop(), (QueueStatus::Ok, Some(1)));
        assert_eq!(queue.try_pop(), (QueueStatus::Ok, Some(2)));
        assert_eq!(queue.try_pop(), (QueueStatus::Retry, None));
    }

    #[test]
    fn test_timed_pop_times_out() {
        let queue: BoundedQueue<i32> = BoundedQueue::new(4);

        let start = std::time::Instant::now();
        let (status, _) = queue.timed_pop(Duration::from_millis(10));
        assert_eq!(status, QueueStatus::TimedOut);
        assert!(start.elapsed().as_millis() >= 10);
    }

    #[test]
    fn test_terminate_releases_waiters() {
        let queue: Arc<BoundedQueue<i32>> = Arc::new(BoundedQueue::new(4));
        let consumer_queue = Arc::clone(&queue);

        let consumer = thread::spawn(move || consumer_queue.pop().0);

        thread::sleep(Duration::from_millis(20));
        queue.terminate();

        assert_eq!(consumer.join().unwrap(), QueueStatus::Done);
        assert_eq!(queue.push(1), QueueStatus::Done);
    }

    #[test]
    fn test_terminate_drains_pending_items() {
        let queue: BoundedQueue<i32> = BoundedQueue::new(4);
        queue.push(7);
        queue.terminate();

        assert_eq!(queue.pop(), (QueueStatus::Ok, Some(7)));
        assert_eq!(queue.pop(), (QueueStatus::Done, None));
    }

    mod prop_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(100))]

            /// Items come out in the order they went in, regardless of how
            /// pushes and pops interleave.
            #[test]
            fn prop_fifo_order(items in prop::collection::vec(any::<i32>(), 0..64)) {
                let queue: BoundedQueue<i32> = BoundedQueue::new(64);
                for item in &items {
                    prop_assert_eq!(queue.push(*item), QueueStatus::Ok);
                }
                for expected in &items {
                    let (status, item) = queue.try_pop();
                    prop_assert_eq!(status, QueueStatus::Ok);
                    prop_assert_eq!(item, Some(*expected));
                }
                prop_assert!(queue.is_empty());
            }

            /// try_push never exceeds the configured capacity.
            #[test]
            fn prop_capacity_respected(capacity in 1usize..16, pushes in 0usize..32) {
                let queue: BoundedQueue<usize> = BoundedQueue::new(capacity);
                let mut accepted = 0;
                for i in 0..pushes {
                    if queue.try_push(i) == QueueStatus::Ok {
                        accepted += 1;
                    }
                }
                prop_assert_eq!(accepted, pushes.min(capacity));
                prop_assert_eq!(queue.len(), accepted);
            }
        }
    }

    #[test]
    fn test_fifo_across_threads() {
        let queue = Arc::new(BoundedQueue::new(100));
        let producer_queue = Arc::clone(&queue);
        let consumer_queue = Arc::clone(&queue);

        let producer = thread::spawn(move || {
            for i in 0..50 {
                producer_queue.push(i);
            }
        });

        let consumer = thread::spawn(move || {
            let mut received = Vec::new();
            for _ in 0..50 {
                let (status, item) = consumer_queue.pop();
                assert_eq!(status, QueueStatus::Ok);
                received.push(item.unwrap());
            }
            received
        });

        producer.join().unwrap();
        let received = consumer.join().unwrap();
        assert_eq!(received, (0..50).collect::<Vec<_>>());
    }
}
