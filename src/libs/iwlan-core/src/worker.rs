//! Serial worker: one thread draining one bounded queue in FIFO order.
//!
//! Every mutating subsystem of the control plane (tunnel manager, error
//! policy engine, event consumers, data surface) owns exactly one of these.
//! Cross-worker communication happens only by posting onto another worker's
//! handle; a worker never calls back into a peer synchronously.

use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::queue::{BoundedQueue, QueueStatus};

/// Default queue depth for a worker. Deep enough that bursty callback fan-in
/// never blocks the publisher in practice.
pub const DEFAULT_WORKER_DEPTH: usize = 1024;

/// Cloneable posting side of a [`SerialWorker`].
pub struct WorkerHandle<T> {
    queue: Arc<BoundedQueue<T>>,
    name: Arc<str>,
}

impl<T> Clone for WorkerHandle<T> {
    fn clone(&self) -> Self {
        WorkerHandle {
            queue: Arc::clone(&self.queue),
            name: Arc::clone(&self.name),
        }
    }
}

impl<T: Send + 'static> WorkerHandle<T> {
    /// Enqueue an item. Returns false if the worker is shutting down.
    pub fn post(&self, item: T) -> bool {
        match self.queue.push(item) {
            QueueStatus::Ok => true,
            status => {
                log::warn!("worker {}: post dropped ({:?})", self.name, status);
                false
            }
        }
    }

    /// Enqueue without blocking. Returns false when the queue is full or
    /// terminated.
    pub fn try_post(&self, item: T) -> bool {
        self.queue.try_push(item) == QueueStatus::Ok
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// A named thread that drains items from its queue, one at a time, in
/// enqueue order.
pub struct SerialWorker<T> {
    handle: WorkerHandle<T>,
    thread: Option<JoinHandle<()>>,
}

impl<T: Send + 'static> SerialWorker<T> {
    /// Spawn a worker with the default queue depth.
    pub fn spawn<F>(name: &str, handler: F) -> Self
    where
        F: FnMut(T) + Send + 'static,
    {
        Self::spawn_with_depth(name, DEFAULT_WORKER_DEPTH, handler)
    }

    /// Spawn a worker with an explicit queue depth. The calling thread is
    /// held until the worker thread has started, so a returned worker is
    /// always ready to accept posts.
    pub fn spawn_with_depth<F>(name: &str, depth: usize, mut handler: F) -> Self
    where
        F: FnMut(T) + Send + 'static,
    {
        let queue = Arc::new(BoundedQueue::new(depth));
        let started = Arc::new((Mutex::new(false), Condvar::new()));

        let worker_queue = Arc::clone(&queue);
        let worker_started = Arc::clone(&started);
        let worker_name = name.to_string();

        let thread = std::thread::Builder::new()
            .name(worker_name.clone())
            .spawn(move || {
                {
                    let (lock, cond) = &*worker_started;
                    let mut running = lock.lock().unwrap_or_else(|e| e.into_inner());
                    *running = true;
                    cond.notify_one();
                }

                loop {
                    match worker_queue.pop() {
                        (QueueStatus::Ok, Some(item)) => handler(item),
                        (QueueStatus::Done, _) => break,
                        (status, _) => {
                            log::debug!("worker {worker_name}: spurious wake ({status:?})");
                        }
                    }
                }
            })
            .expect("failed to spawn worker thread");

        let (lock, cond) = &*started;
        let mut running = lock.lock().unwrap_or_else(|e| e.into_inner());
        while !*running {
            running = cond.wait(running).unwrap_or_else(|e| e.into_inner());
        }
        drop(running);

        SerialWorker {
            handle: WorkerHandle {
                queue,
                name: Arc::from(name),
            },
            thread: Some(thread),
        }
    }

    pub fn handle(&self) -> WorkerHandle<T> {
        self.handle.clone()
    }

    pub fn post(&self, item: T) -> bool {
        self.handle.post(item)
    }

    /// Terminate the queue and join the thread. Pending items are drained
    /// before the thread exits.
    pub fn shutdown(mut self) {
        self.handle.queue.terminate();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl<T> Drop for SerialWorker<T> {
    fn drop(&mut self) {
        self.handle.queue.terminate();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// Run a one-shot job on a detached background thread. Used where work must
/// leave the caller's worker but needs no dedicated long-lived thread, e.g.
/// DNS prefetches.
pub fn spawn_detached<F>(name: &str, job: F)
where
    F: FnOnce() + Send + 'static,
{
    if let Err(e) = std::thread::Builder::new().name(name.to_string()).spawn(job) {
        log::error!("failed to spawn detached job {name}: {e}");
    }
}

/// Sleep helper for tests that have to yield to a worker thread.
#[doc(hidden)]
pub fn settle() {
    std::thread::sleep(Duration::from_millis(50));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;

    #[test]
    fn test_worker_processes_in_order() {
        let (tx, rx) = mpsc::channel();
        let worker = SerialWorker::spawn("test-order", move |item: u32| {
            tx.send(item).unwrap();
        });

        for i in 0..100 {
            assert!(worker.post(i));
        }

        let received: Vec<u32> = (0..100).map(|_| rx.recv().unwrap()).collect();
        assert_eq!(received, (0..100).collect::<Vec<_>>());
        worker.shutdown();
    }

    #[test]
    fn test_shutdown_drains_pending() {
        let counter = Arc::new(AtomicUsize::new(0));
        let worker_counter = Arc::clone(&counter);
        let worker = SerialWorker::spawn("test-drain", move |_: ()| {
            worker_counter.fetch_add(1, Ordering::SeqCst);
        });

        for _ in 0..10 {
            worker.post(());
        }
        worker.shutdown();

        assert_eq!(counter.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn test_post_after_shutdown_fails() {
        let worker = SerialWorker::spawn("test-closed", |_: ()| {});
        let handle = worker.handle();
        worker.shutdown();
        assert!(!handle.post(()));
    }

    #[test]
    fn test_handles_are_cloneable() {
        let (tx, rx) = mpsc::channel();
        let worker = SerialWorker::spawn("test-clone", move |item: &'static str| {
            tx.send(item).unwrap();
        });

        let a = worker.handle();
        let b = a.clone();
        a.post("first");
        b.post("second");

        assert_eq!(rx.recv().unwrap(), "first");
        assert_eq!(rx.recv().unwrap(), "second");
        worker.shutdown();
    }
}
