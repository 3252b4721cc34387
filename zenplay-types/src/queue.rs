/*!
    Generic bounded blocking queue (C1).

    The sole synchronization primitive between adjacent pipeline stages.
    Producers block on `push` when full, consumers block on `pop` when
    empty; `stop()` wakes every waiter so threads can exit promptly. Lives
    in this crate (rather than `zenplay-player`, where it is consumed most)
    because `zenplay-source`'s network prefetcher needs the same primitive
    for its byte-budgeted packet queue.
*/

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

struct Inner<T> {
    items: VecDeque<T>,
    capacity: usize,
    stopped: bool,
}

pub struct BlockingQueue<T> {
    inner: Mutex<Inner<T>>,
    not_full: Condvar,
    not_empty: Condvar,
    /// Signaled whenever an item leaves the queue, for producers waiting
    /// in `push_below_watermark`/`push_below_watermark_timeout` on a
    /// threshold below full capacity.
    below_watermark: Condvar,
}

impl<T> BlockingQueue<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                items: VecDeque::with_capacity(capacity),
                capacity,
                stopped: false,
            }),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
            below_watermark: Condvar::new(),
        }
    }

    /// Blocks while full and not stopped. Returns `false` if the queue was
    /// stopped before the item could be enqueued.
    pub fn push(&self, item: T) -> bool {
        let mut inner = self.inner.lock().unwrap();
        while inner.items.len() >= inner.capacity && !inner.stopped {
            inner = self.not_full.wait(inner).unwrap();
        }
        if inner.stopped {
            return false;
        }
        inner.items.push_back(item);
        self.not_empty.notify_one();
        true
    }

    /// Like `push`, but gives up after `timeout` and returns `false` instead
    /// of blocking forever.
    pub fn push_timeout(&self, item: T, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut inner = self.inner.lock().unwrap();
        while inner.items.len() >= inner.capacity && !inner.stopped {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, result) = self.not_full.wait_timeout(inner, deadline - now).unwrap();
            inner = guard;
            if result.timed_out() && inner.items.len() >= inner.capacity && !inner.stopped {
                return false;
            }
        }
        if inner.stopped {
            return false;
        }
        inner.items.push_back(item);
        self.not_empty.notify_one();
        true
    }

    /// Blocks while `len() >= watermark` and not stopped, then pushes
    /// unconditionally (a watermark below capacity guarantees room).
    /// This is the single back-pressure point a downstream consumer
    /// applies before the queue is completely full: the producer blocks
    /// on a condition variable rather than spin-polling `len()`. `pop`/
    /// `try_pop`/`clear` wake waiters every time an item leaves.
    pub fn push_below_watermark(&self, item: T, watermark: usize) -> bool {
        let mut inner = self.inner.lock().unwrap();
        let watermark = watermark.min(inner.capacity).max(1);
        while inner.items.len() >= watermark && !inner.stopped {
            inner = self.below_watermark.wait(inner).unwrap();
        }
        if inner.stopped {
            return false;
        }
        inner.items.push_back(item);
        self.not_empty.notify_one();
        true
    }

    /// Like `push_below_watermark`, but gives up after `timeout`.
    pub fn push_below_watermark_timeout(&self, item: T, watermark: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut inner = self.inner.lock().unwrap();
        let watermark = watermark.min(inner.capacity).max(1);
        while inner.items.len() >= watermark && !inner.stopped {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, result) = self.below_watermark.wait_timeout(inner, deadline - now).unwrap();
            inner = guard;
            if result.timed_out() && inner.items.len() >= watermark && !inner.stopped {
                return false;
            }
        }
        if inner.stopped {
            return false;
        }
        inner.items.push_back(item);
        self.not_empty.notify_one();
        true
    }

    /// Blocks while empty and not stopped. Returns `None` once stopped and
    /// drained.
    pub fn pop(&self) -> Option<T> {
        let mut inner = self.inner.lock().unwrap();
        while inner.items.is_empty() && !inner.stopped {
            inner = self.not_empty.wait(inner).unwrap();
        }
        let item = inner.items.pop_front();
        if item.is_some() {
            self.not_full.notify_one();
            self.below_watermark.notify_all();
        }
        item
    }

    /// Like `pop`, but gives up after `timeout` and returns `None` instead of
    /// blocking forever (distinct from "stopped and drained").
    pub fn pop_timeout(&self, timeout: Duration) -> Option<T> {
        let deadline = Instant::now() + timeout;
        let mut inner = self.inner.lock().unwrap();
        while inner.items.is_empty() && !inner.stopped {
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            let (guard, result) = self.not_empty.wait_timeout(inner, deadline - now).unwrap();
            inner = guard;
            if result.timed_out() && inner.items.is_empty() {
                return None;
            }
        }
        let item = inner.items.pop_front();
        if item.is_some() {
            self.not_full.notify_one();
            self.below_watermark.notify_all();
        }
        item
    }

    /// Never blocks. Used by the audio output callback, which must return
    /// promptly.
    pub fn try_pop(&self) -> Option<T> {
        let mut inner = self.inner.lock().unwrap();
        let item = inner.items.pop_front();
        if item.is_some() {
            self.not_full.notify_one();
            self.below_watermark.notify_all();
        }
        item
    }

    /// Wakes every blocked producer/consumer; subsequent `push` calls fail
    /// and `pop` drains whatever remains, then returns `None`.
    pub fn stop(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.stopped = true;
        self.not_full.notify_all();
        self.not_empty.notify_all();
        self.below_watermark.notify_all();
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.lock().unwrap().stopped
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every queued item, invoking `cleanup` on each so producers can
    /// release any resources the item owns (e.g. a decoder's scratch
    /// buffer). Does not change the stopped flag.
    pub fn clear<F: FnMut(T)>(&self, mut cleanup: F) {
        let mut inner = self.inner.lock().unwrap();
        for item in inner.items.drain(..) {
            cleanup(item);
        }
        self.not_full.notify_all();
        self.below_watermark.notify_all();
    }

    /// Resets `stopped` to `false` without touching queued items, so the
    /// same queue instance can be reused after a seek's stop/reopen cycle.
    pub fn reopen(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.stopped = false;
        self.not_full.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn push_pop_preserves_order() {
        let q = BlockingQueue::new(4);
        q.push(1);
        q.push(2);
        q.push(3);
        assert_eq!(q.pop(), Some(1));
        assert_eq!(q.pop(), Some(2));
        assert_eq!(q.pop(), Some(3));
    }

    #[test]
    fn pop_returns_none_after_stop_and_drain() {
        let q = BlockingQueue::new(4);
        q.push(1);
        q.stop();
        assert_eq!(q.pop(), Some(1));
        assert_eq!(q.pop(), None);
    }

    #[test]
    fn push_fails_once_stopped() {
        let q: BlockingQueue<i32> = BlockingQueue::new(1);
        q.stop();
        assert!(!q.push(42));
    }

    #[test]
    fn push_blocks_until_space_then_succeeds() {
        let q = Arc::new(BlockingQueue::new(1));
        q.push(1);

        let q2 = Arc::clone(&q);
        let handle = thread::spawn(move || {
            q2.push(2);
        });

        thread::sleep(Duration::from_millis(20));
        assert_eq!(q.pop(), Some(1));
        handle.join().unwrap();
        assert_eq!(q.pop(), Some(2));
    }

    #[test]
    fn push_below_watermark_blocks_at_watermark_not_capacity() {
        let q = Arc::new(BlockingQueue::new(4));
        // Watermark of 2: the third push must block even though capacity is 4.
        assert!(q.push_below_watermark(1, 2));
        assert!(q.push_below_watermark(2, 2));

        let q2 = Arc::clone(&q);
        let handle = thread::spawn(move || {
            q2.push_below_watermark(3, 2);
        });

        thread::sleep(Duration::from_millis(20));
        assert_eq!(q.len(), 2);
        assert_eq!(q.pop(), Some(1));
        handle.join().unwrap();
        assert_eq!(q.len(), 2);
    }

    #[test]
    fn push_below_watermark_timeout_gives_up_without_spinning() {
        let q: BlockingQueue<i32> = BlockingQueue::new(4);
        q.push_below_watermark(1, 1);
        let start = Instant::now();
        assert!(!q.push_below_watermark_timeout(2, 1, Duration::from_millis(30)));
        assert!(start.elapsed() >= Duration::from_millis(25));
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn push_below_watermark_fails_once_stopped() {
        let q: BlockingQueue<i32> = BlockingQueue::new(4);
        q.push_below_watermark(1, 1);
        q.stop();
        assert!(!q.push_below_watermark_timeout(2, 1, Duration::from_millis(500)));
    }

    #[test]
    fn pop_timeout_expires_when_empty() {
        let q: BlockingQueue<i32> = BlockingQueue::new(4);
        let start = Instant::now();
        assert_eq!(q.pop_timeout(Duration::from_millis(30)), None);
        assert!(start.elapsed() >= Duration::from_millis(25));
    }

    #[test]
    fn try_pop_never_blocks_on_empty() {
        let q: BlockingQueue<i32> = BlockingQueue::new(4);
        assert_eq!(q.try_pop(), None);
    }

    #[test]
    fn clear_invokes_cleanup_for_each_item() {
        let q = BlockingQueue::new(4);
        q.push(1);
        q.push(2);
        let mut cleaned = Vec::new();
        q.clear(|item| cleaned.push(item));
        assert_eq!(cleaned, vec![1, 2]);
        assert_eq!(q.len(), 0);
    }

    #[test]
    fn reopen_clears_stopped_flag() {
        let q: BlockingQueue<i32> = BlockingQueue::new(4);
        q.stop();
        assert!(q.is_stopped());
        q.reopen();
        assert!(!q.is_stopped());
    }
}
