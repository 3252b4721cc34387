/*!
    Network-source prefetch (C4 continued).

    A dedicated thread owns the `Source` for network locations with
    prefetch enabled and reads ahead into a byte-budgeted queue, so the
    demux worker's `read_packet` never blocks on a slow socket while
    decoders are still working through what has already arrived.
*/

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::thread::{self, JoinHandle};

use zenplay_types::{Error, Packet, Result};

use crate::source::Source;

/// Prefetch tuning (§4.4, §6 `demux.prefetch.*`): how much to read ahead
/// before the worker thread pauses, and how far it must drain before
/// refilling resumes.
#[derive(Clone, Copy, Debug)]
pub struct PrefetchConfig {
    pub enabled: bool,
    pub buffer_size_mb: usize,
    /// Low watermark the queue must drain below before the worker resumes
    /// pushing. `None` defaults to half of `buffer_size_mb`, matching the
    /// hysteresis this module always applied before the setting was
    /// exposed through configuration.
    pub min_refill_size_mb: Option<usize>,
}

impl Default for PrefetchConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            buffer_size_mb: 16,
            min_refill_size_mb: None,
        }
    }
}

enum Outcome {
    Eof,
    Error(Error),
}

struct Inner {
    items: VecDeque<Packet>,
    buffered_bytes: usize,
    budget_bytes: usize,
    low_watermark_bytes: usize,
    /// Set once `buffered_bytes` reaches the budget; cleared once it has
    /// drained back down below the low watermark, giving high/low
    /// watermark hysteresis instead of a single threshold that would
    /// thrash between full and not-full every packet.
    above_high_watermark: bool,
    stopped: bool,
    outcome: Option<Outcome>,
}

struct ByteBudgetedQueue {
    inner: Mutex<Inner>,
    space_available: Condvar,
    item_available: Condvar,
}

impl ByteBudgetedQueue {
    fn new(budget_bytes: usize, low_watermark_bytes: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                items: VecDeque::new(),
                buffered_bytes: 0,
                budget_bytes,
                low_watermark_bytes: low_watermark_bytes.min(budget_bytes),
                above_high_watermark: false,
                stopped: false,
                outcome: None,
            }),
            space_available: Condvar::new(),
            item_available: Condvar::new(),
        }
    }

    /// Producer side, called only from the prefetch thread. Blocks while
    /// above the high watermark; returns `false` once stopped.
    fn push(&self, packet: Packet) -> bool {
        let mut inner = self.inner.lock().unwrap();
        loop {
            if inner.stopped {
                return false;
            }
            if inner.buffered_bytes >= inner.budget_bytes {
                inner.above_high_watermark = true;
            }
            if inner.above_high_watermark {
                if inner.buffered_bytes < inner.low_watermark_bytes {
                    inner.above_high_watermark = false;
                } else {
                    inner = self.space_available.wait(inner).unwrap();
                    continue;
                }
            }
            break;
        }
        inner.buffered_bytes += packet.data.len();
        inner.items.push_back(packet);
        self.item_available.notify_one();
        true
    }

    /// Consumer side. Blocks until a packet arrives, the stream ends, or
    /// an error is recorded.
    fn pop(&self) -> Option<Packet> {
        let mut inner = self.inner.lock().unwrap();
        while inner.items.is_empty() && !inner.stopped {
            inner = self.item_available.wait(inner).unwrap();
        }
        let packet = inner.items.pop_front();
        if let Some(p) = &packet {
            inner.buffered_bytes = inner.buffered_bytes.saturating_sub(p.data.len());
            self.space_available.notify_one();
        }
        packet
    }

    fn take_outcome(&self) -> Option<Outcome> {
        self.inner.lock().unwrap().outcome.take()
    }

    fn mark_finished(&self, outcome: Outcome) {
        let mut inner = self.inner.lock().unwrap();
        inner.outcome = Some(outcome);
        inner.stopped = true;
        self.item_available.notify_all();
    }

    /// Drops every queued (not-yet-consumed) packet, used when `seek`
    /// discards the prefetched lookahead.
    fn clear(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.items.clear();
        inner.buffered_bytes = 0;
        inner.above_high_watermark = false;
        self.space_available.notify_all();
    }

    fn stop(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.stopped = true;
        self.space_available.notify_all();
        self.item_available.notify_all();
    }
}

/// A raw-pointer-backed `Source` (its FFmpeg input context) moved wholesale
/// onto the prefetch thread. Never accessed from two threads at once: the
/// owning thread either holds it directly or has handed it to the worker.
struct SourceHandle(Source);
unsafe impl Send for SourceHandle {}

/// Reads a `Source` ahead of consumption on a dedicated thread.
pub struct Prefetcher {
    queue: std::sync::Arc<ByteBudgetedQueue>,
    handle: Option<JoinHandle<Source>>,
}

impl Prefetcher {
    /// Takes ownership of `source` and starts reading it on a new thread.
    pub fn spawn(source: Source, config: PrefetchConfig) -> Self {
        let budget_bytes = config.buffer_size_mb.max(1) * 1024 * 1024;
        let low_watermark_bytes = config
            .min_refill_size_mb
            .map(|mb| mb.max(1) * 1024 * 1024)
            .unwrap_or(budget_bytes / 2);
        let queue = std::sync::Arc::new(ByteBudgetedQueue::new(budget_bytes, low_watermark_bytes));
        let worker_queue = std::sync::Arc::clone(&queue);
        let handle = thread::spawn(move || {
            let mut handle = SourceHandle(source);
            loop {
                match handle.0.next_packet() {
                    Ok(Some(packet)) => {
                        if !worker_queue.push(packet) {
                            break;
                        }
                    }
                    Ok(None) => {
                        worker_queue.mark_finished(Outcome::Eof);
                        break;
                    }
                    Err(e) => {
                        worker_queue.mark_finished(Outcome::Error(e));
                        break;
                    }
                }
            }
            handle.0
        });

        Self {
            queue,
            handle: Some(handle),
        }
    }

    /// Pops the next prefetched packet. Returns `Ok(None)` at end of
    /// stream and propagates a demux error exactly once.
    pub fn read_packet(&self) -> Result<Option<Packet>> {
        match self.queue.pop() {
            Some(packet) => Ok(Some(packet)),
            None => match self.queue.take_outcome() {
                Some(Outcome::Error(e)) => Err(e),
                Some(Outcome::Eof) | None => Ok(None),
            },
        }
    }

    /// Drops whatever the prefetch thread has read ahead but not yet
    /// consumed, without stopping the thread.
    pub fn flush(&self) {
        self.queue.clear();
    }

    /// Stops the worker thread and recovers the `Source` it owned, so the
    /// caller can perform a seek (which must run on the thread holding the
    /// FFmpeg input context) before prefetching resumes.
    pub fn stop_and_recover(mut self) -> Source {
        self.queue.stop();
        self.handle
            .take()
            .expect("prefetcher handle taken twice")
            .join()
            .expect("prefetch thread panicked")
    }
}

impl Drop for Prefetcher {
    fn drop(&mut self) {
        self.queue.stop();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration as StdDuration;
    use zenplay_types::{MediaDuration, Pts, Rational, StreamType};

    fn packet_of(bytes: usize) -> Packet {
        Packet::new(
            vec![0u8; bytes],
            Some(Pts(0)),
            Some(Pts(0)),
            MediaDuration(0),
            Rational::new(1, 1000),
            false,
            StreamType::Video,
        )
    }

    #[test]
    fn push_blocks_above_high_watermark_until_drained_below_half() {
        let queue = Arc::new(ByteBudgetedQueue::new(100, 50));
        assert!(queue.push(packet_of(100)));

        let queue2 = Arc::clone(&queue);
        let handle = thread::spawn(move || queue2.push(packet_of(10)));

        thread::sleep(StdDuration::from_millis(20));
        assert!(!handle.is_finished());

        // Draining one packet (100 bytes) brings buffered_bytes to 0,
        // well under half the 100-byte budget, so the waiting push
        // should proceed.
        assert!(queue.pop().is_some());
        handle.join().unwrap();
        assert_eq!(queue.inner.lock().unwrap().buffered_bytes, 10);
    }

    #[test]
    fn clear_resets_buffered_bytes_and_wakes_waiting_producer() {
        let queue = Arc::new(ByteBudgetedQueue::new(50, 25));
        assert!(queue.push(packet_of(50)));

        let queue2 = Arc::clone(&queue);
        let handle = thread::spawn(move || queue2.push(packet_of(5)));
        thread::sleep(StdDuration::from_millis(20));

        queue.clear();
        handle.join().unwrap();
        assert_eq!(queue.inner.lock().unwrap().buffered_bytes, 5);
    }

    #[test]
    fn pop_returns_none_once_stopped_and_drained() {
        let queue = ByteBudgetedQueue::new(100, 50);
        assert!(queue.push(packet_of(10)));
        queue.stop();
        assert!(queue.pop().is_some());
        assert!(queue.pop().is_none());
    }
}
