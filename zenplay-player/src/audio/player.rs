/*!
    Audio player (C8).

    Owns a bounded queue of [`ResampledAudioFrame`] and the cpal output
    device, rather than pushing raw samples into a lock-free ring buffer
    and tracking position with a separately-counted sample clock. Carrying
    `ResampledAudioFrame.pts_ms` through to the callback means the sync
    controller's audio clock is always anchored to the PTS actually being
    emitted, not to a sample count that can drift from it under queue
    underrun/eviction.
*/

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use bytemuck::cast_slice;
use parking_lot::Mutex;

use zenplay_sync::SyncController;
use zenplay_types::{BlockingQueue, ResampledAudioFrame, Result};

use super::device::{AudioOutputDevice, AudioOutputSpec};

/// Tuning for the audio player (§4.8).
#[derive(Clone, Copy, Debug)]
pub struct AudioPlayerConfig {
    pub output: AudioOutputSpec,
    /// Recommended: first-callback device-buffer frames x3-4 (≈150 for a
    /// 1 s device buffer at typical frame sizes).
    pub queue_capacity: usize,
    /// When the queue is full, evict the oldest frame instead of letting
    /// `push_frame` block. The decode worker that would rather apply
    /// back-pressure than drop audio should set this to `false`.
    pub drop_oldest_when_full: bool,
}

impl Default for AudioPlayerConfig {
    fn default() -> Self {
        Self {
            output: AudioOutputSpec::default(),
            queue_capacity: 150,
            drop_oldest_when_full: true,
        }
    }
}

/// State the output callback reads every invocation. A frame straddling
/// two callbacks (the requested byte count rarely divides evenly into a
/// frame's sample count) is tracked here rather than copied back into the
/// queue, so the callback never allocates.
struct CallbackState {
    current: Option<ResampledAudioFrame>,
    offset_samples: usize,
}

/// Bounded-queue audio player. Holds a non-owning `Arc<SyncController>`:
/// the controller owns the sync controller outright, and the player only
/// ever calls `update_audio_clock` on it from the output callback thread.
pub struct AudioPlayer {
    config: AudioPlayerConfig,
    queue: Arc<BlockingQueue<ResampledAudioFrame>>,
    sync: Arc<SyncController>,
    paused: Arc<AtomicBool>,
    stopped: Arc<AtomicBool>,
    underruns: Arc<AtomicU64>,
    evictions: Arc<AtomicU64>,
    callback_state: Arc<Mutex<CallbackState>>,
    device: Option<AudioOutputDevice>,
}

impl AudioPlayer {
    pub fn new(sync: Arc<SyncController>, config: AudioPlayerConfig) -> Self {
        Self {
            queue: Arc::new(BlockingQueue::new(config.queue_capacity)),
            sync,
            paused: Arc::new(AtomicBool::new(true)),
            stopped: Arc::new(AtomicBool::new(true)),
            underruns: Arc::new(AtomicU64::new(0)),
            evictions: Arc::new(AtomicU64::new(0)),
            callback_state: Arc::new(Mutex::new(CallbackState {
                current: None,
                offset_samples: 0,
            })),
            device: None,
            config,
        }
    }

    /// Negotiates the output device and installs the callback (§4.8
    /// `init`). Call once, before `start()`.
    pub fn init(&mut self) -> Result<()> {
        let queue = Arc::clone(&self.queue);
        let sync = Arc::clone(&self.sync);
        let paused = Arc::clone(&self.paused);
        let stopped = Arc::clone(&self.stopped);
        let underruns = Arc::clone(&self.underruns);
        let callback_state = Arc::clone(&self.callback_state);
        let channels = self.config.output.channels as usize;

        let device = AudioOutputDevice::open(self.config.output, move |out: &mut [i16]| {
            output_callback(
                out, channels, &queue, &sync, &paused, &stopped, &underruns, &callback_state,
            );
        })?;
        self.device = Some(device);
        Ok(())
    }

    /// State transition only, per §4.8. Never touches the sync
    /// controller directly.
    pub fn start(&self) {
        self.stopped.store(false, Ordering::SeqCst);
        self.paused.store(false, Ordering::SeqCst);
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.clear_frames();
    }

    /// Pushes a frame, blocking if the queue is full and no drop policy
    /// is configured.
    pub fn push_frame(&self, frame: ResampledAudioFrame) -> bool {
        self.evict_if_full();
        self.queue.push(frame)
    }

    /// Like `push_frame`, but gives up after `timeout_ms`.
    pub fn push_frame_timeout(&self, frame: ResampledAudioFrame, timeout_ms: u64) -> bool {
        self.evict_if_full();
        self.queue.push_timeout(frame, Duration::from_millis(timeout_ms))
    }

    fn evict_if_full(&self) {
        if self.config.drop_oldest_when_full && self.queue.len() >= self.config.queue_capacity {
            if self.queue.try_pop().is_some() {
                self.evictions.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn clear_frames(&self) {
        self.queue.clear(|_| {});
        let mut state = self.callback_state.lock();
        state.current = None;
        state.offset_samples = 0;
    }

    pub fn underrun_count(&self) -> u64 {
        self.underruns.load(Ordering::Relaxed)
    }

    pub fn eviction_count(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn queue_capacity(&self) -> usize {
        self.config.queue_capacity
    }
}

/// The output callback contract (§4.8):
/// 1. If paused or stopped, zero-fill and return.
/// 2. Consume queued frames into the output buffer; the first consumed
///    frame's `pts_ms` is the current playback PTS.
/// 3. After the copy, publish it to the sync controller.
/// 4. Never allocate, never block (`try_pop` only).
#[allow(clippy::too_many_arguments)]
fn output_callback(
    out: &mut [i16],
    channels: usize,
    queue: &BlockingQueue<ResampledAudioFrame>,
    sync: &SyncController,
    paused: &AtomicBool,
    stopped: &AtomicBool,
    underruns: &AtomicU64,
    callback_state: &Mutex<CallbackState>,
) {
    if paused.load(Ordering::SeqCst) || stopped.load(Ordering::SeqCst) {
        out.fill(0);
        return;
    }

    let mut state = callback_state.lock();
    let mut first_pts_ms: Option<i64> = None;
    let mut filled = 0usize;

    while filled < out.len() {
        if state.current.is_none() {
            state.current = queue.try_pop();
            state.offset_samples = 0;
        }

        let Some(frame) = state.current.as_ref() else {
            underruns.fetch_add(1, Ordering::Relaxed);
            break;
        };

        if first_pts_ms.is_none() {
            first_pts_ms = frame.pts_ms;
        }

        let samples: &[i16] = cast_slice(&frame.pcm_bytes);
        let remaining_in_frame = samples.len().saturating_sub(state.offset_samples);
        let remaining_in_out = out.len() - filled;
        let to_copy = remaining_in_frame.min(remaining_in_out);

        out[filled..filled + to_copy]
            .copy_from_slice(&samples[state.offset_samples..state.offset_samples + to_copy]);
        filled += to_copy;
        state.offset_samples += to_copy;

        if state.offset_samples >= samples.len() {
            state.current = None;
        }
    }

    out[filled..].fill(0);
    drop(state);

    if channels == 0 {
        return;
    }
    if let Some(pts_ms) = first_pts_ms {
        sync.update_audio_clock(pts_ms, Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zenplay_sync::{SyncConfig, SyncMode};

    fn frame(pts_ms: i64, samples: usize) -> ResampledAudioFrame {
        let bytes = vec![0u8; samples * 2];
        ResampledAudioFrame::new(bytes, samples, Some(pts_ms))
    }

    #[test]
    fn zero_fills_when_queue_empty() {
        let sync = Arc::new(SyncController::new(SyncMode::AudioMaster, SyncConfig::default()));
        let queue = BlockingQueue::new(4);
        let paused = AtomicBool::new(false);
        let stopped = AtomicBool::new(false);
        let underruns = AtomicU64::new(0);
        let state = Mutex::new(CallbackState {
            current: None,
            offset_samples: 0,
        });

        let mut out = vec![1i16; 16];
        output_callback(&mut out, 2, &queue, &sync, &paused, &stopped, &underruns, &state);

        assert!(out.iter().all(|&s| s == 0));
        assert_eq!(underruns.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn paused_zero_fills_without_consuming_queue() {
        let sync = Arc::new(SyncController::new(SyncMode::AudioMaster, SyncConfig::default()));
        let queue = BlockingQueue::new(4);
        queue.push(frame(0, 8));
        let paused = AtomicBool::new(true);
        let stopped = AtomicBool::new(false);
        let underruns = AtomicU64::new(0);
        let state = Mutex::new(CallbackState {
            current: None,
            offset_samples: 0,
        });

        let mut out = vec![1i16; 4];
        output_callback(&mut out, 2, &queue, &sync, &paused, &stopped, &underruns, &state);

        assert!(out.iter().all(|&s| s == 0));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn first_frame_pts_publishes_to_sync_controller() {
        let sync = Arc::new(SyncController::new(SyncMode::AudioMaster, SyncConfig::default()));
        let queue = BlockingQueue::new(4);
        queue.push(frame(500, 8));
        let paused = AtomicBool::new(false);
        let stopped = AtomicBool::new(false);
        let underruns = AtomicU64::new(0);
        let state = Mutex::new(CallbackState {
            current: None,
            offset_samples: 0,
        });

        let mut out = vec![0i16; 8];
        output_callback(&mut out, 2, &queue, &sync, &paused, &stopped, &underruns, &state);

        let now = Instant::now();
        assert_eq!(sync.get_master_clock(now), 0);
    }

    #[test]
    fn frame_spans_multiple_callbacks() {
        let sync = Arc::new(SyncController::new(SyncMode::AudioMaster, SyncConfig::default()));
        let queue = BlockingQueue::new(4);
        queue.push(frame(0, 8));
        let paused = AtomicBool::new(false);
        let stopped = AtomicBool::new(false);
        let underruns = AtomicU64::new(0);
        let state = Mutex::new(CallbackState {
            current: None,
            offset_samples: 0,
        });

        let mut first = vec![9i16; 4];
        output_callback(&mut first, 2, &queue, &sync, &paused, &stopped, &underruns, &state);
        assert_eq!(state.lock().offset_samples, 4);

        let mut second = vec![9i16; 4];
        output_callback(&mut second, 2, &queue, &sync, &paused, &stopped, &underruns, &state);
        assert!(state.lock().current.is_none());
        assert_eq!(underruns.load(Ordering::Relaxed), 0);
    }
}
