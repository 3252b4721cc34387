/*!
    Video player (C9).

    Runs a dedicated render thread that pops decoded frames, consults the
    sync controller for the frame's delay relative to the master clock, and
    presents/drops/repeats accordingly. Presentation is push-based and
    timed off the sync controller directly, rather than a UI tick polling
    for the next image: the render cadence is never coupled to however
    often some caller happens to ask for a frame.

    The queue carries plain `VideoFrame`s rather than `RenderableFrame`:
    `zenplay-decode`'s hardware path (`hw::transfer_hw_frame`) always
    copies a decoded hardware frame back to system memory before handing
    it back, so every frame this player ever sees is software-resident.
    `RenderableFrame::Hardware` stays reachable through the `Renderer`
    trait for a future direct GPU frame path, but nothing in this
    workspace produces one yet, so each popped frame is wrapped as
    `RenderableFrame::Software` before it reaches the renderer.
*/

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use zenplay_render::{Renderer, RenderableFrame};
use zenplay_sync::{StateManager, SyncController};
use zenplay_types::{BlockingQueue, VideoFrame};

/// Presentation thresholds (§4.9, §6 `sync.video.*`). A frame whose delay
/// falls in `[threshold_drop_ms, threshold_repeat_ms)` is presented anyway
/// rather than dropped or repeated: dropping loses a visible frame for a
/// lag that hasn't yet crossed the repeat band, and there is nothing to
/// repeat since the previous frame has already been presented. This
/// decision is recorded in DESIGN.md per §9's open question. It keeps
/// the policy monotonic (bigger lag never gets better treatment) and
/// lets the two true thresholds (drop, repeat) bound genuinely degenerate
/// cases instead of overlapping.
#[derive(Clone, Copy, Debug)]
pub struct VideoThresholds {
    /// Frame is early by at least this much: sleep and recompute.
    pub threshold_late_ms: i64,
    /// Frame is late by at least this much: present without waiting, but
    /// count it.
    pub threshold_repeat_ms: i64,
    /// Frame is late by at least this much: drop without presenting.
    pub threshold_drop_ms: i64,
    pub max_sleep_ms: u64,
}

impl Default for VideoThresholds {
    fn default() -> Self {
        Self {
            threshold_late_ms: 5,
            threshold_repeat_ms: -40,
            threshold_drop_ms: -120,
            max_sleep_ms: 100,
        }
    }
}

/// Tuning for the video player.
#[derive(Clone, Copy, Debug)]
pub struct VideoPlayerConfig {
    pub queue_capacity: usize,
    pub thresholds: VideoThresholds,
}

impl Default for VideoPlayerConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 30,
            thresholds: VideoThresholds::default(),
        }
    }
}

struct Counters {
    dropped: AtomicU64,
    repeated: AtomicU64,
    rendered: AtomicU64,
}

/// Dedicated-thread video player. The join handle lives behind a mutex
/// so `start`/`stop` can take `&self`: the controller holds this behind a
/// plain `Arc`, shared with the video decode worker, which only ever
/// needs `push_frame_blocking`'s `&self`.
pub struct VideoPlayer {
    config: VideoPlayerConfig,
    queue: Arc<BlockingQueue<VideoFrame>>,
    state: Arc<StateManager>,
    sync: Arc<SyncController>,
    renderer: Arc<Mutex<Box<dyn Renderer>>>,
    counters: Arc<Counters>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl VideoPlayer {
    pub fn new(
        state: Arc<StateManager>,
        sync: Arc<SyncController>,
        renderer: Box<dyn Renderer>,
        config: VideoPlayerConfig,
    ) -> Self {
        Self {
            queue: Arc::new(BlockingQueue::new(config.queue_capacity)),
            state,
            sync,
            renderer: Arc::new(Mutex::new(renderer)),
            counters: Arc::new(Counters {
                dropped: AtomicU64::new(0),
                repeated: AtomicU64::new(0),
                rendered: AtomicU64::new(0),
            }),
            handle: Mutex::new(None),
            config,
        }
    }

    /// Spawns the render thread. The thread exits once
    /// `state.should_stop()` is true and the queue has been told to stop.
    pub fn start(&self) {
        let mut handle = self.handle.lock();
        if handle.is_some() {
            return;
        }
        let queue = Arc::clone(&self.queue);
        let state = Arc::clone(&self.state);
        let sync = Arc::clone(&self.sync);
        let renderer = Arc::clone(&self.renderer);
        let counters = Arc::clone(&self.counters);
        let thresholds = self.config.thresholds;

        *handle = Some(thread::spawn(move || {
            render_loop(&queue, &state, &sync, &renderer, &counters, thresholds);
        }));
    }

    /// Pushes a decoded frame, blocking while the queue is at or above the
    /// 75% watermark (§4.9) so the decode worker applies back-pressure
    /// before the queue is completely full. The wait is a condition-variable
    /// wait inside `BlockingQueue` (`push_below_watermark`), not a polling
    /// loop: the decode worker is genuinely parked, not spinning. `ts` is
    /// the frame's presentation timestamp in ms, carried through only for
    /// the back-pressure stall log below. `timeout_ms = 0` waits unboundedly
    /// until `stop()`.
    pub fn push_frame_blocking(&self, frame: VideoFrame, ts: i64, timeout_ms: u64) -> bool {
        let watermark = (self.config.queue_capacity * 3) / 4;
        if timeout_ms == 0 {
            return self.queue.push_below_watermark(frame, watermark);
        }
        if self.queue.len() >= watermark {
            tracing::trace!(pts_ms = ts, "video frame queue back-pressure stall");
        }
        self.queue
            .push_below_watermark_timeout(frame, watermark, Duration::from_millis(timeout_ms))
    }

    /// Pauses the render loop, drops everything queued, and tells the
    /// renderer to release its per-frame caches, since the decoder pool
    /// those handles refer to is about to be reset for a seek.
    pub fn pre_seek(&self) {
        self.queue.clear(|_| {});
        self.renderer.lock().clear_caches();
    }

    pub fn dropped_count(&self) -> u64 {
        self.counters.dropped.load(Ordering::Relaxed)
    }

    pub fn repeated_count(&self) -> u64 {
        self.counters.repeated.load(Ordering::Relaxed)
    }

    pub fn rendered_count(&self) -> u64 {
        self.counters.rendered.load(Ordering::Relaxed)
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Stops the queue (waking the render thread) and joins it.
    pub fn stop(&self) {
        self.queue.stop();
        if let Some(handle) = self.handle.lock().take() {
            let _ = handle.join();
        }
        self.renderer.lock().cleanup();
    }
}

impl Drop for VideoPlayer {
    fn drop(&mut self) {
        self.queue.stop();
        if let Some(handle) = self.handle.lock().take() {
            let _ = handle.join();
        }
    }
}

fn render_loop(
    queue: &BlockingQueue<VideoFrame>,
    state: &StateManager,
    sync: &SyncController,
    renderer: &Mutex<Box<dyn Renderer>>,
    counters: &Counters,
    thresholds: VideoThresholds,
) {
    loop {
        if state.should_stop() {
            break;
        }
        state.wait_for_resume();
        if state.should_stop() {
            break;
        }

        let Some(frame) = queue.pop() else {
            break;
        };

        let Some(pts_ms) = frame.pts_ms() else {
            present(renderer, &frame, None, sync, counters);
            continue;
        };

        loop {
            let now = Instant::now();
            let delay = sync.calculate_video_delay(pts_ms, now);

            if delay >= thresholds.threshold_late_ms {
                let sleep_ms = (delay as u64).min(thresholds.max_sleep_ms);
                thread::sleep(Duration::from_millis(sleep_ms));
                if state.should_stop() {
                    return;
                }
                continue;
            }

            if delay <= thresholds.threshold_drop_ms {
                counters.dropped.fetch_add(1, Ordering::Relaxed);
            } else if delay <= thresholds.threshold_repeat_ms {
                counters.repeated.fetch_add(1, Ordering::Relaxed);
                present(renderer, &frame, Some(pts_ms), sync, counters);
            } else {
                present(renderer, &frame, Some(pts_ms), sync, counters);
            }
            break;
        }
    }
}

fn present(
    renderer: &Mutex<Box<dyn Renderer>>,
    frame: &VideoFrame,
    pts_ms: Option<i64>,
    sync: &SyncController,
    counters: &Counters,
) {
    let renderable = RenderableFrame::Software(frame.clone());
    if let Err(e) = renderer.lock().render_frame(&renderable) {
        tracing::warn!(error = %e, "video frame render failed");
    }
    counters.rendered.fetch_add(1, Ordering::Relaxed);
    if let Some(pts_ms) = pts_ms {
        sync.update_video_clock(pts_ms, Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zenplay_render::SoftwareRenderer;
    use zenplay_sync::SyncConfig;
    use zenplay_types::{PixelFormat, PlayerState, Pts, Rational};

    fn frame(pts: i64) -> VideoFrame {
        VideoFrame::new(
            vec![0u8; 4],
            2,
            2,
            PixelFormat::Yuv420p,
            Some(Pts(pts)),
            Rational::new(1, 1000),
        )
    }

    #[test]
    fn push_frame_blocking_respects_75_percent_watermark() {
        let state = Arc::new(StateManager::new());
        let sync = Arc::new(SyncController::new(
            zenplay_sync::SyncMode::AudioMaster,
            SyncConfig::default(),
        ));
        let player = VideoPlayer::new(
            state,
            sync,
            Box::new(SoftwareRenderer::new()),
            VideoPlayerConfig {
                queue_capacity: 4,
                ..Default::default()
            },
        );

        // Watermark is 3 (75% of 4): the first three pushes must not block.
        assert!(player.push_frame_blocking(frame(0), 0, 10));
        assert!(player.push_frame_blocking(frame(1), 1, 10));
        assert!(player.push_frame_blocking(frame(2), 2, 10));
        assert_eq!(player.queue_len(), 3);

        // A fourth push with a short timeout should fail to acquire space
        // below the watermark and time out rather than filling the queue.
        assert!(!player.push_frame_blocking(frame(3), 3, 5));
    }

    #[test]
    fn pre_seek_clears_queue_and_caches() {
        let state = Arc::new(StateManager::new());
        let sync = Arc::new(SyncController::new(
            zenplay_sync::SyncMode::AudioMaster,
            SyncConfig::default(),
        ));
        let player = VideoPlayer::new(
            state,
            sync,
            Box::new(SoftwareRenderer::new()),
            VideoPlayerConfig::default(),
        );
        player.push_frame_blocking(frame(0), 0, 0);
        assert_eq!(player.queue_len(), 1);

        player.pre_seek();
        assert_eq!(player.queue_len(), 0);
    }

    #[test]
    fn render_loop_exits_promptly_once_stopped() {
        let state = Arc::new(StateManager::new());
        state.transition(PlayerState::Playing);
        let sync = Arc::new(SyncController::new(
            zenplay_sync::SyncMode::AudioMaster,
            SyncConfig::default(),
        ));
        let player = VideoPlayer::new(
            state,
            sync,
            Box::new(SoftwareRenderer::new()),
            VideoPlayerConfig::default(),
        );
        player.start();
        player.stop();
        assert_eq!(player.rendered_count(), 0);
    }
}
