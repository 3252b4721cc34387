/*!
    A/V synchronization controller (C3).
*/

use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::clock::{ClockState, SyncConfig, SyncMode};

struct Inner {
    audio: ClockState,
    video: ClockState,
    mode: SyncMode,
    config: SyncConfig,
    play_start_time: Instant,
    paused_at: Option<Instant>,
}

/// Owns the audio and video logical clocks and the master-clock selection.
/// Mutated by the audio callback thread, the video render thread, and the
/// playback controller thread; all mutation paths take the single internal
/// mutex.
pub struct SyncController {
    inner: Mutex<Inner>,
}

impl SyncController {
    pub fn new(mode: SyncMode, config: SyncConfig) -> Self {
        let now = Instant::now();
        Self {
            inner: Mutex::new(Inner {
                audio: ClockState::new(now),
                video: ClockState::new(now),
                mode,
                config,
                play_start_time: now,
                paused_at: None,
            }),
        }
    }

    pub fn mode(&self) -> SyncMode {
        self.inner.lock().mode
    }

    /// Called from the audio output callback with the PTS of the frame
    /// currently being emitted.
    pub fn update_audio_clock(&self, pts_ms: i64, system_time: Instant) {
        let mut inner = self.inner.lock();
        let config = inner.config;
        inner.audio.update(pts_ms, system_time, &config);
    }

    /// Called from the video render thread with the PTS of the frame about
    /// to be presented.
    pub fn update_video_clock(&self, pts_ms: i64, system_time: Instant) {
        let mut inner = self.inner.lock();
        let config = inner.config;
        inner.video.update(pts_ms, system_time, &config);
    }

    /// Predicted playback position in ms at `now`.
    pub fn get_master_clock(&self, now: Instant) -> i64 {
        let inner = self.inner.lock();
        match inner.mode {
            SyncMode::AudioMaster => inner.audio.predict(now),
            SyncMode::VideoMaster => inner.video.predict(now),
            SyncMode::External => {
                let paused = inner.paused_at.unwrap_or(now);
                now.saturating_duration_since(inner.play_start_time)
                    .saturating_sub(now.saturating_duration_since(paused))
                    .as_millis() as i64
            }
        }
    }

    /// Delay (ms) for a video frame with the given presentation PTS:
    /// positive means wait, negative means the frame is already late.
    pub fn calculate_video_delay(&self, frame_pts_ms: i64, now: Instant) -> i64 {
        let inner = self.inner.lock();
        let normalized = frame_pts_ms - inner.video.first_pts_ms;
        let master = match inner.mode {
            SyncMode::AudioMaster => inner.audio.predict(now),
            SyncMode::VideoMaster => inner.video.predict(now),
            SyncMode::External => {
                let paused = inner.paused_at.unwrap_or(now);
                now.saturating_duration_since(inner.play_start_time)
                    .saturating_sub(now.saturating_duration_since(paused))
                    .as_millis() as i64
            }
        };
        normalized - master
    }

    /// Freezes the clocks; `get_master_clock` keeps returning the value it
    /// returned immediately before this call until `resume()`.
    pub fn pause(&self) {
        let mut inner = self.inner.lock();
        if inner.paused_at.is_none() {
            inner.paused_at = Some(Instant::now());
        }
    }

    /// Shifts clock reference times forward by the paused duration so
    /// `get_master_clock` resumes exactly where it left off.
    pub fn resume(&self) {
        let mut inner = self.inner.lock();
        if let Some(paused_at) = inner.paused_at.take() {
            let paused_for = Instant::now().saturating_duration_since(paused_at);
            inner.audio.shift_by_pause(paused_for);
            inner.video.shift_by_pause(paused_for);
            inner.play_start_time += paused_for;
        }
    }

    /// Clears both clocks' `started` flags and drift, and sets the internal
    /// origin to `target_ms`. The next sample on each clock re-anchors the
    /// zero-based origin.
    pub fn reset_for_seek(&self, target_ms: i64) {
        let mut inner = self.inner.lock();
        let now = Instant::now();
        inner.audio.reset(now);
        inner.video.reset(now);
        inner.audio.first_pts_ms = target_ms;
        inner.video.first_pts_ms = target_ms;
        inner.play_start_time = now;
        inner.paused_at = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_selection_prefers_audio() {
        assert_eq!(SyncMode::select(true, true).unwrap(), SyncMode::AudioMaster);
        assert_eq!(SyncMode::select(true, false).unwrap(), SyncMode::AudioMaster);
        assert_eq!(SyncMode::select(false, true).unwrap(), SyncMode::External);
        assert!(SyncMode::select(false, false).is_err());
    }

    #[test]
    fn first_sample_normalizes_to_zero() {
        let sc = SyncController::new(SyncMode::AudioMaster, SyncConfig::default());
        let now = Instant::now();
        sc.update_audio_clock(5_000, now);
        assert_eq!(sc.get_master_clock(now), 0);
    }

    #[test]
    fn master_clock_advances_with_elapsed_time() {
        let sc = SyncController::new(SyncMode::AudioMaster, SyncConfig::default());
        let t0 = Instant::now();
        sc.update_audio_clock(0, t0);
        let t1 = t0 + Duration::from_millis(100);
        assert_eq!(sc.get_master_clock(t1), 100);
    }

    #[test]
    fn pause_then_resume_preserves_master_clock_reading() {
        let sc = SyncController::new(SyncMode::AudioMaster, SyncConfig::default());
        let t0 = Instant::now();
        sc.update_audio_clock(0, t0);
        let before_pause = sc.get_master_clock(t0 + Duration::from_millis(50));

        sc.pause();
        std::thread::sleep(Duration::from_millis(30));
        sc.resume();

        let after_resume = sc.get_master_clock(Instant::now());
        assert!((after_resume - before_pause).abs() <= 5);
    }

    #[test]
    fn reset_for_seek_reanchors_origin() {
        let sc = SyncController::new(SyncMode::AudioMaster, SyncConfig::default());
        let t0 = Instant::now();
        sc.update_audio_clock(10_000, t0);
        sc.reset_for_seek(20_000);
        sc.update_audio_clock(20_000, Instant::now());
        assert_eq!(sc.get_master_clock(Instant::now()), 0);
    }

    #[test]
    fn video_delay_positive_when_frame_is_ahead() {
        let sc = SyncController::new(SyncMode::AudioMaster, SyncConfig::default());
        let t0 = Instant::now();
        sc.update_audio_clock(0, t0);
        sc.update_video_clock(0, t0);
        let delay = sc.calculate_video_delay(200, t0);
        assert!(delay > 0);
    }
}
