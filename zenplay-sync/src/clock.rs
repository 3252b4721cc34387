/*!
    Clock state and master-clock selection (C3).
*/

use std::time::{Duration, Instant};

use zenplay_types::{Error, Result};

/// Which logical clock drives playback timing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncMode {
    AudioMaster,
    VideoMaster,
    /// Wall-clock driven; used when there is no audio stream to anchor to.
    External,
}

impl SyncMode {
    /// Table from §4.3: audio is preferred whenever present; video-only
    /// media falls back to the wall clock; media with neither is an error.
    pub fn select(has_audio: bool, has_video: bool) -> Result<Self> {
        match (has_audio, has_video) {
            (true, _) => Ok(Self::AudioMaster),
            (false, true) => Ok(Self::External),
            (false, false) => Err(Error::invalid_state(
                "media has neither audio nor video stream",
            )),
        }
    }
}

/// Tunable thresholds controlling when a clock update is actually applied.
#[derive(Clone, Copy, Debug)]
pub struct SyncConfig {
    pub max_update_interval_ms: u64,
    pub pts_delta_threshold_ms: i64,
    pub ewma_alpha: f64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_update_interval_ms: 75,
            pts_delta_threshold_ms: 40,
            ewma_alpha: 0.3,
        }
    }
}

/// Per-stream clock state held by the sync controller.
#[derive(Clone, Copy, Debug)]
pub(crate) struct ClockState {
    pub pts_ms: i64,
    pub system_time: Instant,
    pub drift_ms: f64,
    pub started: bool,
    /// First-ever published PTS for this stream, subtracted from every
    /// subsequent sample to normalize to a zero-based origin.
    pub first_pts_ms: i64,
}

impl ClockState {
    pub fn new(now: Instant) -> Self {
        Self {
            pts_ms: 0,
            system_time: now,
            drift_ms: 0.0,
            started: false,
            first_pts_ms: 0,
        }
    }

    pub fn reset(&mut self, now: Instant) {
        self.pts_ms = 0;
        self.system_time = now;
        self.drift_ms = 0.0;
        self.started = false;
        self.first_pts_ms = 0;
    }

    /// Whether a new sample should actually be applied, per the
    /// update-trigger rules: either condition is sufficient.
    fn should_apply(&self, raw_pts_ms: i64, now: Instant, config: &SyncConfig) -> bool {
        if !self.started {
            return true;
        }
        let elapsed = now.duration_since(self.system_time);
        if elapsed >= Duration::from_millis(config.max_update_interval_ms) {
            return true;
        }
        (raw_pts_ms - (self.first_pts_ms + self.pts_ms)).abs() >= config.pts_delta_threshold_ms
    }

    /// Applies a new sample if it passes the update-trigger gate and isn't
    /// stale. Returns `true` if the clock state changed.
    pub fn update(&mut self, raw_pts_ms: i64, now: Instant, config: &SyncConfig) -> bool {
        if !self.started {
            self.first_pts_ms = raw_pts_ms;
            self.pts_ms = 0;
            self.system_time = now;
            self.drift_ms = 0.0;
            self.started = true;
            return true;
        }

        // Stale-sample rejection: older than current by more than the
        // delta threshold is ignored outright.
        let normalized = raw_pts_ms - self.first_pts_ms;
        if normalized < self.pts_ms - config.pts_delta_threshold_ms {
            return false;
        }

        if !self.should_apply(raw_pts_ms, now, config) {
            return false;
        }

        let predicted = self.pts_ms as f64 + now.duration_since(self.system_time).as_millis() as f64;
        let measured = normalized as f64;
        let sample_drift = measured - predicted;
        self.drift_ms = config.ewma_alpha * sample_drift + (1.0 - config.ewma_alpha) * self.drift_ms;

        self.pts_ms = normalized;
        self.system_time = now;
        true
    }

    /// Predicted current position in ms: `last_pts + elapsed + drift`.
    pub fn predict(&self, now: Instant) -> i64 {
        if !self.started {
            return 0;
        }
        let elapsed = now.duration_since(self.system_time).as_millis() as f64;
        (self.pts_ms as f64 + elapsed + self.drift_ms).round() as i64
    }

    /// Shifts `system_time` forward by a paused interval so `predict` is
    /// unaffected by the time spent paused.
    pub fn shift_by_pause(&mut self, paused_for: Duration) {
        self.system_time += paused_for;
    }
}
