/*!
    Player configuration (A3).

    Nested `serde`+`toml` config structs, `#[serde(default)]` throughout
    so a partial file only overrides the keys it mentions, with a
    conversion method per downstream consumer instead of leaking this
    crate's field names into `zenplay-render`/`zenplay-sync`/`zenplay-source`.
*/

use std::path::Path;

use serde::{Deserialize, Serialize};

use zenplay_render::RenderPathConfig;
use zenplay_source::PrefetchConfig;
use zenplay_sync::SyncConfig;
use zenplay_types::{Error, Result};

use crate::audio::AudioOutputSpec;
use crate::video::VideoThresholds;

/// Top-level configuration tree (§6). Every field has a default, so
/// `PlayerConfig::default()` and `PlayerConfig::from_file` agree on an
/// un-configured system.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    pub render: RenderConfig,
    pub demux: DemuxConfig,
    pub audio: AudioConfig,
    pub sync: SyncTuningConfig,
    pub queues: QueueConfig,
}

impl PlayerConfig {
    /// Loads and parses a TOML file. Missing keys fall back to their
    /// defaults; unknown keys are accepted rather than rejected.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        toml::from_str(&text).map_err(|e| Error::invalid_argument(format!("invalid config: {e}")))
    }

    pub fn render_path_config(&self) -> RenderPathConfig {
        RenderPathConfig {
            use_hardware: self.render.use_hardware_acceleration,
            allow_d3d11va: self.render.hardware.allow_d3d11va,
            allow_dxva2: self.render.hardware.allow_dxva2,
            allow_vaapi: self.render.hardware.allow_vaapi,
            allow_videotoolbox: self.render.hardware.allow_videotoolbox,
            allow_fallback: self.render.hardware.allow_fallback,
        }
    }

    pub fn prefetch_config(&self) -> PrefetchConfig {
        PrefetchConfig {
            enabled: self.demux.prefetch.enabled,
            buffer_size_mb: self.demux.prefetch.buffer_size_mb,
            min_refill_size_mb: self.demux.prefetch.min_refill_size_mb,
        }
    }

    pub fn audio_output_spec(&self) -> AudioOutputSpec {
        AudioOutputSpec {
            sample_rate: self.audio.output.sample_rate,
            channels: self.audio.output.channels,
            buffer_ms: self.audio.output.buffer_ms,
        }
    }

    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            max_update_interval_ms: self.sync.max_update_interval_ms,
            pts_delta_threshold_ms: self.sync.pts_delta_threshold_ms,
            ewma_alpha: self.sync.ewma_alpha,
        }
    }

    pub fn video_thresholds(&self) -> VideoThresholds {
        VideoThresholds {
            threshold_late_ms: self.sync.video.threshold_late_ms,
            threshold_repeat_ms: self.sync.video.threshold_repeat_ms,
            threshold_drop_ms: self.sync.video.threshold_drop_ms,
            max_sleep_ms: self.sync.video.max_sleep_ms,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub use_hardware_acceleration: bool,
    pub hardware: HardwareConfig,
    /// Not consulted by any module in this workspace yet (no windowing
    /// surface owns a swapchain to pace); carried through so a future
    /// renderer backend has somewhere to read it from.
    pub vsync: bool,
    pub max_fps: Option<u32>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            use_hardware_acceleration: true,
            hardware: HardwareConfig::default(),
            vsync: true,
            max_fps: None,
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct HardwareConfig {
    pub allow_d3d11va: bool,
    pub allow_dxva2: bool,
    pub allow_vaapi: bool,
    pub allow_videotoolbox: bool,
    pub allow_fallback: bool,
}

impl Default for HardwareConfig {
    fn default() -> Self {
        Self {
            allow_d3d11va: true,
            allow_dxva2: true,
            allow_vaapi: true,
            allow_videotoolbox: true,
            allow_fallback: true,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DemuxConfig {
    pub prefetch: PrefetchTuning,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PrefetchTuning {
    pub enabled: bool,
    pub buffer_size_mb: usize,
    pub min_refill_size_mb: Option<usize>,
}

impl Default for PrefetchTuning {
    fn default() -> Self {
        let defaults = PrefetchConfig::default();
        Self {
            enabled: defaults.enabled,
            buffer_size_mb: defaults.buffer_size_mb,
            min_refill_size_mb: defaults.min_refill_size_mb,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub output: AudioOutputConfig,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioOutputConfig {
    pub sample_rate: u32,
    pub channels: u16,
    pub buffer_ms: u32,
}

impl Default for AudioOutputConfig {
    fn default() -> Self {
        let defaults = AudioOutputSpec::default();
        Self {
            sample_rate: defaults.sample_rate,
            channels: defaults.channels,
            buffer_ms: defaults.buffer_ms,
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncTuningConfig {
    pub max_update_interval_ms: u64,
    pub pts_delta_threshold_ms: i64,
    pub ewma_alpha: f64,
    pub video: VideoThresholdConfig,
}

impl Default for SyncTuningConfig {
    fn default() -> Self {
        let defaults = SyncConfig::default();
        Self {
            max_update_interval_ms: defaults.max_update_interval_ms,
            pts_delta_threshold_ms: defaults.pts_delta_threshold_ms,
            ewma_alpha: defaults.ewma_alpha,
            video: VideoThresholdConfig::default(),
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoThresholdConfig {
    pub threshold_late_ms: i64,
    pub threshold_repeat_ms: i64,
    pub threshold_drop_ms: i64,
    pub max_sleep_ms: u64,
}

impl Default for VideoThresholdConfig {
    fn default() -> Self {
        let defaults = VideoThresholds::default();
        Self {
            threshold_late_ms: defaults.threshold_late_ms,
            threshold_repeat_ms: defaults.threshold_repeat_ms,
            threshold_drop_ms: defaults.threshold_drop_ms,
            max_sleep_ms: defaults.max_sleep_ms,
        }
    }
}

/// Queue capacities (§4.1, not individually named in §6 but tunable for
/// the same reason the others are): how deep each stage's bounded queue
/// is before the upstream producer feels back-pressure.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub video_packet_capacity: usize,
    pub audio_packet_capacity: usize,
    pub video_frame_capacity: usize,
    pub audio_frame_capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            video_packet_capacity: 64,
            audio_packet_capacity: 96,
            video_frame_capacity: 30,
            audio_frame_capacity: 150,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips_through_toml() {
        let config = PlayerConfig::default();
        let text = toml::to_string(&config).unwrap();
        let parsed: PlayerConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.audio.output.sample_rate, config.audio.output.sample_rate);
        assert_eq!(parsed.queues.video_frame_capacity, config.queues.video_frame_capacity);
    }

    #[test]
    fn partial_toml_falls_back_to_defaults() {
        let parsed: PlayerConfig = toml::from_str(
            r#"
            [render]
            use_hardware_acceleration = false

            [audio.output]
            sample_rate = 44100
            "#,
        )
        .unwrap();

        assert!(!parsed.render.use_hardware_acceleration);
        assert_eq!(parsed.audio.output.sample_rate, 44100);
        // Untouched nested defaults still apply.
        assert_eq!(parsed.audio.output.channels, AudioOutputConfig::default().channels);
        assert_eq!(parsed.sync.max_update_interval_ms, SyncTuningConfig::default().max_update_interval_ms);
    }

    #[test]
    fn from_file_missing_path_reports_error() {
        let result = PlayerConfig::from_file("/nonexistent/zenplay.toml");
        assert!(result.is_err());
    }
}
