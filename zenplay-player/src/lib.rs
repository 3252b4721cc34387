/*!
    Top-level assembly for the ZenPlay playback core.

    Wires a source, two decoders, a sync controller, and a render path into
    the [`PlaybackController`], and owns the audio/video presentation
    threads (`audio`, `video`) plus the configuration tree (`config`) that
    parameterizes all of it.
*/

mod audio;
mod config;
mod controller;
mod video;

pub use audio::{AudioOutputDevice, AudioOutputSpec, AudioPlayer, AudioPlayerConfig};
pub use config::{
    AudioConfig, AudioOutputConfig, DemuxConfig, HardwareConfig, PlayerConfig, PrefetchTuning,
    QueueConfig, RenderConfig, SyncTuningConfig, VideoThresholdConfig,
};
pub use controller::{ErrorInfo, PlaybackController};
pub use video::{VideoPlayer, VideoPlayerConfig, VideoThresholds};

pub use zenplay_types::{BlockingQueue, PlayerState};
