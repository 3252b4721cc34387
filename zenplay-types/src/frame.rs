/*!
    Decoded and transformed media frames (data model §3 `MediaFrame`).

    `VideoFrame` and `AudioFrame` are pipeline-internal: software
    pixel/PCM payloads still tagged with source `Pts`/`time_base`, as
    produced by the decode and transform stages. `ResampledAudioFrame`
    is the one presentation-ready type that lives here rather than in
    `zenplay-player`: it is produced by `zenplay-transform`'s audio
    resampler and consumed by the player crate's audio queue, so it has
    to sit in the shared leaf crate both depend on.
*/

use crate::format::{ChannelLayout, PixelFormat, SampleFormat};
use crate::packet::Pts;
use crate::rational::Rational;

/// A decoded or transformed video frame still carrying source timing.
#[derive(Clone)]
pub struct VideoFrame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub pts: Option<Pts>,
    pub time_base: Rational,
}

impl VideoFrame {
    pub fn new(
        data: Vec<u8>,
        width: u32,
        height: u32,
        format: PixelFormat,
        pts: Option<Pts>,
        time_base: Rational,
    ) -> Self {
        Self {
            data,
            width,
            height,
            format,
            pts,
            time_base,
        }
    }

    /// PTS converted to milliseconds via `time_base`, or `None` if unset.
    pub fn pts_ms(&self) -> Option<i64> {
        let pts = self.pts?;
        Some((pts.0 as f64 * self.time_base.as_f64() * 1000.0).round() as i64)
    }
}

impl std::fmt::Debug for VideoFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoFrame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("pts", &self.pts)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// A decoded or transformed audio frame still carrying source timing.
#[derive(Clone)]
pub struct AudioFrame {
    pub data: Vec<u8>,
    pub samples: usize,
    pub sample_rate: u32,
    pub channels: ChannelLayout,
    pub format: SampleFormat,
    pub pts: Option<Pts>,
    pub time_base: Rational,
}

impl AudioFrame {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        data: Vec<u8>,
        samples: usize,
        sample_rate: u32,
        channels: ChannelLayout,
        format: SampleFormat,
        pts: Option<Pts>,
        time_base: Rational,
    ) -> Self {
        Self {
            data,
            samples,
            sample_rate,
            channels,
            format,
            pts,
            time_base,
        }
    }

    /// PTS converted to milliseconds via `time_base`, or `None` if unset.
    pub fn pts_ms(&self) -> Option<i64> {
        let pts = self.pts?;
        Some((pts.0 as f64 * self.time_base.as_f64() * 1000.0).round() as i64)
    }
}

impl std::fmt::Debug for AudioFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioFrame")
            .field("samples", &self.samples)
            .field("sample_rate", &self.sample_rate)
            .field("channels", &self.channels)
            .field("format", &self.format)
            .field("pts", &self.pts)
            .finish()
    }
}

/// Interleaved fixed-spec PCM, owned by the audio queue slot (§4.7/§4.8).
///
/// Unlike `AudioFrame`, its timestamp is already normalized to
/// milliseconds: the audio player never needs `time_base` math, only a
/// number it can compare against the sync controller's clock.
#[derive(Clone, Debug)]
pub struct ResampledAudioFrame {
    pub pcm_bytes: Vec<u8>,
    pub sample_count: usize,
    pub pts_ms: Option<i64>,
}

impl ResampledAudioFrame {
    pub fn new(pcm_bytes: Vec<u8>, sample_count: usize, pts_ms: Option<i64>) -> Self {
        Self {
            pcm_bytes,
            sample_count,
            pts_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn video_frame_pts_ms() {
        let frame = VideoFrame::new(
            vec![],
            1920,
            1080,
            PixelFormat::Yuv420p,
            Some(Pts(48)),
            Rational::new(1, 24),
        );
        assert_eq!(frame.pts_ms(), Some(2000));
    }

    #[test]
    fn audio_frame_pts_ms_none_when_unset() {
        let frame = AudioFrame::new(
            vec![],
            1024,
            48000,
            ChannelLayout::Stereo,
            SampleFormat::S16,
            None,
            Rational::new(1, 48000),
        );
        assert_eq!(frame.pts_ms(), None);
    }
}
